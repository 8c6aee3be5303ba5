// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common error-handling support.
//!
//! Kernel code spends too much time hand-rolling sentinel return values, so
//! we separate that concern into `Result<T, KernelError>` instead.

/// The recoverable error conditions the kernel's public API can raise. There
/// is no exception mechanism here: every fallible operation returns one of
/// these instead of panicking.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KernelError {
    /// `create_task` was called after `MAX_TASKS` slots are already in use.
    TaskCapacity,
    /// A message queue's ring buffer had no free slot for `send`.
    QueueFull,
    /// A message queue's ring buffer had nothing to give `receive`.
    QueueEmpty,
    /// A pool or heap request could not be satisfied from available memory.
    OutOfMemory,
    /// The requested block size was zero, or larger than the backing buffer.
    InvalidPoolConfig,
}

pub type Result<T> = core::result::Result<T, KernelError>;
