// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A small preemptive real-time kernel for single-core ARM Cortex-M parts.
//!
//! This is the application-independent portion of the operating system: task
//! creation and context switching, a round-robin scheduler driven by a
//! periodic tick, and a handful of blocking synchronization primitives
//! (mutex, counting semaphore, bounded message queue) plus deterministic
//! memory management (a fixed-block pool and a first-fit heap).
//!
//! # Design principles
//!
//! 1. Static configuration. The task set is fixed at build time; there is no
//!    dynamic task creation once the scheduler starts.
//! 2. A strong preference for safe code where reasonable. The only `unsafe`
//!    lives at the architecture boundary (stack frame construction, the
//!    context-switch assembly, and memory-mapped register access).
//! 3. A preference for simple and clear algorithms over fast and clever
//!    ones. Round-robin, not priority scheduling; direct mutex handoff, not
//!    priority inheritance.

#![cfg_attr(target_os = "none", no_std)]

#[macro_use]
pub mod arch;

pub mod config {
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

pub mod err;
pub mod heap;
pub mod pool;
pub mod sched;
pub mod sync;
pub mod task;
pub mod time;
