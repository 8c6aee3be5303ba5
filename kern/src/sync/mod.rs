// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Blocking synchronization primitives: mutex, counting semaphore, and a
//! non-blocking bounded message queue, all consistent with the scheduler.

pub mod mutex;
pub mod queue;
pub mod semaphore;
pub mod waitlist;

pub use mutex::Mutex;
pub use queue::{DefaultQueue, Queue};
pub use semaphore::Semaphore;
