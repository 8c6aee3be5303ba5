// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Task control blocks and the stack frame a task starts life with.

use crate::time::Ticks;

/// Index of a task in the kernel's static task table.
///
/// Scheduler and wait-list links are expressed as these rather than raw
/// pointers, so the intrusive lists the scheduler walks can't alias in ways
/// the borrow checker would otherwise have to take on faith.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TaskIndex(pub u8);

impl TaskIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a task currently sits in the scheduling state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TaskState {
    Running,
    Ready,
    Blocked,
}

/// A task control block.
///
/// `stack_pointer` must remain the first field: the architecture-specific
/// context switch loads and stores it by dereferencing a `*mut Task` as a
/// `*mut usize`, without going through field offsets.
#[repr(C)]
pub struct Task {
    pub stack_pointer: usize,
    pub state: TaskState,
    /// Tick at which a timed-blocked task becomes `Ready` again. `0` is the
    /// sentinel for "not waiting on a timer" — the minimum real wakeup tick
    /// is always 1, since it is computed as `now + delta` with `delta >= 1`.
    pub wakeup_time: Ticks,
    /// Next task in the scheduler's circular list of all live tasks.
    pub scheduler_link: Option<TaskIndex>,
    /// Next task in whichever sync object's wait list currently holds this
    /// one. `None` when the task isn't waiting on anything.
    pub wait_link: Option<TaskIndex>,
}

impl Task {
    /// A placeholder TCB for unused table slots, before `create_task` has
    /// claimed them. Never scheduled: `scheduler_link` stays `None` until
    /// spliced in.
    pub const fn empty() -> Self {
        Task {
            stack_pointer: 0,
            state: TaskState::Blocked,
            wakeup_time: Ticks::ZERO,
            scheduler_link: None,
            wait_link: None,
        }
    }

    pub fn is_timed_wait_due(&self, now: Ticks) -> bool {
        self.state == TaskState::Blocked
            && self.wakeup_time != Ticks::ZERO
            && self.wakeup_time <= now
    }
}
