// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A binary mutex with FIFO waiters and direct ownership handoff.
//!
//! No priority inheritance, no recursive locking: a task re-acquiring a
//! mutex it already owns deadlocks against itself, exactly as it would on
//! the source this is ported from.

use crate::sched::{self, Kernel};
use crate::task::{TaskIndex, TaskState};

use super::waitlist::WaitList;

/// The pure state-transition logic, free of any critical-section or global
/// concerns, so it's directly unit-testable against a local `Kernel`.
pub struct MutexState {
    owner: Option<TaskIndex>,
    waiters: WaitList,
}

impl MutexState {
    pub const fn new() -> Self {
        MutexState {
            owner: None,
            waiters: WaitList::new(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.owner.is_some()
    }

    pub fn owner(&self) -> Option<TaskIndex> {
        self.owner
    }

    /// Returns `true` if the caller blocked and a reschedule is needed.
    pub fn try_acquire(&mut self, kernel: &mut Kernel) -> bool {
        let cur = kernel.current();
        match self.owner {
            None => {
                self.owner = Some(cur);
                false
            }
            Some(_) => {
                kernel.task_mut(cur).state = TaskState::Blocked;
                self.waiters.push_back(kernel, cur);
                true
            }
        }
    }

    /// Releases the mutex. Hands off directly to the oldest waiter, if
    /// any, rather than unlocking outright — the new owner is marked
    /// `Ready`, not run immediately; it picks up at the next reschedule.
    ///
    /// Releasing a mutex this task does not own is a silent no-op, per the
    /// ported design; a stricter implementation could fault instead.
    pub fn release(&mut self, kernel: &mut Kernel) {
        if self.owner != Some(kernel.current()) {
            return;
        }
        match self.waiters.pop_front(kernel) {
            Some(next) => {
                self.owner = Some(next);
                kernel.task_mut(next).state = TaskState::Ready;
            }
            None => self.owner = None,
        }
    }
}

impl Default for MutexState {
    fn default() -> Self {
        Self::new()
    }
}

/// The kernel-global handle application code declares a `static` of.
pub struct Mutex(sched::CriticalCell<MutexState>);

impl Mutex {
    pub const fn new() -> Self {
        Mutex(sched::CriticalCell::new(MutexState::new()))
    }

    pub fn acquire(&self) {
        let blocked = self
            .0
            .with(|state| sched::with_kernel(|k| state.try_acquire(k)));
        if blocked {
            sched::request_reschedule();
        }
    }

    pub fn release(&self) {
        self.0
            .with(|state| sched::with_kernel(|k| state.release(k)));
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::Kernel;

    fn entry() -> ! {
        unreachable!()
    }

    fn entry_addr() -> usize {
        entry as *const () as usize
    }

    #[test]
    fn uncontended_acquire_does_not_block() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();
        k.set_current(a);

        let mut m = MutexState::new();
        assert!(!m.try_acquire(&mut k));
        assert_eq!(m.owner(), Some(a));
        assert!(m.is_locked());
    }

    #[test]
    fn contended_acquire_blocks_and_release_hands_off_fifo() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();
        let b = k.create_task(entry_addr()).unwrap();
        let c = k.create_task(entry_addr()).unwrap();

        let mut m = MutexState::new();
        k.set_current(a);
        assert!(!m.try_acquire(&mut k));

        k.set_current(b);
        assert!(m.try_acquire(&mut k));
        assert_eq!(k.task(b).state, TaskState::Blocked);

        k.set_current(c);
        assert!(m.try_acquire(&mut k));
        assert_eq!(k.task(c).state, TaskState::Blocked);

        // `a` releases: the oldest waiter, `b`, takes ownership directly.
        k.set_current(a);
        m.release(&mut k);
        assert_eq!(m.owner(), Some(b));
        assert_eq!(k.task(b).state, TaskState::Ready);
        assert_eq!(k.task(c).state, TaskState::Blocked);

        k.set_current(b);
        m.release(&mut k);
        assert_eq!(m.owner(), Some(c));
        assert_eq!(k.task(c).state, TaskState::Ready);
    }

    #[test]
    fn release_by_non_owner_is_a_no_op() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();
        let b = k.create_task(entry_addr()).unwrap();

        let mut m = MutexState::new();
        k.set_current(a);
        m.try_acquire(&mut k);

        k.set_current(b);
        m.release(&mut k);
        assert_eq!(m.owner(), Some(a));
    }

    #[test]
    fn release_with_no_waiters_unlocks() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();

        let mut m = MutexState::new();
        k.set_current(a);
        m.try_acquire(&mut k);
        m.release(&mut k);
        assert_eq!(m.owner(), None);
        assert!(!m.is_locked());
    }
}
