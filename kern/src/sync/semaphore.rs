// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A counting semaphore, using the classic Dijkstra encoding: when `count`
//! is negative, `-count` tasks are waiting.

use crate::sched::{self, Kernel};
use crate::task::TaskState;

use super::waitlist::WaitList;

pub struct SemaphoreState {
    count: i32,
    waiters: WaitList,
}

impl SemaphoreState {
    pub const fn new(initial_count: i32) -> Self {
        SemaphoreState {
            count: initial_count,
            waiters: WaitList::new(),
        }
    }

    pub fn count(&self) -> i32 {
        self.count
    }

    /// Returns `true` if the caller blocked and a reschedule is needed.
    pub fn wait(&mut self, kernel: &mut Kernel) -> bool {
        self.count -= 1;
        if self.count < 0 {
            let cur = kernel.current();
            kernel.task_mut(cur).state = TaskState::Blocked;
            self.waiters.push_back(kernel, cur);
            true
        } else {
            false
        }
    }

    /// Does not itself pend a reschedule: a freshly-readied waiter runs at
    /// the next tick or when the poster next blocks, per the ported design.
    pub fn post(&mut self, kernel: &mut Kernel) {
        self.count += 1;
        if self.count <= 0 {
            if let Some(waiter) = self.waiters.pop_front(kernel) {
                kernel.task_mut(waiter).state = TaskState::Ready;
            }
        }
    }
}

pub struct Semaphore(sched::CriticalCell<SemaphoreState>);

impl Semaphore {
    pub const fn new(initial_count: i32) -> Self {
        Semaphore(sched::CriticalCell::new(SemaphoreState::new(initial_count)))
    }

    pub fn wait(&self) {
        let blocked = self.0.with(|state| sched::with_kernel(|k| state.wait(k)));
        if blocked {
            sched::request_reschedule();
        }
    }

    pub fn post(&self) {
        self.0.with(|state| sched::with_kernel(|k| state.post(k)));
    }

    pub fn count(&self) -> i32 {
        self.0.with(|state| state.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskState;

    fn entry() -> ! {
        unreachable!()
    }

    fn entry_addr() -> usize {
        entry as *const () as usize
    }

    #[test]
    fn wait_below_zero_blocks_the_caller() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();
        k.set_current(a);

        let mut s = SemaphoreState::new(0);
        assert!(s.wait(&mut k));
        assert_eq!(s.count(), -1);
        assert_eq!(k.task(a).state, TaskState::Blocked);
    }

    #[test]
    fn wait_with_available_count_does_not_block() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();
        k.set_current(a);

        let mut s = SemaphoreState::new(1);
        assert!(!s.wait(&mut k));
        assert_eq!(s.count(), 0);
    }

    #[test]
    fn post_wakes_the_oldest_waiter() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();
        let b = k.create_task(entry_addr()).unwrap();

        let mut s = SemaphoreState::new(0);
        k.set_current(a);
        s.wait(&mut k);
        k.set_current(b);
        s.wait(&mut k);
        assert_eq!(s.count(), -2);

        s.post(&mut k);
        assert_eq!(s.count(), -1);
        assert_eq!(k.task(a).state, TaskState::Ready);
        assert_eq!(k.task(b).state, TaskState::Blocked);

        s.post(&mut k);
        assert_eq!(s.count(), 0);
        assert_eq!(k.task(b).state, TaskState::Ready);
    }

    #[test]
    fn post_with_no_waiters_just_increments() {
        let mut k = Kernel::new();
        let mut s = SemaphoreState::new(0);
        s.post(&mut k);
        assert_eq!(s.count(), 1);
    }
}
