// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! FIFO wait lists threaded through `Task::wait_link`.

use crate::sched::Kernel;
use crate::task::TaskIndex;

/// A singly-linked FIFO of blocked tasks, linked through each task's
/// `wait_link` field. A task can be on at most one wait list at a time.
#[derive(Default)]
pub struct WaitList {
    head: Option<TaskIndex>,
}

impl WaitList {
    pub const fn new() -> Self {
        WaitList { head: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Appends `task` to the tail, walking the list — required for FIFO
    /// ordering, since the list has no tail pointer.
    pub fn push_back(&mut self, kernel: &mut Kernel, task: TaskIndex) {
        kernel.task_mut(task).wait_link = None;
        match self.head {
            None => self.head = Some(task),
            Some(mut cur) => {
                while let Some(next) = kernel.task(cur).wait_link {
                    cur = next;
                }
                kernel.task_mut(cur).wait_link = Some(task);
            }
        }
    }

    pub fn pop_front(&mut self, kernel: &mut Kernel) -> Option<TaskIndex> {
        let head = self.head?;
        self.head = kernel.task(head).wait_link;
        kernel.task_mut(head).wait_link = None;
        Some(head)
    }

    #[cfg(test)]
    pub fn len(&self, kernel: &Kernel) -> usize {
        let mut n = 0;
        let mut cur = self.head;
        while let Some(idx) = cur {
            n += 1;
            cur = kernel.task(idx).wait_link;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ! {
        unreachable!()
    }

    fn entry_addr() -> usize {
        entry as *const () as usize
    }

    #[test]
    fn push_and_pop_preserve_fifo_order() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();
        let b = k.create_task(entry_addr()).unwrap();
        let c = k.create_task(entry_addr()).unwrap();

        let mut list = WaitList::new();
        assert!(list.is_empty());
        list.push_back(&mut k, a);
        list.push_back(&mut k, b);
        list.push_back(&mut k, c);
        assert_eq!(list.len(&k), 3);

        assert_eq!(list.pop_front(&mut k), Some(a));
        assert_eq!(list.pop_front(&mut k), Some(b));
        assert_eq!(list.pop_front(&mut k), Some(c));
        assert_eq!(list.pop_front(&mut k), None);
        assert!(list.is_empty());
    }
}
