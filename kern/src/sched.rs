// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The kernel-global state, the round-robin scheduler, and task creation.
//!
//! All of this state is reachable only through [`with_kernel`], which
//! brackets access in an interrupts-disabled critical section. This is the
//! re-architected stand-in for the source's free-floating kernel globals: a
//! single value, one controlled point of mutation.

use core::cell::UnsafeCell;

use crate::arch;
use crate::config::{MAX_TASKS, STACK_WORDS};
use crate::err::{KernelError, Result};
use crate::task::{Task, TaskIndex, TaskState};
use crate::time::Ticks;

/// A cell that can only be mutated from within an interrupts-disabled
/// critical section. This is the kernel's only form of shared mutable
/// state: there is no `Mutex<T>` or `RefCell<T>` borrow-checking here,
/// because the kernel runs on one core and the only concurrent writer is an
/// interrupt handler, which this cell excludes by construction.
pub struct CriticalCell<T> {
    inner: UnsafeCell<T>,
}

unsafe impl<T> Sync for CriticalCell<T> {}

impl<T> CriticalCell<T> {
    pub const fn new(value: T) -> Self {
        CriticalCell {
            inner: UnsafeCell::new(value),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let restore = arch::disable_irq();
        // Safety: `restore` guarantees no other context can observe or
        // produce a second `&mut T` until we call `enable_irq`.
        let r = f(unsafe { &mut *self.inner.get() });
        arch::enable_irq(restore);
        r
    }
}

/// The kernel-global state: every task's control block and stack, which
/// one is current, and the tick counter.
pub struct Kernel {
    tasks: [Task; MAX_TASKS],
    stacks: [[usize; STACK_WORDS]; MAX_TASKS],
    num_tasks: usize,
    current: usize,
    tick: Ticks,
}

static KERNEL: CriticalCell<Kernel> = CriticalCell::new(Kernel::new());

/// Runs `f` against the kernel-global state with interrupts disabled.
pub fn with_kernel<R>(f: impl FnOnce(&mut Kernel) -> R) -> R {
    KERNEL.with(f)
}

impl Kernel {
    const EMPTY_TASK: Task = Task::empty();
    const EMPTY_STACK: [usize; STACK_WORDS] = [0; STACK_WORDS];

    /// Constructs a fresh, empty kernel. Used both for the crate's single
    /// global instance and, directly, by unit tests that want a kernel
    /// without touching the global (and therefore without risking
    /// cross-test interference when `cargo test` runs tests concurrently).
    pub(crate) const fn new() -> Self {
        Kernel {
            tasks: [Self::EMPTY_TASK; MAX_TASKS],
            stacks: [Self::EMPTY_STACK; MAX_TASKS],
            num_tasks: 0,
            current: 0,
            tick: Ticks::ZERO,
        }
    }

    pub fn now(&self) -> Ticks {
        self.tick
    }

    pub fn current(&self) -> TaskIndex {
        TaskIndex(self.current as u8)
    }

    /// Overrides which task is current without going through `reschedule`.
    /// Used by tests to set up a scenario; real code only ever changes
    /// `current` via `select`.
    #[cfg(test)]
    pub(crate) fn set_current(&mut self, idx: TaskIndex) {
        self.current = idx.index();
    }

    pub fn task(&self, idx: TaskIndex) -> &Task {
        &self.tasks[idx.index()]
    }

    pub fn task_mut(&mut self, idx: TaskIndex) -> &mut Task {
        &mut self.tasks[idx.index()]
    }

    /// Allocates the next free task slot and lays out its initial stack
    /// frame. Must only be called before [`kernel_start`].
    pub fn create_task(&mut self, entry: usize) -> Result<TaskIndex> {
        if self.num_tasks >= MAX_TASKS {
            return Err(KernelError::TaskCapacity);
        }
        let idx = self.num_tasks;
        let sp = arch::initialize_stack(&mut self.stacks[idx], entry);
        self.tasks[idx] = Task {
            stack_pointer: sp,
            state: TaskState::Ready,
            wakeup_time: Ticks::ZERO,
            scheduler_link: None,
            wait_link: None,
        };

        // Splice into the circular scheduler list without ever computing a
        // modulus against a task count of zero: the first task points to
        // itself, and every later task closes the loop back to the first.
        if idx == 0 {
            self.tasks[0].scheduler_link = Some(TaskIndex(0));
        } else {
            self.tasks[idx - 1].scheduler_link = Some(TaskIndex(idx as u8));
            self.tasks[idx].scheduler_link = Some(TaskIndex(0));
        }

        self.num_tasks += 1;
        Ok(TaskIndex(idx as u8))
    }

    /// Round-robin selection, run at every reschedule point. Skips
    /// non-`Ready` tasks; if none are ready, the current task keeps running.
    fn select(&mut self) {
        let start = self.current;
        let mut candidate = self.tasks[start].scheduler_link.unwrap().index();
        while self.tasks[candidate].state != TaskState::Ready && candidate != start {
            candidate = self.tasks[candidate].scheduler_link.unwrap().index();
        }
        if self.tasks[candidate].state == TaskState::Ready {
            if self.tasks[start].state == TaskState::Running {
                self.tasks[start].state = TaskState::Ready;
            }
            self.current = candidate;
            self.tasks[self.current].state = TaskState::Running;
        }
    }

    /// Runs the scheduler and publishes the new current task to the
    /// architecture layer. Called from the service exception (`PendSV` on
    /// real hardware), never from tick context directly.
    pub fn reschedule(&mut self) {
        self.select();
        arch::set_current_task(&mut self.tasks[self.current]);
    }

    /// Advances the kernel clock to `now` and wakes any timed-blocked task
    /// whose deadline has passed. Never switches context itself.
    pub fn on_tick(&mut self, now: Ticks) {
        self.tick = now;
        for i in 0..self.num_tasks {
            if self.tasks[i].is_timed_wait_due(now) {
                self.tasks[i].state = TaskState::Ready;
                self.tasks[i].wakeup_time = Ticks::ZERO;
            }
        }
    }

    /// Blocks the current task until `now + ticks`. `ticks == 0` is a no-op.
    pub fn sleep_current(&mut self, ticks: u64) {
        if ticks == 0 {
            return;
        }
        let wake = self.tick + ticks;
        let cur = self.current;
        self.tasks[cur].state = TaskState::Blocked;
        self.tasks[cur].wakeup_time = wake;
    }
}

/// Pends a reschedule and, on backends where the service exception isn't
/// delivered asynchronously (the host simulator), runs it immediately. On
/// real hardware this just sets the pending bit: the actual switch happens
/// later, in `PendSV`, once interrupts are unmasked.
pub(crate) fn request_reschedule() {
    arch::pend_reschedule();
    if arch::take_pending_reschedule() {
        with_kernel(Kernel::reschedule);
    }
}

/// Idempotent by construction: the kernel-global state is a `static`,
/// already initialized before `main` runs. Kept as an explicit call for API
/// parity with the rest of the kernel's init functions (`mutex_init`,
/// `pool_init`, ...), which do need real work done.
pub fn kernel_init() {}

/// Creates a new task, to be called only before [`kernel_start`].
pub fn create_task(entry: fn() -> !) -> Result<TaskIndex> {
    with_kernel(|k| k.create_task(entry as usize))
}

/// Blocks the calling task for `ticks` scheduler ticks.
pub fn sleep(ticks: u64) {
    with_kernel(|k| k.sleep_current(ticks));
    request_reschedule();
}

/// Starts the scheduler. Never returns: control transfers to the first
/// created task.
pub fn kernel_start() -> ! {
    with_kernel(|k| {
        k.current = 0;
        k.tasks[0].state = TaskState::Running;
        arch::set_current_task(&mut k.tasks[0]);
    });
    arch::start_first_task()
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
    fn create_task_fills_circular_scheduler_list() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();
        assert_eq!(k.task(a).scheduler_link, Some(a));

        let b = k.create_task(entry_addr()).unwrap();
        assert_eq!(k.task(a).scheduler_link, Some(b));
        assert_eq!(k.task(b).scheduler_link, Some(a));

        let c = k.create_task(entry_addr()).unwrap();
        assert_eq!(k.task(b).scheduler_link, Some(c));
        assert_eq!(k.task(c).scheduler_link, Some(a));
    }

    #[test]
    fn create_task_past_capacity_fails() {
        let mut k = Kernel::new();
        for _ in 0..MAX_TASKS {
            k.create_task(entry_addr()).unwrap();
        }
        assert_eq!(
            k.create_task(entry_addr()).unwrap_err(),
            KernelError::TaskCapacity
        );
    }

    #[test]
    fn reschedule_round_robins_ready_tasks() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();
        let b = k.create_task(entry_addr()).unwrap();
        let c = k.create_task(entry_addr()).unwrap();
        k.set_current(a);
        k.tasks[a.index()].state = TaskState::Running;

        k.reschedule();
        assert_eq!(k.current(), b);
        k.reschedule();
        assert_eq!(k.current(), c);
        k.reschedule();
        assert_eq!(k.current(), a);
    }

    #[test]
    fn reschedule_skips_blocked_tasks() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();
        let b = k.create_task(entry_addr()).unwrap();
        let c = k.create_task(entry_addr()).unwrap();
        k.set_current(a);
        k.tasks[a.index()].state = TaskState::Running;
        k.tasks[b.index()].state = TaskState::Blocked;

        k.reschedule();
        assert_eq!(k.current(), c);
    }

    #[test]
    fn reschedule_with_nothing_ready_keeps_current_running() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();
        let b = k.create_task(entry_addr()).unwrap();
        k.set_current(a);
        k.tasks[a.index()].state = TaskState::Running;
        k.tasks[b.index()].state = TaskState::Blocked;

        k.reschedule();
        assert_eq!(k.current(), a);
        assert_eq!(k.task(a).state, TaskState::Running);
    }

    #[test]
    fn sleep_current_blocks_until_wakeup_and_on_tick_wakes_it() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();
        k.set_current(a);
        k.tasks[a.index()].state = TaskState::Running;

        k.sleep_current(5);
        assert_eq!(k.task(a).state, TaskState::Blocked);
        assert_eq!(k.task(a).wakeup_time, Ticks::from(5));

        k.on_tick(Ticks::from(4));
        assert_eq!(k.task(a).state, TaskState::Blocked);

        k.on_tick(Ticks::from(5));
        assert_eq!(k.task(a).state, TaskState::Ready);
        assert_eq!(k.task(a).wakeup_time, Ticks::ZERO);
    }

    #[test]
    fn sleep_current_with_zero_ticks_is_a_no_op() {
        let mut k = Kernel::new();
        let a = k.create_task(entry_addr()).unwrap();
        k.set_current(a);
        k.tasks[a.index()].state = TaskState::Running;

        k.sleep_current(0);
        assert_eq!(k.task(a).state, TaskState::Running);
    }
}
