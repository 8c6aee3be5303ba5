// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-testable stand-in for the CPU primitives in `arch::arm_m`.
//!
//! There is no hardware here, so "disabling interrupts" and "pending a
//! reschedule" can't mean what they mean on real Cortex-M. This module
//! models them as cooperative bookkeeping instead: interrupt masking is a
//! reentrant nesting counter (so tests can assert "we are currently inside a
//! critical section"), and a pended reschedule is a flag the kernel's own
//! call sites consult synchronously, since nothing here delivers an
//! asynchronous exception to run it for them.
//!
//! This is the backend `cargo test` runs the whole kernel against.

use core::cell::Cell;

macro_rules! uassert {
    ($cond:expr) => {
        if !$cond {
            panic!("Assertion failed!");
        }
    };
}

/// Nesting depth of `disable_irq` before the call that produced this value.
/// Restoring it is what makes `disable_irq`/`enable_irq` safely nestable.
pub struct RestoreState(u32);

impl RestoreState {
    pub(crate) fn into_raw(self) -> u32 {
        self.0
    }

    pub(crate) fn from_raw(raw: u32) -> Self {
        RestoreState(raw)
    }
}

std::thread_local! {
    static IRQ_NESTING: Cell<u32> = const { Cell::new(0) };
    static RESCHEDULE_PENDED: Cell<bool> = const { Cell::new(false) };
}

pub fn disable_irq() -> RestoreState {
    let depth = IRQ_NESTING.with(|c| {
        let d = c.get();
        uassert!(d < u32::MAX);
        c.set(d + 1);
        d
    });
    RestoreState(depth)
}

pub fn enable_irq(restore: RestoreState) {
    IRQ_NESTING.with(|c| c.set(restore.0));
}

/// True while a (possibly nested) critical section is open on this thread.
/// Exposed for tests that want to assert sync primitives bracket their
/// mutations correctly.
pub fn irqs_disabled() -> bool {
    IRQ_NESTING.with(|c| c.get() > 0)
}

pub fn pend_reschedule() {
    RESCHEDULE_PENDED.with(|c| c.set(true));
}

/// Consumes the pending-reschedule flag, returning whether it was set.
/// `sched::Kernel` polls this after every operation that might have pended
/// one, standing in for the real service-exception firing.
pub fn take_pending_reschedule() -> bool {
    RESCHEDULE_PENDED.with(|c| {
        let v = c.get();
        c.set(false);
        v
    })
}

/// Builds the task's initial machine state.
///
/// Real hardware needs a synthetic exception frame written onto the stack;
/// the simulator has no stack-pointer-driven dispatch; it just remembers
/// which entry function this slot belongs to, for host tests that choose to
/// invoke it directly. The returned value stands in for the initial stack
/// pointer and is opaque to callers.
pub fn initialize_stack(stack: &mut [usize], entry: usize) -> usize {
    if let Some(top) = stack.last_mut() {
        *top = entry;
    }
    entry
}

/// Real hardware stashes a pointer for the context-switch assembly to
/// read later. There's no assembly here, so this is a no-op; tests read
/// the current task back out of the `Kernel` they hold directly instead.
pub fn set_current_task(_task: &mut crate::task::Task) {}

/// There's no hardware to "enter userland" on. Exercising task bodies
/// concurrently isn't this backend's job — tests drive `Kernel`'s state
/// machine directly instead, the way `arch::arm_m`'s teacher-equivalent
/// (`arch::fake`) simply panics rather than pretending to dispatch.
pub fn start_first_task() -> ! {
    panic!("sim backend has no hardware to dispatch tasks on");
}
