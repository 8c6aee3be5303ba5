// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Architecture support for ARMv7-M and ARMv8-M (Cortex-M3/M4/M33).
//!
//! # The timer
//!
//! We use the system tick timer as the kernel timer. Its counter is small
//! and only counts down, so at each `SysTick` interrupt we increment the
//! `TICKS` global that holds the real kernel timestamp.
//!
//! # Notes on interrupts
//!
//! This implementation uses two interrupt handlers:
//!
//! - `SysTick` advances the kernel clock and wakes timed-blocked tasks, but
//!   does not itself switch context: its entry sequence doesn't save enough
//!   machine state to resume a *different* task efficiently.
//! - `PendSV` does the full save/restore sequence and actually performs the
//!   context switch. `SysTick` requests one by pending `PendSV`, which runs
//!   after `SysTick` returns (it won't preempt it, but follows it).
//!
//! `SVCall` is used exactly once per boot, to bootstrap into the first task
//! from thread mode: the hardware will only honor the magic `EXC_RETURN`
//! value from handler mode, so getting there takes a supervisor call.

use core::arch::global_asm;
use core::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

use crate::sched;
use crate::task::Task;
use crate::time::Ticks;

macro_rules! uassert {
    ($cond:expr) => {
        if !$cond {
            panic!("Assertion failed!");
        }
    };
}

/// There's no scratch register available to hand the PendSV entry assembly
/// a pointer to the current task, so we keep one here. Task's first field
/// is its `stack_pointer`, so the assembly below can load/store it by
/// dereferencing this pointer directly.
#[no_mangle]
static CURRENT_TASK_PTR: AtomicPtr<Task> = AtomicPtr::new(core::ptr::null_mut());

static TICKS: [AtomicU32; 2] = {
    #[allow(clippy::declare_interior_mutable_const)]
    const ZERO: AtomicU32 = AtomicU32::new(0);
    [ZERO; 2]
};

/// Opaque handle returned by `disable_irq`, restoring the interrupt mask
/// state it was captured from.
pub struct RestoreState(u32);

impl RestoreState {
    pub(crate) fn into_raw(self) -> u32 {
        self.0
    }

    pub(crate) fn from_raw(raw: u32) -> Self {
        RestoreState(raw)
    }
}

pub fn disable_irq() -> RestoreState {
    let primask: u32;
    unsafe {
        core::arch::asm!(
            "mrs {0}, PRIMASK",
            "cpsid i",
            out(reg) primask,
            options(nostack, preserves_flags)
        );
    }
    RestoreState(primask)
}

pub fn enable_irq(restore: RestoreState) {
    if restore.0 & 1 == 0 {
        unsafe {
            core::arch::asm!("cpsie i", options(nostack, preserves_flags));
        }
    }
}

pub fn pend_reschedule() {
    cortex_m::peripheral::SCB::set_pendsv();
}

/// Real hardware delivers the service exception asynchronously; there is
/// nothing to poll here. Always `false`.
pub fn take_pending_reschedule() -> bool {
    false
}

/// Builds the synthetic exception frame a task starts life with: the 8
/// hardware-pushed words, and 8 zeroed callee-saved words below them, so
/// the very first dispatch of a task looks exactly like any other context
/// switch to the assembly in `PendSV`/`SVCall`.
///
/// `stack` must be the task's full stack buffer; `entry` is the task
/// entry's address (thumb bit will be set here).
pub fn initialize_stack(stack: &mut [usize], entry: usize) -> usize {
    let len = stack.len();
    uassert!(len >= 16);

    let hw = &mut stack[len - 8..];
    hw[0] = 0; // r0
    hw[1] = 0; // r1
    hw[2] = 0; // r2
    hw[3] = 0; // r3
    hw[4] = 0; // r12
    hw[5] = 0xFFFF_FFFF; // lr: a task body must never actually return
    hw[6] = entry | 1; // pc, thumb bit set
    hw[7] = 1 << 24; // xpsr: thumb bit set, nothing else

    for w in &mut stack[len - 16..len - 8] {
        *w = 0; // r4-r11
    }

    stack[len - 16..].as_ptr() as usize
}

/// Installs a board's clock frequency, in kHz of the `SysTick` input clock,
/// and reloads the timer for `config::TICK_HZ` ticks per second. Must be
/// called once during startup, before interrupts are unmasked.
pub fn configure_systick(clock_khz: u32) {
    let clock_hz = u64::from(clock_khz) * 1000;
    let reload = (clock_hz / u64::from(crate::config::TICK_HZ)) as u32 - 1;
    let mut syst = unsafe { cortex_m::Peripherals::steal().SYST };
    syst.set_clock_source(cortex_m::peripheral::syst::SystClkSource::Core);
    syst.set_reload(reload);
    syst.clear_current();
    syst.enable_counter();
    syst.enable_interrupt();
}

/// Stashes the pointer to the task the next context switch should resume,
/// for `PendSV`/`SVCall` to read.
pub fn set_current_task(task: &mut Task) {
    CURRENT_TASK_PTR.store(task as *mut Task, Ordering::Relaxed);
}

/// Never returns: traps into `SVCall`, which loads the first task's
/// prepared stack frame and performs an exception return into it.
/// `set_current_task` must already have been called for the first task.
pub fn start_first_task() -> ! {
    unsafe {
        core::arch::asm!("svc 0", options(noreturn));
    }
}

#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn SysTick() {
    let t0 = TICKS[0].load(Ordering::Relaxed);
    let t1 = TICKS[1].load(Ordering::Relaxed);
    let (t0, t1) = if let Some(next) = t0.checked_add(1) {
        TICKS[0].store(next, Ordering::Relaxed);
        (next, t1)
    } else {
        TICKS[0].store(0, Ordering::Relaxed);
        TICKS[1].store(t1 + 1, Ordering::Relaxed);
        (0, t1 + 1)
    };
    let now = Ticks::from(u64::from(t0) | (u64::from(t1) << 32));

    sched::with_kernel(|kernel| kernel.on_tick(now));
    pend_reschedule();
}

global_asm! {"
    .section .text.PendSV
    .globl PendSV
    .type PendSV,function
    PendSV:
        @ r1 = current task pointer; Task's first field is stack_pointer.
        movw r0, #:lower16:CURRENT_TASK_PTR
        movt r0, #:upper16:CURRENT_TASK_PTR
        ldr r1, [r0]
        mrs r2, PSP
        stmdb r2!, {{r4-r11}}   @ push callee-saved registers onto this task's own stack
        str r2, [r1]            @ TCB.stack_pointer <- new top of stack

        bl pendsv_entry         @ may change CURRENT_TASK_PTR to a different task

        movw r0, #:lower16:CURRENT_TASK_PTR
        movt r0, #:upper16:CURRENT_TASK_PTR
        ldr r0, [r0]
        ldr r2, [r0]             @ TCB.stack_pointer
        ldmia r2!, {{r4-r11}}
        msr PSP, r2
        bx lr
    ",
}

/// Rust side of the `PendSV` handler, invoked once the outgoing task's
/// callee-saved registers have been pushed onto its own stack and its
/// resulting stack pointer stored into its TCB.
#[no_mangle]
unsafe extern "C" fn pendsv_entry() {
    let current = CURRENT_TASK_PTR.load(Ordering::Relaxed);
    uassert!(!current.is_null());
    sched::with_kernel(|kernel| kernel.reschedule());
}

global_asm! {"
    .section .text.SVCall
    .globl SVCall
    .type SVCall,function
    SVCall:
        @ Used once, to bootstrap into the first task: load its prepared
        @ stack frame and perform an exception return into it.
        movw r0, #:lower16:CURRENT_TASK_PTR
        movt r0, #:upper16:CURRENT_TASK_PTR
        ldr r0, [r0]
        ldr r1, [r0]            @ TCB.stack_pointer: base of the callee-saved frame
        ldmia r1!, {{r4-r11}}
        msr PSP, r1
        movs r0, #2             @ CONTROL: SPSEL=1 (use PSP); stays privileged
        msr CONTROL, r0
        isb
        ldr lr, =0xFFFFFFFD
        bx lr
    ",
}
