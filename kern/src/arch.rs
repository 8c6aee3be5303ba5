// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Architecture-specific support.
//!
//! In practice, this works by
//!
//! - Conditionally defining a nested module (below).
//! - `pub use`-ing its contents
//!
//! Thus, all architecture-specific types and functions show up right here in
//! the `arch` module, magically tailored for the current target.
//!
//! For this to work, each architecture support module must define the same
//! set of names: `RestoreState`, `disable_irq`, `enable_irq`,
//! `pend_reschedule`, `take_pending_reschedule`, `initialize_stack`,
//! `set_current_task`, `start_first_task`, and the `uassert!` macro.

cfg_if::cfg_if! {
    // Note: cfg_if! is slightly touchy about ordering and expression
    // complexity; this chain seems to be the best compromise.

    if #[cfg(all(target_arch = "arm", target_os = "none"))] {
        #[macro_use]
        pub mod arm_m;
        pub use arm_m::*;
    } else {
        // No bare-metal target: run against the host-testable cooperative
        // simulator instead. This is what `cargo test` exercises.
        #[macro_use]
        pub mod sim;
        pub use sim::*;
    }
}

/// Backs the `critical-section` crate with this backend's own
/// `disable_irq`/`enable_irq`, so any dependency that reaches for a
/// critical section (an atomic-polyfill, an allocator) nests correctly
/// inside the kernel's own, rather than opening a second, uncoordinated
/// one.
struct KernelCriticalSection;
critical_section::set_impl!(KernelCriticalSection);

unsafe impl critical_section::Impl for KernelCriticalSection {
    unsafe fn acquire() -> critical_section::RawRestoreState {
        disable_irq().into_raw()
    }

    unsafe fn release(restore_state: critical_section::RawRestoreState) {
        enable_irq(RestoreState::from_raw(restore_state));
    }
}
