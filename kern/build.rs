// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    expose_m_profile();
    generate_consts()?;
    Ok(())
}

/// Exposes the target's ARM-M profile as a `cfg` so `arch::arm_m` can select
/// the right exception-return / FPU handling without needing to parse the
/// target triple at runtime.
fn expose_m_profile() {
    let target = env::var("TARGET").unwrap_or_default();
    println!("cargo:rerun-if-env-changed=TARGET");
    if target.starts_with("thumbv6m") {
        println!("cargo:rustc-cfg=armv6m");
    } else if target.starts_with("thumbv7m") || target.starts_with("thumbv7em") {
        println!("cargo:rustc-cfg=armv7m");
    } else if target.starts_with("thumbv8m") {
        println!("cargo:rustc-cfg=armv8m");
    }
}

/// Generates `config.rs`, read in by `lib.rs`, fixing the kernel's static
/// configuration constants. Board integrators retune the kernel by setting
/// these environment variables rather than editing source.
fn generate_consts() -> Result<(), Box<dyn std::error::Error>> {
    let out = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    let mut f = File::create(out.join("config.rs"))?;

    let max_tasks = env_or("KERNEL_MAX_TASKS", 5u32);
    let stack_words = env_or("KERNEL_STACK_WORDS", 256u32);
    let queue_capacity = env_or("KERNEL_QUEUE_CAPACITY", 16u32);
    let tick_hz = env_or("KERNEL_TICK_HZ", 1000u32);

    writeln!(
        f,
        "// Generated by build.rs from KERNEL_* environment variables."
    )?;
    writeln!(f, "pub const MAX_TASKS: usize = {max_tasks};")?;
    writeln!(f, "pub const STACK_WORDS: usize = {stack_words};")?;
    writeln!(f, "pub const QUEUE_CAPACITY: usize = {queue_capacity};")?;
    writeln!(f, "pub const TICK_HZ: u32 = {tick_hz};")?;

    Ok(())
}

fn env_or(name: &str, default: u32) -> u32 {
    println!("cargo:rerun-if-env-changed={name}");
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
