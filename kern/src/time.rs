// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Implementation of kernel time.

/// In-kernel timestamp representation.
///
/// Measured in ticks of the periodic scheduler timer (`config::TICK_HZ` per
/// second). Stored as a 64-bit count internally so wraparound is not a
/// concern within any realistic mission duration, even though the underlying
/// hardware counter this is built from is only 32 bits wide.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
#[repr(transparent)]
pub struct Ticks(u64);

impl Ticks {
    pub const ZERO: Ticks = Ticks(0);

    pub fn checked_add(self, delta: u64) -> Option<Ticks> {
        self.0.checked_add(delta).map(Ticks)
    }
}

impl From<u64> for Ticks {
    fn from(v: u64) -> Self {
        Ticks(v)
    }
}

impl From<Ticks> for u64 {
    fn from(v: Ticks) -> Self {
        v.0
    }
}

impl core::ops::Add<u64> for Ticks {
    type Output = Ticks;
    fn add(self, rhs: u64) -> Ticks {
        Ticks(self.0 + rhs)
    }
}
