// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Monotonic time used across the node.
//!
//! Everything is expressed in milliseconds since boot on a 64-bit counter, so wrap-around is not a
//! concern for the lifetime of the device.

/// Point in time, milliseconds since boot.
pub type Instant = fugit::TimerInstantU64<1000>;

/// Span of time in milliseconds.
pub type Duration = fugit::MillisDurationU64;

/// Source of monotonic time.
///
/// On the board this is backed by SysTick; tests use a manually advanced clock.
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Milliseconds since boot, as carried on the wire.
#[inline]
pub fn millis(instant: Instant) -> u64 {
    instant.ticks()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use core::cell::Cell;

    /// Clock advanced by hand, or automatically by `step` on every read.
    pub struct ManualClock {
        now: Cell<u64>,
        step: Cell<u64>,
    }

    impl ManualClock {
        pub fn new(start_ms: u64) -> Self {
            Self {
                now: Cell::new(start_ms),
                step: Cell::new(0),
            }
        }

        pub fn ticking(start_ms: u64, step_ms: u64) -> Self {
            Self {
                now: Cell::new(start_ms),
                step: Cell::new(step_ms),
            }
        }

        pub fn advance(&self, ms: u64) {
            self.now.set(self.now.get() + ms);
        }

        pub fn set(&self, ms: u64) {
            self.now.set(ms);
        }

        pub fn set_step(&self, step_ms: u64) {
            self.step.set(step_ms);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            let t = self.now.get();
            self.now.set(t + self.step.get());
            Instant::from_ticks(t)
        }
    }
}
