// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Millisecond monotonic clock driven by SysTick.

use core::cell::Cell;

use cortex_m::interrupt::{self, Mutex};
use cortex_m::peripheral::{syst::SystClkSource, SYST};
use thermonode::hw::Clock;
use thermonode::time::Instant;

static MILLIS: Mutex<Cell<u64>> = Mutex::new(Cell::new(0));

/// Configure SysTick for a 1 kHz interrupt from the core clock.
pub fn start(mut syst: SYST, sysclk_hz: u32) {
    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(sysclk_hz / 1_000 - 1);
    syst.clear_current();
    syst.enable_counter();
    syst.enable_interrupt();
}

/// Called from the SysTick handler.
pub fn tick() {
    interrupt::free(|cs| {
        let millis = MILLIS.borrow(cs);
        millis.set(millis.get() + 1);
    });
}

pub fn now() -> Instant {
    Instant::from_ticks(interrupt::free(|cs| MILLIS.borrow(cs).get()))
}

#[derive(Copy, Clone, Default)]
pub struct SysTickClock;

impl Clock for SysTickClock {
    fn now(&self) -> Instant {
        now()
    }
}
