// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Independent watchdog (IWDG).

use stm32f4xx_hal::{pac, prelude::*, watchdog::IndependentWatchdog};
use thermonode::hw::Watchdog;

pub struct Iwdg {
    wdt: IndependentWatchdog,
}

impl Iwdg {
    /// Start the watchdog. Once started it cannot be stopped.
    pub fn start(iwdg: pac::IWDG, timeout_ms: u32) -> Self {
        let mut wdt = IndependentWatchdog::new(iwdg);
        wdt.start(timeout_ms.millis());
        Self { wdt }
    }
}

impl Watchdog for Iwdg {
    fn feed(&mut self) {
        self.wdt.feed();
    }
}
