// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Binary indicator outputs (status LED, alarm line).

use embedded_hal::digital::OutputPin;

/// Whether the output is driven active-high or active-low on the board wiring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActiveLevel {
    High,
    Low,
}

/// Output that remembers its active level and last commanded state.
pub struct Led<PIN: OutputPin> {
    pin: PIN,
    active: ActiveLevel,
    is_on: bool,
}

impl<PIN: OutputPin> Led<PIN> {
    /// Wrap `pin` and drive it to the inactive level.
    pub fn new(mut pin: PIN, active: ActiveLevel) -> Self {
        match active {
            ActiveLevel::High => pin.set_low().ok(),
            ActiveLevel::Low => pin.set_high().ok(),
        };
        Self {
            pin,
            active,
            is_on: false,
        }
    }

    pub fn active_high(pin: PIN) -> Self {
        Self::new(pin, ActiveLevel::High)
    }

    pub fn active_low(pin: PIN) -> Self {
        Self::new(pin, ActiveLevel::Low)
    }

    /// Drive the output logically on or off. Returns `true` if the state changed.
    pub fn set(&mut self, on: bool) -> bool {
        let level_high = matches!(
            (self.active, on),
            (ActiveLevel::High, true) | (ActiveLevel::Low, false)
        );
        if level_high {
            self.pin.set_high().ok();
        } else {
            self.pin.set_low().ok();
        }
        let changed = self.is_on != on;
        self.is_on = on;
        changed
    }

    #[inline]
    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn free(self) -> PIN {
        self.pin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Pin;

    #[test]
    fn starts_inactive_for_either_polarity() {
        let high = Pin::default();
        let led = Led::active_high(high.clone());
        assert!(!high.is_high());
        assert!(!led.is_on());

        let low = Pin::default();
        let _led = Led::active_low(low.clone());
        assert!(low.is_high());
    }

    #[test]
    fn set_reports_changes_only() {
        let pin = Pin::default();
        let mut led = Led::active_low(pin.clone());

        assert!(led.set(true));
        assert!(!pin.is_high());
        assert!(!led.set(true));
        assert!(led.set(false));
        assert!(pin.is_high());
    }
}
