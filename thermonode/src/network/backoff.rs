// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Exponential reconnect backoff.

use crate::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max, next: min }
    }

    /// Delay before the next attempt. Doubles on every call, saturating at the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        let doubled = Duration::millis(delay.ticks().saturating_mul(2));
        self.next = if doubled > self.max { self.max } else { doubled };
        delay
    }

    /// Back to the minimum after a successful connection.
    pub fn reset(&mut self) {
        self.next = self.min;
    }

    pub fn peek(&self) -> Duration {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_then_saturates() {
        let mut b = Backoff::new(Duration::millis(250), Duration::millis(16_000));
        let delays: std::vec::Vec<u64> = (0..9).map(|_| b.next_delay().ticks()).collect();
        assert_eq!(
            delays,
            [250, 500, 1000, 2000, 4000, 8000, 16_000, 16_000, 16_000]
        );
    }

    #[test]
    fn reset_returns_to_minimum() {
        let mut b = Backoff::new(Duration::millis(100), Duration::millis(1000));
        b.next_delay();
        b.next_delay();
        assert_eq!(b.peek(), Duration::millis(400));
        b.reset();
        assert_eq!(b.next_delay(), Duration::millis(100));
    }

    #[test]
    fn cap_that_is_not_a_power_of_two_multiple() {
        let mut b = Backoff::new(Duration::millis(300), Duration::millis(1000));
        let delays: std::vec::Vec<u64> = (0..4).map(|_| b.next_delay().ticks()).collect();
        assert_eq!(delays, [300, 600, 1000, 1000]);
    }
}
