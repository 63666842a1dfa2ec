// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Camera channels and their health.

use core::convert::TryFrom;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::time::{Duration, Instant};
use crate::NUM_CHANNELS;

/// One of the four camera channels, i.e. multiplexer ports 0..=3.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelId {
    Ch0,
    Ch1,
    Ch2,
    Ch3,
}

impl ChannelId {
    /// All channels in sweep order.
    pub const ALL: [ChannelId; NUM_CHANNELS] =
        [ChannelId::Ch0, ChannelId::Ch1, ChannelId::Ch2, ChannelId::Ch3];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Downstream port on the multiplexer.
    #[inline]
    pub fn mux_port(self) -> u8 {
        self as u8
    }
}

/// Raw value was not a valid channel number.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InvalidChannel(pub u8);

impl TryFrom<u8> for ChannelId {
    type Error = InvalidChannel;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(ChannelId::Ch0),
            1 => Ok(ChannelId::Ch1),
            2 => Ok(ChannelId::Ch2),
            3 => Ok(ChannelId::Ch3),
            other => Err(InvalidChannel(other)),
        }
    }
}

impl From<ChannelId> for u8 {
    fn from(ch: ChannelId) -> Self {
        ch as u8
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", *self as u8)
    }
}

/// Health of a camera channel after its most recent read attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelHealth {
    Ok,
    /// Camera did not flag new data in time.
    Timeout,
    /// NACK or other bus error on the channel.
    I2cError,
    /// Calibration has never been read successfully.
    NotCalibrated,
}

impl ChannelHealth {
    #[inline]
    pub fn is_ok(self) -> bool {
        self == ChannelHealth::Ok
    }
}

/// Book-keeping for one channel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChannelState {
    pub health: ChannelHealth,
    /// Timestamp of the last frame read successfully.
    pub last_success: Option<Instant>,
    /// Failed cycles since the last success.
    pub consecutive_failures: u32,
    /// Failed cycles since boot.
    pub total_failures: u32,
}

impl ChannelState {
    pub const fn new() -> Self {
        Self {
            health: ChannelHealth::NotCalibrated,
            last_success: None,
            consecutive_failures: 0,
            total_failures: 0,
        }
    }

    /// Record a successful read and return the timestamp to tag the frame with.
    ///
    /// Timestamps strictly increase per channel: if the clock has not moved past the previous
    /// read, the frame is stamped one millisecond after it.
    pub fn record_success(&mut self, now: Instant) -> Instant {
        let stamp = match self.last_success {
            Some(prev) if now <= prev => prev + Duration::millis(1),
            _ => now,
        };
        self.health = ChannelHealth::Ok;
        self.last_success = Some(stamp);
        self.consecutive_failures = 0;
        stamp
    }

    pub fn record_failure(&mut self, health: ChannelHealth) {
        self.health = health;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.total_failures = self.total_failures.saturating_add(1);
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}
