// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Counters and link state shared between the acquisition and network contexts.
//!
//! Only atomics live here, so a `&'static Telemetry` can be read from any priority without a lock.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Ethernet link as seen by the collector: `Up` only while the PHY has link *and* the TCP
/// session is established.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Up,
}

impl LinkState {
    #[inline]
    pub fn is_up(self) -> bool {
        self == LinkState::Up
    }
}

pub struct Telemetry {
    link_up: AtomicBool,
    dropped_frames: AtomicU32,
    sent_frames: AtomicU32,
    reconnects: AtomicU32,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub const fn new() -> Self {
        Self {
            link_up: AtomicBool::new(false),
            dropped_frames: AtomicU32::new(0),
            sent_frames: AtomicU32::new(0),
            reconnects: AtomicU32::new(0),
        }
    }

    pub fn link(&self) -> LinkState {
        if self.link_up.load(Ordering::Acquire) {
            LinkState::Up
        } else {
            LinkState::Down
        }
    }

    /// Only the network reporter updates the link.
    pub(crate) fn set_link(&self, link: LinkState) {
        self.link_up.store(link.is_up(), Ordering::Release);
    }

    /// Count a discarded frame; returns the new total.
    pub fn record_drop(&self) -> u32 {
        self.dropped_frames.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    pub fn dropped_frames(&self) -> u32 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub(crate) fn record_sent(&self) {
        self.sent_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sent_frames(&self) -> u32 {
        self.sent_frames.load(Ordering::Relaxed)
    }

    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reconnects(&self) -> u32 {
        self.reconnects.load(Ordering::Relaxed)
    }
}
