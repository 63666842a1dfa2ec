// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Frame aggregator: gathers one frame per channel into an [`AggregatedFrame`] per sweep.

use core::fmt;

use crate::channel::{ChannelHealth, ChannelId};
use crate::config::{self, ConfigError};
use crate::frame::{AggregatedFrame, ThermalFrame};
use crate::time::{Duration, Instant};
use crate::NUM_CHANNELS;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AggregateError {
    /// No sweep is open.
    NotStarted,
    /// The sweep already holds a frame for this channel.
    Duplicate(ChannelId),
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateError::NotStarted => f.write_str("no sweep in progress"),
            AggregateError::Duplicate(ch) => write!(f, "second frame for {} in one sweep", ch),
        }
    }
}

struct Sweep {
    started: Instant,
    deadline: Instant,
    slots: [Option<ThermalFrame>; NUM_CHANNELS],
}

pub struct FrameAggregator {
    window: Duration,
    sequence: u32,
    sweep: Option<Sweep>,
}

impl FrameAggregator {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            sequence: 0,
            sweep: None,
        }
    }

    /// Sequence number the next finished sweep will carry.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn deadline(&self) -> Duration {
        self.window
    }

    /// Change the reporting window. Takes effect at the next `begin`.
    pub fn set_deadline(&mut self, window: Duration) -> Result<(), ConfigError> {
        config::validate_sweep_deadline(window)?;
        self.window = window;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.sweep.is_some()
    }

    /// Open a sweep at `now`. An unfinished sweep is discarded.
    pub fn begin(&mut self, now: Instant) {
        if self.sweep.is_some() {
            log::warn!("aggregator: sweep {} abandoned", self.sequence);
        }
        self.sweep = Some(Sweep {
            started: now,
            deadline: now + self.window,
            slots: Default::default(),
        });
    }

    pub fn insert(&mut self, frame: ThermalFrame) -> Result<(), AggregateError> {
        let sweep = self.sweep.as_mut().ok_or(AggregateError::NotStarted)?;
        let slot = &mut sweep.slots[frame.channel.index()];
        if slot.is_some() {
            return Err(AggregateError::Duplicate(frame.channel));
        }
        *slot = Some(frame);
        Ok(())
    }

    /// `true` once `now` is past the open sweep's deadline.
    pub fn expired(&self, now: Instant) -> bool {
        self.sweep.as_ref().map_or(false, |s| now > s.deadline)
    }

    /// Close the sweep. Channels without a frame keep the health given in `health`.
    pub fn finish(
        &mut self,
        now: Instant,
        health: [ChannelHealth; NUM_CHANNELS],
    ) -> Result<AggregatedFrame, AggregateError> {
        let sweep = self.sweep.take().ok_or(AggregateError::NotStarted)?;
        let on_time = now <= sweep.deadline;
        let present = sweep.slots.iter().filter(|s| s.is_some()).count();

        let frame = AggregatedFrame {
            sequence: self.sequence,
            started: sweep.started,
            finished: now,
            complete: on_time && present == NUM_CHANNELS,
            health,
            slots: sweep.slots,
        };
        self.sequence = self.sequence.wrapping_add(1);

        log::debug!(
            "sweep {}: {}/{} channels in {} ms{}",
            frame.sequence,
            present,
            NUM_CHANNELS,
            (now - frame.started).ticks(),
            if on_time { "" } else { ", late" }
        );
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK: [ChannelHealth; NUM_CHANNELS] = [ChannelHealth::Ok; NUM_CHANNELS];

    fn at(ms: u64) -> Instant {
        Instant::from_ticks(ms)
    }

    fn frame(channel: ChannelId) -> ThermalFrame {
        ThermalFrame::new(channel, at(0), 25.0)
    }

    #[test]
    fn full_sweep_on_time_is_complete() {
        let mut agg = FrameAggregator::new(Duration::millis(2_000));
        agg.begin(at(100));
        for ch in ChannelId::ALL {
            agg.insert(frame(ch)).unwrap();
        }

        let out = agg.finish(at(900), OK).unwrap();
        assert!(out.complete);
        assert_eq!(out.present_count(), 4);
        assert_eq!(out.started, at(100));
        assert_eq!(out.finished, at(900));
        assert!(!agg.is_open());
    }

    #[test]
    fn second_frame_for_a_channel_is_rejected() {
        let mut agg = FrameAggregator::new(Duration::millis(2_000));
        agg.begin(at(0));
        agg.insert(frame(ChannelId::Ch2)).unwrap();
        assert_eq!(
            agg.insert(frame(ChannelId::Ch2)),
            Err(AggregateError::Duplicate(ChannelId::Ch2))
        );
    }

    #[test]
    fn insert_and_finish_need_an_open_sweep() {
        let mut agg = FrameAggregator::new(Duration::millis(2_000));
        assert_eq!(agg.insert(frame(ChannelId::Ch0)), Err(AggregateError::NotStarted));
        assert_eq!(agg.finish(at(0), OK), Err(AggregateError::NotStarted));
        assert!(!agg.expired(at(1_000_000)));
    }

    #[test]
    fn late_or_partial_sweeps_are_forwarded_incomplete() {
        let mut agg = FrameAggregator::new(Duration::millis(2_000));

        agg.begin(at(0));
        for ch in ChannelId::ALL {
            agg.insert(frame(ch)).unwrap();
        }
        assert!(!agg.expired(at(2_000)));
        assert!(agg.expired(at(2_001)));
        let late = agg.finish(at(2_001), OK).unwrap();
        assert!(!late.complete);
        assert_eq!(late.present_count(), 4);

        agg.begin(at(3_000));
        agg.insert(frame(ChannelId::Ch0)).unwrap();
        let health = [
            ChannelHealth::Ok,
            ChannelHealth::Timeout,
            ChannelHealth::I2cError,
            ChannelHealth::NotCalibrated,
        ];
        let partial = agg.finish(at(3_500), health).unwrap();
        assert!(!partial.complete);
        assert_eq!(partial.health, health);
        assert!(partial.frame(ChannelId::Ch1).is_none());
    }

    #[test]
    fn sequence_counts_finished_sweeps_and_wraps() {
        let mut agg = FrameAggregator::new(Duration::millis(2_000));
        agg.sequence = u32::MAX;

        agg.begin(at(0));
        assert_eq!(agg.finish(at(1), OK).unwrap().sequence, u32::MAX);
        agg.begin(at(2));
        assert_eq!(agg.finish(at(3), OK).unwrap().sequence, 0);
        assert_eq!(agg.sequence(), 1);
    }

    #[test]
    fn window_changes_apply_to_the_next_sweep() {
        let mut agg = FrameAggregator::new(Duration::millis(2_000));
        agg.begin(at(0));
        agg.set_deadline(Duration::millis(500)).unwrap();
        assert!(!agg.expired(at(1_000)));

        agg.begin(at(1_000));
        assert!(agg.expired(at(1_501)));
        assert_eq!(agg.set_deadline(Duration::millis(0)), Err(ConfigError::SweepDeadline));
        assert_eq!(agg.deadline(), Duration::millis(500));
    }
}
