// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Thermal frames and the per-sweep aggregate.

use crate::channel::{ChannelHealth, ChannelId};
use crate::time::Instant;
use crate::{FRAME_HEIGHT, FRAME_PIXELS, FRAME_WIDTH, NUM_CHANNELS};

/// One 32×24 image from a single camera, in °C, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct ThermalFrame {
    pub channel: ChannelId,
    pub timestamp: Instant,
    /// Sensor die temperature computed while reading the frame.
    pub ambient: f32,
    pub pixels: [f32; FRAME_PIXELS],
}

/// Hottest pixel of a frame or aggregate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Hotspot {
    pub channel: ChannelId,
    pub column: u8,
    pub row: u8,
    pub celsius: f32,
}

impl ThermalFrame {
    pub fn new(channel: ChannelId, timestamp: Instant, ambient: f32) -> Self {
        Self {
            channel,
            timestamp,
            ambient,
            pixels: [0.0; FRAME_PIXELS],
        }
    }

    #[inline]
    pub fn index(column: usize, row: usize) -> usize {
        row * FRAME_WIDTH + column
    }

    /// Temperature at `(column, row)`, or `None` outside the 32×24 grid.
    pub fn pixel(&self, column: usize, row: usize) -> Option<f32> {
        if column < FRAME_WIDTH && row < FRAME_HEIGHT {
            Some(self.pixels[Self::index(column, row)])
        } else {
            None
        }
    }

    pub fn min(&self) -> f32 {
        self.pixels.iter().copied().fold(f32::INFINITY, f32::min)
    }

    pub fn max(&self) -> f32 {
        self.pixels.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn mean(&self) -> f32 {
        self.pixels.iter().sum::<f32>() / FRAME_PIXELS as f32
    }

    /// Hottest pixel. Ties resolve to the first in row-major order.
    pub fn hottest(&self) -> Hotspot {
        let mut best = 0;
        for (i, &t) in self.pixels.iter().enumerate() {
            if t > self.pixels[best] {
                best = i;
            }
        }
        Hotspot {
            channel: self.channel,
            column: (best % FRAME_WIDTH) as u8,
            row: (best / FRAME_WIDTH) as u8,
            celsius: self.pixels[best],
        }
    }
}

/// Result of one sweep over all channels.
///
/// Slots are indexed by channel, so an aggregate can never hold two frames for the same camera.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregatedFrame {
    pub sequence: u32,
    pub started: Instant,
    pub finished: Instant,
    /// All four channels reported within the reporting window.
    pub complete: bool,
    pub health: [ChannelHealth; NUM_CHANNELS],
    pub slots: [Option<ThermalFrame>; NUM_CHANNELS],
}

impl AggregatedFrame {
    pub fn frame(&self, channel: ChannelId) -> Option<&ThermalFrame> {
        self.slots[channel.index()].as_ref()
    }

    /// Present frames in channel order.
    pub fn frames(&self) -> impl Iterator<Item = &ThermalFrame> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn present_count(&self) -> usize {
        self.frames().count()
    }

    /// Channels that did not deliver a frame this sweep.
    pub fn missing(&self) -> impl Iterator<Item = ChannelId> + '_ {
        ChannelId::ALL
            .into_iter()
            .filter(move |ch| self.slots[ch.index()].is_none())
    }

    /// Hottest pixel across every present frame.
    pub fn hotspot(&self) -> Option<Hotspot> {
        self.frames()
            .map(ThermalFrame::hottest)
            .fold(None, |best: Option<Hotspot>, h| match best {
                Some(b) if b.celsius >= h.celsius => Some(b),
                _ => Some(h),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(channel: ChannelId, base: f32) -> ThermalFrame {
        let mut f = ThermalFrame::new(channel, Instant::from_ticks(0), 25.0);
        f.pixels = [base; FRAME_PIXELS];
        f
    }

    #[test]
    fn hottest_reports_column_and_row() {
        let mut f = frame(ChannelId::Ch1, 20.0);
        f.pixels[ThermalFrame::index(7, 5)] = 80.5;

        let h = f.hottest();
        assert_eq!((h.column, h.row), (7, 5));
        assert_eq!(h.celsius, 80.5);
        assert_eq!(f.max(), 80.5);
        assert_eq!(f.min(), 20.0);
        assert_eq!(f.pixel(7, 5), Some(80.5));
        assert_eq!(f.pixel(32, 0), None);
    }

    #[test]
    fn mean_averages_every_pixel() {
        let mut f = frame(ChannelId::Ch0, 20.0);
        assert_eq!(f.mean(), 20.0);

        // Bottom half of the image at 30 °C.
        for t in &mut f.pixels[FRAME_PIXELS / 2..] {
            *t = 30.0;
        }
        assert_eq!(f.mean(), 25.0);
    }

    #[test]
    fn aggregate_hotspot_spans_channels_and_skips_missing() {
        let mut hot = frame(ChannelId::Ch2, 30.0);
        hot.pixels[0] = 95.0;

        let agg = AggregatedFrame {
            sequence: 1,
            started: Instant::from_ticks(0),
            finished: Instant::from_ticks(10),
            complete: false,
            health: [
                ChannelHealth::Ok,
                ChannelHealth::Timeout,
                ChannelHealth::Ok,
                ChannelHealth::I2cError,
            ],
            slots: [Some(frame(ChannelId::Ch0, 40.0)), None, Some(hot), None],
        };

        assert_eq!(agg.present_count(), 2);
        let missing: heapless::Vec<ChannelId, 4> = agg.missing().collect();
        assert_eq!(&missing[..], &[ChannelId::Ch1, ChannelId::Ch3]);
        let h = agg.hotspot().unwrap();
        assert_eq!(h.channel, ChannelId::Ch2);
        assert_eq!(h.celsius, 95.0);
    }
}
