// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Status and alarm outputs.
//!
//! Both indicators are a pure function of the channel states, the network link, the alarm
//! thresholds and the previous indicator state. [`StatusOutputs`] then drives them onto the
//! board's two binary outputs.

use embedded_hal::digital::OutputPin;

use crate::channel::ChannelState;
use crate::config::Thresholds;
use crate::hw::Led;
use crate::network::LinkState;
use crate::NUM_CHANNELS;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Indicators {
    /// Link up and every channel healthy.
    pub status: bool,
    pub alarm: bool,
}

/// Compute the next indicator state.
///
/// `hottest` is the hottest present pixel of the latest sweep, or `None` when no channel
/// delivered a frame; in that case the alarm keeps its previous state.
pub fn evaluate(
    states: &[ChannelState; NUM_CHANNELS],
    link: LinkState,
    thresholds: &Thresholds,
    hottest: Option<f32>,
    previous: Indicators,
) -> Indicators {
    let status = link.is_up() && states.iter().all(|s| s.health.is_ok());

    let alarm = match hottest {
        Some(t) if t >= thresholds.alarm_celsius => true,
        Some(t) => previous.alarm && t >= thresholds.release_celsius(),
        None => previous.alarm,
    };

    Indicators { status, alarm }
}

/// Remembers the last indicator state between sweeps.
#[derive(Default)]
pub struct StatusController {
    current: Indicators,
}

impl StatusController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indicators(&self) -> Indicators {
        self.current
    }

    pub fn update(
        &mut self,
        states: &[ChannelState; NUM_CHANNELS],
        link: LinkState,
        thresholds: &Thresholds,
        hottest: Option<f32>,
    ) -> Indicators {
        let next = evaluate(states, link, thresholds, hottest, self.current);
        if next.alarm != self.current.alarm {
            match hottest {
                Some(t) if next.alarm => log::warn!("alarm raised: {} C", t),
                _ => log::info!("alarm cleared"),
            }
        }
        self.current = next;
        next
    }
}

/// The status LED and the alarm output.
pub struct StatusOutputs<S: OutputPin, A: OutputPin> {
    status: Led<S>,
    alarm: Led<A>,
}

impl<S: OutputPin, A: OutputPin> StatusOutputs<S, A> {
    pub fn new(status: Led<S>, alarm: Led<A>) -> Self {
        Self { status, alarm }
    }

    pub fn apply(&mut self, indicators: Indicators) {
        if self.status.set(indicators.status) {
            log::debug!("status output {}", if indicators.status { "on" } else { "off" });
        }
        self.alarm.set(indicators.alarm);
    }

    pub fn free(self) -> (Led<S>, Led<A>) {
        (self.status, self.alarm)
    }
}
