// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Camera multiplex manager.
//!
//! Owns the I2C bus and the TCA9548A and borrows the four cameras, whose calibration tables are
//! too large to move around on a small stack. Every camera transaction is bracketed by
//! a select and a deselect of its multiplexer port, so at most one port is ever enabled and none
//! is left enabled between transactions.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::{self, I2c};

use crate::channel::{ChannelHealth, ChannelId, ChannelState};
use crate::config::AcquisitionConfig;
use crate::drivers::mlx90640::{CameraError, CaptureSettings, RefreshRate, ThermalCamera};
use crate::drivers::tca9548a::{MuxError, Tca9548a};
use crate::frame::ThermalFrame;
use crate::time::Clock;
use crate::NUM_CHANNELS;

/// Failure of one attempt on a channel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ChannelError<E> {
    /// The multiplexer could not be switched to the channel.
    Mux(MuxError<E>),
    Camera(CameraError<E>),
}

impl<E: i2c::Error> ChannelError<E> {
    pub fn health(&self) -> ChannelHealth {
        match self {
            ChannelError::Mux(_) => ChannelHealth::I2cError,
            ChannelError::Camera(e) => e.health(),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for ChannelError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Mux(e) => e.fmt(f),
            ChannelError::Camera(e) => e.fmt(f),
        }
    }
}

pub struct MultiplexManager<'c, I2C, RST, CAM> {
    bus: I2C,
    mux: Tca9548a<RST>,
    cameras: &'c mut [CAM; NUM_CHANNELS],
    states: [ChannelState; NUM_CHANNELS],
    max_retries: u8,
    refresh_rate: RefreshRate,
    /// Multiplexer selects that failed since boot.
    bus_faults: u32,
}

impl<'c, I2C, RST, CAM> MultiplexManager<'c, I2C, RST, CAM>
where
    I2C: I2c,
    RST: OutputPin,
    CAM: ThermalCamera<I2C>,
{
    pub fn new(
        bus: I2C,
        mux: Tca9548a<RST>,
        cameras: &'c mut [CAM; NUM_CHANNELS],
        config: &AcquisitionConfig,
    ) -> Self {
        Self {
            bus,
            mux,
            cameras,
            states: [ChannelState::new(); NUM_CHANNELS],
            max_retries: config.max_retries,
            refresh_rate: config.refresh_rate,
            bus_faults: 0,
        }
    }

    pub fn states(&self) -> &[ChannelState; NUM_CHANNELS] {
        &self.states
    }

    pub fn state(&self, channel: ChannelId) -> &ChannelState {
        &self.states[channel.index()]
    }

    pub fn health(&self) -> [ChannelHealth; NUM_CHANNELS] {
        self.states.map(|s| s.health)
    }

    pub fn bus_faults(&self) -> u32 {
        self.bus_faults
    }

    pub fn camera(&self, channel: ChannelId) -> &CAM {
        &self.cameras[channel.index()]
    }

    pub fn set_max_retries(&mut self, retries: u8) {
        self.max_retries = retries;
    }

    /// Record that `channel` was not read this cycle because the sweep ran out of time.
    pub fn mark_skipped(&mut self, channel: ChannelId) {
        self.states[channel.index()].record_failure(ChannelHealth::Timeout);
    }

    /// Run `f` against the camera on `channel` with its port selected, then deselect.
    ///
    /// A failed select counts as a bus fault and pulses the multiplexer's RESET line.
    fn with_channel<T>(
        &mut self,
        channel: ChannelId,
        f: impl FnOnce(&mut I2C, &mut CAM) -> Result<T, CameraError<I2C::Error>>,
    ) -> Result<T, ChannelError<I2C::Error>> {
        if let Err(e) = self.mux.select(&mut self.bus, channel.mux_port()) {
            self.bus_faults = self.bus_faults.saturating_add(1);
            log::warn!("mux: selecting {} failed: {}", channel, e);
            if let Err(e) = self.mux.deselect(&mut self.bus) {
                log::debug!("mux: deselect failed: {}", e);
            }
            if self.mux.reset() {
                log::info!("mux: pulsed reset");
            }
            return Err(ChannelError::Mux(e));
        }

        let result = f(&mut self.bus, &mut self.cameras[channel.index()]);

        if let Err(e) = self.mux.deselect(&mut self.bus) {
            log::warn!("mux: deselect after {} failed: {}", channel, e);
        }
        result.map_err(ChannelError::Camera)
    }

    /// Configure and load calibration for every camera. Channels that fail are retried on the
    /// next read.
    pub fn calibrate_all(&mut self) {
        for channel in ChannelId::ALL {
            let rate = self.refresh_rate;
            match self.with_channel(channel, |bus, cam| cam.calibrate(bus, rate)) {
                Ok(()) => log::info!("{}: calibrated", channel),
                Err(e) => {
                    log::warn!("{}: calibration failed: {}", channel, e);
                    self.states[channel.index()].record_failure(e.health());
                }
            }
        }
    }

    /// Read one full frame from `channel` into `frame`.
    ///
    /// Bus errors and data-ready timeouts are retried `max_retries` more times; an EEPROM that
    /// does not yield calibration is not retried until the next call. On failure the channel's
    /// health is returned and recorded, and `frame` is left unspecified.
    pub fn read_channel<D: DelayNs, C: Clock>(
        &mut self,
        channel: ChannelId,
        delay: &mut D,
        clock: &C,
        settings: &CaptureSettings,
        frame: &mut ThermalFrame,
    ) -> Result<(), ChannelHealth> {
        let rate = self.refresh_rate;
        let attempts = 1 + u32::from(self.max_retries);
        let mut health = ChannelHealth::I2cError;

        for attempt in 1..=attempts {
            let result = self.with_channel(channel, |bus, cam| {
                if !cam.is_calibrated() {
                    cam.calibrate(bus, rate)?;
                    log::info!("{}: calibrated", channel);
                }
                cam.capture(bus, &mut *delay, settings, &mut frame.pixels)
            });

            match result {
                Ok(ambient) => {
                    let state = &mut self.states[channel.index()];
                    if state.consecutive_failures > 0 {
                        log::info!(
                            "{}: recovered after {} failed cycles",
                            channel,
                            state.consecutive_failures
                        );
                    }
                    frame.channel = channel;
                    frame.ambient = ambient;
                    frame.timestamp = state.record_success(clock.now());
                    return Ok(());
                }
                Err(ChannelError::Camera(CameraError::Calibration(e)))
                    if !self.cameras[channel.index()].is_calibrated() =>
                {
                    log::warn!("{}: bad calibration data: {}", channel, e);
                    health = ChannelHealth::NotCalibrated;
                    break;
                }
                Err(e) => {
                    log::debug!("{}: attempt {}/{} failed: {}", channel, attempt, attempts, e);
                    health = e.health();
                }
            }
        }

        let state = &mut self.states[channel.index()];
        if state.consecutive_failures == 0 {
            log::warn!("{}: skipped this cycle ({:?})", channel, health);
        }
        state.record_failure(health);
        Err(health)
    }

    #[cfg(test)]
    pub(crate) fn bus_mut(&mut self) -> &mut I2C {
        &mut self.bus
    }

    pub fn free(self) -> (I2C, Tca9548a<RST>) {
        (self.bus, self.mux)
    }
}
