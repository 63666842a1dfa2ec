// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Acquisition
//!
//! The sensor side of the node. [`AcquisitionLoop::run_sweep`] performs one cycle:
//!
//! 1. apply commands received by the reporter since the last sweep,
//! 2. read channels 0..3 through the [`MultiplexManager`] until the sweep deadline passes,
//!    feeding the watchdog after each channel,
//! 3. close the sweep in the [`FrameAggregator`],
//! 4. update the status and alarm outputs,
//! 5. offer the aggregate to the outbound queue,
//! 6. feed the watchdog unless the I2C bus is considered locked up.
//!
//! Once the bus counts as locked up no feed happens at all until a sweep gets past the bus.

pub mod aggregator;
pub mod multiplex;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;

use crate::channel::{ChannelHealth, ChannelId};
use crate::config::{ConfigError, NodeConfig};
use crate::drivers::mlx90640::{CaptureSettings, ThermalCamera};
use crate::frame::ThermalFrame;
use crate::hw::{Clock, Watchdog};
use crate::network::{CommandConsumer, FrameSender};
use crate::protocol::Command;
use crate::status::{Indicators, StatusController, StatusOutputs};
use crate::time::Duration;
use crate::NUM_CHANNELS;

pub use aggregator::{AggregateError, FrameAggregator};
pub use multiplex::{ChannelError, MultiplexManager};

/// Outcome of one sweep.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SweepReport {
    pub sequence: u32,
    /// Channels that delivered a frame.
    pub present: usize,
    pub complete: bool,
    /// The aggregate made it into the outbound queue.
    pub queued: bool,
    pub indicators: Indicators,
    /// The watchdog was not fed because of repeated bus failures.
    pub locked_up: bool,
}

pub struct AcquisitionLoop<'q, I2C, RST, CAM, D, C, W, SP: OutputPin, AP: OutputPin> {
    config: NodeConfig,
    manager: MultiplexManager<'q, I2C, RST, CAM>,
    aggregator: &'q mut FrameAggregator,
    status: StatusController,
    outputs: StatusOutputs<SP, AP>,
    frames: FrameSender<'q>,
    commands: CommandConsumer<'q>,
    delay: D,
    clock: C,
    watchdog: W,
    /// Consecutive sweeps in which every attempted channel failed on the bus.
    fault_sweeps: u8,
}

impl<'q, I2C, RST, CAM, D, C, W, SP, AP> AcquisitionLoop<'q, I2C, RST, CAM, D, C, W, SP, AP>
where
    I2C: I2c,
    RST: OutputPin,
    CAM: ThermalCamera<I2C>,
    D: DelayNs,
    C: Clock,
    W: Watchdog,
    SP: OutputPin,
    AP: OutputPin,
{
    /// `aggregator` takes the sweep deadline of `config`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: NodeConfig,
        manager: MultiplexManager<'q, I2C, RST, CAM>,
        aggregator: &'q mut FrameAggregator,
        outputs: StatusOutputs<SP, AP>,
        frames: FrameSender<'q>,
        commands: CommandConsumer<'q>,
        delay: D,
        clock: C,
        watchdog: W,
    ) -> Self {
        if let Err(e) = aggregator.set_deadline(config.acquisition.sweep_deadline) {
            log::warn!("keeping {} ms sweep deadline: {}", aggregator.deadline().ticks(), e);
        }
        Self {
            aggregator,
            config,
            manager,
            status: StatusController::new(),
            outputs,
            frames,
            commands,
            delay,
            clock,
            watchdog,
            fault_sweeps: 0,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn manager(&self) -> &MultiplexManager<'q, I2C, RST, CAM> {
        &self.manager
    }

    pub fn indicators(&self) -> Indicators {
        self.status.indicators()
    }

    pub fn is_locked_up(&self) -> bool {
        self.fault_sweeps >= self.config.acquisition.lockup_sweeps
    }

    /// Calibrate every camera. Channels that fail here are retried during the sweeps.
    pub fn start(&mut self) {
        self.manager.calibrate_all();
        self.watchdog.feed();
    }

    /// Apply a runtime command to the live configuration. Out-of-range values leave the
    /// configuration untouched.
    pub fn apply(&mut self, command: Command) -> Result<(), ConfigError> {
        let mut next = self.config;
        match command {
            Command::SetAlarmThreshold { celsius } => next.thresholds.alarm_celsius = celsius,
            Command::SetHysteresis { celsius } => next.thresholds.hysteresis = celsius,
            Command::SetSweepDeadline { millis } => {
                next.acquisition.sweep_deadline = Duration::millis(u64::from(millis))
            }
            Command::SetEmissivity { value } => next.acquisition.emissivity = value,
            Command::SetMaxRetries { retries } => next.acquisition.max_retries = retries,
        }
        next.validate()?;
        self.aggregator.set_deadline(next.acquisition.sweep_deadline)?;
        self.manager.set_max_retries(next.acquisition.max_retries);
        self.config = next;
        Ok(())
    }

    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.dequeue() {
            match self.apply(command) {
                Ok(()) => log::info!("applied {:?}", command),
                Err(e) => log::warn!("rejected {:?}: {}", command, e),
            }
        }
    }

    /// Run one acquisition cycle.
    pub fn run_sweep(&mut self) -> Result<SweepReport, AggregateError> {
        self.drain_commands();

        let settings = CaptureSettings {
            emissivity: self.config.acquisition.emissivity,
            data_ready_timeout: self.config.acquisition.data_ready_timeout,
        };
        let started = self.clock.now();
        self.aggregator.begin(started);

        let mut attempted = 0;
        let mut bus_errors = 0;
        let mut out_of_time = false;
        for channel in ChannelId::ALL {
            if !out_of_time && self.aggregator.expired(self.clock.now()) {
                log::warn!("sweep deadline passed before {}", channel);
                out_of_time = true;
            }
            if out_of_time {
                self.manager.mark_skipped(channel);
                continue;
            }

            attempted += 1;
            let mut frame = ThermalFrame::new(channel, started, 0.0);
            match self.manager.read_channel(
                channel,
                &mut self.delay,
                &self.clock,
                &settings,
                &mut frame,
            ) {
                Ok(()) => {
                    if let Err(e) = self.aggregator.insert(frame) {
                        log::error!("aggregator: {}", e);
                    }
                }
                Err(ChannelHealth::I2cError) => bus_errors += 1,
                Err(_) => {}
            }

            // A slow channel must not starve the watchdog; only a lockup may.
            if !self.is_locked_up() {
                self.watchdog.feed();
            }
        }

        let health = self.manager.health();
        let frame = self.aggregator.finish(self.clock.now(), health)?;
        let hottest = frame.hotspot().map(|h| h.celsius);
        let indicators = self.status.update(
            self.manager.states(),
            self.frames.telemetry().link(),
            &self.config.thresholds,
            hottest,
        );
        self.outputs.apply(indicators);

        let sequence = frame.sequence;
        let present = frame.present_count();
        let complete = frame.complete;
        let queued = self.frames.offer(frame);

        let locked_up = self.track_lockup(attempted > 0 && bus_errors == attempted);
        if !locked_up {
            self.watchdog.feed();
        }

        Ok(SweepReport {
            sequence,
            present,
            complete,
            queued,
            indicators,
            locked_up,
        })
    }

    fn track_lockup(&mut self, bus_fault_sweep: bool) -> bool {
        let limit = self.config.acquisition.lockup_sweeps;
        if bus_fault_sweep {
            self.fault_sweeps = self.fault_sweeps.saturating_add(1);
            if self.fault_sweeps == limit {
                log::error!(
                    "i2c bus locked up for {} sweeps ({} mux faults), starving watchdog",
                    limit,
                    self.manager.bus_faults()
                );
            }
        } else {
            if self.fault_sweeps >= limit {
                log::info!("i2c bus recovered");
            }
            self.fault_sweeps = 0;
        }
        self.is_locked_up()
    }
}
