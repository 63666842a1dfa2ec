// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Node configuration.
//!
//! Defaults describe the reference board; deployments override individual values with the
//! `with_*` builders before handing the configuration to the acquisition loop and reporter.
//! Runtime commands from the collector go through the same validation.

use core::fmt;

use crate::drivers::mlx90640::RefreshRate;
use crate::geometry::Mount;
use crate::time::Duration;
use crate::NUM_CHANNELS;

/// Configuration rejected by [`NodeConfig::validate`] or a runtime command.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// Emissivity must lie in (0, 1].
    Emissivity,
    /// Alarm threshold outside the camera's measurable range.
    AlarmThreshold,
    /// Hysteresis must be non-negative and below 50 °C.
    Hysteresis,
    /// Sweep deadline of zero, or longer than a minute.
    SweepDeadline,
    /// Backoff minimum is zero or exceeds the maximum.
    Backoff,
    /// Lockup detection needs at least one sweep.
    LockupSweeps,
    /// More read retries than one channel can spend between watchdog feeds.
    MaxRetries,
    /// Collector port of zero.
    Port,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Emissivity => f.write_str("emissivity must be in (0, 1]"),
            ConfigError::AlarmThreshold => f.write_str("alarm threshold out of range"),
            ConfigError::Hysteresis => f.write_str("hysteresis out of range"),
            ConfigError::SweepDeadline => f.write_str("sweep deadline out of range"),
            ConfigError::Backoff => f.write_str("invalid reconnect backoff"),
            ConfigError::LockupSweeps => f.write_str("lockup sweeps must be non-zero"),
            ConfigError::MaxRetries => write!(f, "at most {} retries per channel", MAX_RETRIES),
            ConfigError::Port => f.write_str("port must be non-zero"),
        }
    }
}

/// Lowest and highest object temperatures the MLX90640 reports.
pub const MEASURABLE_MIN_C: f32 = -40.0;
pub const MEASURABLE_MAX_C: f32 = 300.0;

const MAX_SWEEP_DEADLINE_MS: u64 = 60_000;

/// Upper bound on [`AcquisitionConfig::max_retries`]. The watchdog is fed between channels, so
/// one channel's attempts must fit in a watchdog period.
pub const MAX_RETRIES: u8 = 3;

/// Static IPv4 settings and collector endpoint.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NetworkConfig {
    pub mac: [u8; 6],
    pub ip: [u8; 4],
    pub gateway: [u8; 4],
    pub subnet: [u8; 4],
    /// Collector that receives aggregated frames.
    pub collector_ip: [u8; 4],
    pub collector_port: u16,
    /// Local TCP port used for the outbound connection.
    pub local_port: u16,
    /// First reconnect delay; doubles on every failure.
    pub backoff_min: Duration,
    /// Cap for the reconnect delay.
    pub backoff_max: Duration,
    /// Give up on a pending CONNECT after this long.
    pub connect_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            // Locally administered, unicast.
            mac: [0x02, 0x00, 0x00, 0x54, 0x4E, 0x01],
            ip: [192, 168, 1, 50],
            gateway: [192, 168, 1, 1],
            subnet: [255, 255, 255, 0],
            collector_ip: [192, 168, 1, 10],
            collector_port: 5140,
            local_port: 49152,
            backoff_min: Duration::millis(250),
            backoff_max: Duration::millis(16_000),
            connect_timeout: Duration::millis(3_000),
        }
    }
}

/// Camera polling parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AcquisitionConfig {
    pub refresh_rate: RefreshRate,
    /// Additional attempts after the first failed read of a channel.
    pub max_retries: u8,
    /// How long to wait for a camera to flag a new subpage.
    pub data_ready_timeout: Duration,
    /// Reporting window for one sweep of all four channels.
    pub sweep_deadline: Duration,
    /// Consecutive all-channel bus failures before the watchdog is starved.
    pub lockup_sweeps: u8,
    pub emissivity: f32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            refresh_rate: RefreshRate::Hz8,
            max_retries: 2,
            data_ready_timeout: Duration::millis(500),
            sweep_deadline: Duration::millis(2_000),
            lockup_sweeps: 3,
            emissivity: 0.95,
        }
    }
}

/// Alarm thresholds in °C.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Thresholds {
    /// Alarm asserts when any pixel reaches this temperature.
    pub alarm_celsius: f32,
    /// Alarm releases once the hottest pixel drops this far below `alarm_celsius`.
    pub hysteresis: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            alarm_celsius: 60.0,
            hysteresis: 2.0,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MEASURABLE_MIN_C..=MEASURABLE_MAX_C).contains(&self.alarm_celsius) {
            return Err(ConfigError::AlarmThreshold);
        }
        if !(0.0..50.0).contains(&self.hysteresis) {
            return Err(ConfigError::Hysteresis);
        }
        Ok(())
    }

    /// Temperature below which an active alarm releases.
    #[inline]
    pub fn release_celsius(&self) -> f32 {
        self.alarm_celsius - self.hysteresis
    }
}

/// Complete node configuration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub acquisition: AcquisitionConfig,
    pub thresholds: Thresholds,
    /// Camera mounting, indexed by channel.
    pub mounts: [Mount; NUM_CHANNELS],
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            acquisition: AcquisitionConfig::default(),
            thresholds: Thresholds::default(),
            mounts: Mount::quadrant_layout(),
        }
    }
}

impl NodeConfig {
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn with_collector(mut self, ip: [u8; 4], port: u16) -> Self {
        self.network.collector_ip = ip;
        self.network.collector_port = port;
        self
    }

    pub fn with_refresh_rate(mut self, rate: RefreshRate) -> Self {
        self.acquisition.refresh_rate = rate;
        self
    }

    pub fn with_max_retries(mut self, retries: u8) -> Self {
        self.acquisition.max_retries = retries;
        self
    }

    pub fn with_sweep_deadline(mut self, deadline: Duration) -> Self {
        self.acquisition.sweep_deadline = deadline;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_mounts(mut self, mounts: [Mount; NUM_CHANNELS]) -> Self {
        self.mounts = mounts;
        self
    }

    /// Check every field against the ranges the firmware can honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let acq = &self.acquisition;
        if !(acq.emissivity > 0.0 && acq.emissivity <= 1.0) {
            return Err(ConfigError::Emissivity);
        }
        validate_sweep_deadline(acq.sweep_deadline)?;
        if acq.lockup_sweeps == 0 {
            return Err(ConfigError::LockupSweeps);
        }
        if acq.max_retries > MAX_RETRIES {
            return Err(ConfigError::MaxRetries);
        }

        let net = &self.network;
        if net.backoff_min.ticks() == 0 || net.backoff_min > net.backoff_max {
            return Err(ConfigError::Backoff);
        }
        if net.collector_port == 0 || net.local_port == 0 {
            return Err(ConfigError::Port);
        }

        self.thresholds.validate()
    }
}

pub(crate) fn validate_sweep_deadline(deadline: Duration) -> Result<(), ConfigError> {
    let ms = deadline.ticks();
    if ms == 0 || ms > MAX_SWEEP_DEADLINE_MS {
        Err(ConfigError::SweepDeadline)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(NodeConfig::default().validate(), Ok(()));
    }

    #[test]
    fn builders_override_defaults() {
        let cfg = NodeConfig::default()
            .with_collector([10, 0, 0, 2], 9000)
            .with_max_retries(3)
            .with_sweep_deadline(Duration::millis(1500));

        assert_eq!(cfg.network.collector_ip, [10, 0, 0, 2]);
        assert_eq!(cfg.network.collector_port, 9000);
        assert_eq!(cfg.acquisition.max_retries, 3);
        assert_eq!(cfg.acquisition.sweep_deadline, Duration::millis(1500));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut cfg = NodeConfig::default();
        cfg.acquisition.emissivity = 0.0;
        assert_eq!(cfg.validate(), Err(ConfigError::Emissivity));

        let cfg = NodeConfig::default().with_sweep_deadline(Duration::millis(0));
        assert_eq!(cfg.validate(), Err(ConfigError::SweepDeadline));

        let cfg = NodeConfig::default().with_thresholds(Thresholds {
            alarm_celsius: 500.0,
            hysteresis: 2.0,
        });
        assert_eq!(cfg.validate(), Err(ConfigError::AlarmThreshold));

        let mut cfg = NodeConfig::default();
        cfg.network.backoff_min = Duration::millis(20_000);
        assert_eq!(cfg.validate(), Err(ConfigError::Backoff));

        let cfg = NodeConfig::default().with_max_retries(MAX_RETRIES + 1);
        assert_eq!(cfg.validate(), Err(ConfigError::MaxRetries));
    }

    #[test]
    fn release_point_sits_below_threshold() {
        let t = Thresholds {
            alarm_celsius: 70.0,
            hysteresis: 5.0,
        };
        assert_eq!(t.release_celsius(), 65.0);
    }
}
