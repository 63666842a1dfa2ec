// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Melexis MLX90640 32×24 thermopile camera.
//!
//! Registers are 16 bits wide and addressed with a 16-bit big-endian address; data words are
//! big-endian as well. The camera produces a frame as two subpages in a chess pattern, so a full
//! image takes two data-ready cycles.
//!
//! The bus is borrowed for each call. Several cameras share address `0x33` behind the
//! multiplexer, so the caller is responsible for having the right port selected.

pub mod calibration;
pub mod registers;

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, I2c};

use crate::channel::ChannelHealth;
use crate::time::Duration;
use crate::FRAME_PIXELS;

pub use calibration::{Calibration, CalibrationError, SubpageData};
pub use registers::{Control, RefreshRate, Status};

use registers::{CONTROL, EEPROM_START, RAM_START, STATUS};

/// Factory I2C address.
pub const DEFAULT_ADDRESS: u8 = 0x33;

/// Words fetched per I2C read when dumping RAM or EEPROM.
const CHUNK_WORDS: usize = 32;

/// Subpage reads allowed before a full frame is given up on.
const MAX_SUBPAGE_ATTEMPTS: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CameraError<E> {
    /// Bus error while talking to the camera.
    I2c(E),
    /// No new subpage was flagged within the data-ready timeout.
    Timeout,
    /// EEPROM contents could not be turned into calibration.
    Calibration(CalibrationError),
    /// A frame was requested before calibration was loaded.
    NotCalibrated,
}

impl<E: i2c::Error> CameraError<E> {
    /// Channel health this failure maps to.
    pub fn health(&self) -> ChannelHealth {
        match self {
            CameraError::I2c(_) => ChannelHealth::I2cError,
            CameraError::Timeout => ChannelHealth::Timeout,
            CameraError::Calibration(_) | CameraError::NotCalibrated => {
                ChannelHealth::NotCalibrated
            }
        }
    }
}

impl<E: fmt::Debug> fmt::Display for CameraError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::I2c(e) => write!(f, "camera bus error: {:?}", e),
            CameraError::Timeout => f.write_str("camera data-ready timeout"),
            CameraError::Calibration(e) => write!(f, "camera calibration: {}", e),
            CameraError::NotCalibrated => f.write_str("camera not calibrated"),
        }
    }
}

impl<E> From<CalibrationError> for CameraError<E> {
    fn from(e: CalibrationError) -> Self {
        CameraError::Calibration(e)
    }
}

/// Per-capture parameters handed down by the multiplex manager.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CaptureSettings {
    pub emissivity: f32,
    /// Longest wait for one subpage.
    pub data_ready_timeout: Duration,
}

/// A calibrated thermal camera on the shared I2C bus.
///
/// The multiplex manager only relies on this trait, so its channel selection and retry logic is
/// independent of the sensor's calibration math.
pub trait ThermalCamera<I2C: I2c> {
    fn is_calibrated(&self) -> bool;

    /// Configure the sensor and load its calibration.
    fn calibrate(
        &mut self,
        bus: &mut I2C,
        rate: RefreshRate,
    ) -> Result<(), CameraError<I2C::Error>>;

    /// Capture one full frame into `pixels` (°C) and return the sensor ambient temperature.
    fn capture<D: DelayNs>(
        &mut self,
        bus: &mut I2C,
        delay: &mut D,
        settings: &CaptureSettings,
        pixels: &mut [f32; FRAME_PIXELS],
    ) -> Result<f32, CameraError<I2C::Error>>;
}

/// MLX90640 driver holding the camera's calibration and one subpage of scratch RAM.
pub struct Mlx90640 {
    address: u8,
    calibration: Option<Calibration>,
    scratch: SubpageData,
}

impl Mlx90640 {
    pub const fn new(address: u8) -> Self {
        Self {
            address,
            calibration: None,
            scratch: SubpageData::new(),
        }
    }

    #[inline]
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    /// Read consecutive words starting at `start`.
    pub fn read_words<I2C: I2c>(
        &self,
        bus: &mut I2C,
        start: u16,
        out: &mut [u16],
    ) -> Result<(), I2C::Error> {
        read_chunked(bus, self.address, start, out)
    }

    pub fn read_register<I2C: I2c>(&self, bus: &mut I2C, addr: u16) -> Result<u16, I2C::Error> {
        let mut word = [0u16; 1];
        self.read_words(bus, addr, &mut word)?;
        Ok(word[0])
    }

    pub fn write_register<I2C: I2c>(
        &self,
        bus: &mut I2C,
        addr: u16,
        value: u16,
    ) -> Result<(), I2C::Error> {
        let a = addr.to_be_bytes();
        let v = value.to_be_bytes();
        bus.write(self.address, &[a[0], a[1], v[0], v[1]])
    }

    pub fn status<I2C: I2c>(&self, bus: &mut I2C) -> Result<Status, I2C::Error> {
        self.read_register(bus, STATUS).map(Status)
    }

    pub fn control<I2C: I2c>(&self, bus: &mut I2C) -> Result<Control, I2C::Error> {
        self.read_register(bus, CONTROL).map(Control)
    }

    /// Select chess mode, 18-bit resolution and `rate`, keeping the remaining control bits.
    pub fn configure<I2C: I2c>(
        &mut self,
        bus: &mut I2C,
        rate: RefreshRate,
    ) -> Result<(), CameraError<I2C::Error>> {
        let current = self.control(bus).map_err(CameraError::I2c)?;
        let wanted = current.configured(rate);
        if wanted != current {
            self.write_register(bus, CONTROL, wanted.0)
                .map_err(CameraError::I2c)?;
        }
        Ok(())
    }

    /// Dump the EEPROM and extract calibration. Any previous calibration is discarded first.
    pub fn load_calibration<I2C: I2c>(
        &mut self,
        bus: &mut I2C,
    ) -> Result<(), CameraError<I2C::Error>> {
        self.calibration = None;
        read_chunked(bus, self.address, EEPROM_START, &mut self.scratch.words)
            .map_err(CameraError::I2c)?;
        self.calibration = Some(Calibration::from_eeprom(&self.scratch.words)?);
        Ok(())
    }

    /// Wait for the next subpage and read it into scratch RAM. Returns the subpage number.
    ///
    /// Polls the status register every millisecond until new data is flagged or `timeout`
    /// expires. The new-data flag is cleared after the RAM has been read.
    pub fn read_subpage<I2C: I2c, D: DelayNs>(
        &mut self,
        bus: &mut I2C,
        delay: &mut D,
        timeout: Duration,
    ) -> Result<u8, CameraError<I2C::Error>> {
        let mut waited = 0u64;
        let status = loop {
            let status = self.status(bus).map_err(CameraError::I2c)?;
            if status.new_data() {
                break status;
            }
            if waited >= timeout.ticks() {
                return Err(CameraError::Timeout);
            }
            delay.delay_ms(1);
            waited += 1;
        };

        read_chunked(bus, self.address, RAM_START, &mut self.scratch.words)
            .map_err(CameraError::I2c)?;
        self.scratch.control = self.control(bus).map_err(CameraError::I2c)?.0;
        self.scratch.subpage = status.last_subpage();

        self.write_register(bus, STATUS, status.acknowledged().0)
            .map_err(CameraError::I2c)?;
        Ok(self.scratch.subpage)
    }

    /// Read subpages until both halves of the chess pattern have been converted to °C.
    ///
    /// Returns the ambient temperature of the last subpage.
    pub fn read_frame<I2C: I2c, D: DelayNs>(
        &mut self,
        bus: &mut I2C,
        delay: &mut D,
        emissivity: f32,
        timeout: Duration,
        out: &mut [f32; FRAME_PIXELS],
    ) -> Result<f32, CameraError<I2C::Error>> {
        if self.calibration.is_none() {
            return Err(CameraError::NotCalibrated);
        }

        let mut seen = [false; 2];
        let mut ambient = 0.0;
        for _ in 0..MAX_SUBPAGE_ATTEMPTS {
            let subpage = self.read_subpage(bus, delay, timeout)? as usize & 1;
            let cal = self.calibration.as_ref().ok_or(CameraError::NotCalibrated)?;
            ambient = cal.to_temperatures(&self.scratch, emissivity, out)?;
            seen[subpage] = true;
            if seen[0] && seen[1] {
                return Ok(ambient);
            }
        }
        log::debug!(
            "mlx90640 {:#04x}: one subpage in {} reads (ta {})",
            self.address,
            MAX_SUBPAGE_ATTEMPTS,
            ambient
        );
        Err(CameraError::Timeout)
    }
}

fn read_chunk<I2C: I2c>(
    bus: &mut I2C,
    address: u8,
    start: u16,
    out: &mut [u16],
) -> Result<(), I2C::Error> {
    let mut buf = [0u8; CHUNK_WORDS * 2];
    let bytes = &mut buf[..out.len() * 2];
    bus.write_read(address, &start.to_be_bytes(), bytes)?;
    for (word, pair) in out.iter_mut().zip(bytes.chunks_exact(2)) {
        *word = u16::from_be_bytes([pair[0], pair[1]]);
    }
    Ok(())
}

fn read_chunked<I2C: I2c>(
    bus: &mut I2C,
    address: u8,
    start: u16,
    out: &mut [u16],
) -> Result<(), I2C::Error> {
    for (i, chunk) in out.chunks_mut(CHUNK_WORDS).enumerate() {
        read_chunk(bus, address, start + (i * CHUNK_WORDS) as u16, chunk)?;
    }
    Ok(())
}

impl<I2C: I2c> ThermalCamera<I2C> for Mlx90640 {
    fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    fn calibrate(
        &mut self,
        bus: &mut I2C,
        rate: RefreshRate,
    ) -> Result<(), CameraError<I2C::Error>> {
        self.configure(bus, rate)?;
        self.load_calibration(bus)
    }

    fn capture<D: DelayNs>(
        &mut self,
        bus: &mut I2C,
        delay: &mut D,
        settings: &CaptureSettings,
        pixels: &mut [f32; FRAME_PIXELS],
    ) -> Result<f32, CameraError<I2C::Error>> {
        self.read_frame(
            bus,
            delay,
            settings.emissivity,
            settings.data_ready_timeout,
            pixels,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBus, FakeError, NoDelay};

    fn camera_on_port(bus: &mut FakeBus, port: u8) {
        bus.mux_control = 1 << port;
    }

    #[test]
    fn configure_sets_chess_18_bit_and_rate() {
        let mut bus = FakeBus::new();
        camera_on_port(&mut bus, 0);
        let mut cam = Mlx90640::new(DEFAULT_ADDRESS);

        cam.configure(&mut bus, RefreshRate::Hz16).unwrap();
        let control = Control(bus.cameras[0].control);
        assert_eq!(control.refresh_rate(), RefreshRate::Hz16);
        assert_eq!(control.resolution(), registers::RESOLUTION_18_BIT);
        assert!(control.chess_pattern());
    }

    #[test]
    fn calibration_loads_from_eeprom_dump() {
        let mut bus = FakeBus::new();
        camera_on_port(&mut bus, 2);
        let mut cam = Mlx90640::new(DEFAULT_ADDRESS);
        assert!(!ThermalCamera::<FakeBus>::is_calibrated(&cam));

        cam.calibrate(&mut bus, RefreshRate::Hz8).unwrap();
        assert!(ThermalCamera::<FakeBus>::is_calibrated(&cam));
    }

    #[test]
    fn blank_eeprom_is_a_calibration_error() {
        let mut bus = FakeBus::new();
        camera_on_port(&mut bus, 1);
        bus.cameras[1].eeprom = [0xFFFF; registers::EEPROM_WORDS];
        let mut cam = Mlx90640::new(DEFAULT_ADDRESS);

        let err = cam.load_calibration(&mut bus).unwrap_err();
        assert_eq!(err, CameraError::Calibration(CalibrationError::BlankEeprom));
        assert_eq!(err.health(), ChannelHealth::NotCalibrated);
        assert!(cam.calibration().is_none());
    }

    #[test]
    fn full_frame_needs_both_subpages() {
        let mut bus = FakeBus::new();
        camera_on_port(&mut bus, 0);
        let mut cam = Mlx90640::new(DEFAULT_ADDRESS);
        cam.load_calibration(&mut bus).unwrap();

        let mut pixels = [f32::NAN; FRAME_PIXELS];
        let ta = cam
            .read_frame(&mut bus, &mut NoDelay, 0.95, Duration::millis(10), &mut pixels)
            .unwrap();

        assert!(ta.is_finite());
        assert!(pixels.iter().all(|t| t.is_finite()));
        assert_eq!(bus.cameras[0].acknowledged, 2);
    }

    #[test]
    fn missing_data_ready_times_out() {
        let mut bus = FakeBus::new();
        camera_on_port(&mut bus, 0);
        let mut cam = Mlx90640::new(DEFAULT_ADDRESS);
        cam.load_calibration(&mut bus).unwrap();
        bus.cameras[0].never_ready = true;

        let mut delay = NoDelay;
        let err = cam
            .read_subpage(&mut bus, &mut delay, Duration::millis(5))
            .unwrap_err();
        assert_eq!(err, CameraError::Timeout);
        assert_eq!(err.health(), ChannelHealth::Timeout);
        // Initial poll plus one per elapsed millisecond.
        assert_eq!(bus.cameras[0].status_polls, 6);
    }

    #[test]
    fn frame_before_calibration_is_refused() {
        let mut bus = FakeBus::new();
        camera_on_port(&mut bus, 0);
        let mut cam = Mlx90640::new(DEFAULT_ADDRESS);
        let mut pixels = [0.0; FRAME_PIXELS];
        assert_eq!(
            cam.read_frame(&mut bus, &mut NoDelay, 0.95, Duration::millis(10), &mut pixels),
            Err(CameraError::NotCalibrated)
        );
    }

    #[test]
    fn absent_camera_reports_nack() {
        let mut bus = FakeBus::new();
        let mut cam = Mlx90640::new(DEFAULT_ADDRESS);
        // No mux port selected: nothing answers at 0x33.
        let err = cam.configure(&mut bus, RefreshRate::Hz8).unwrap_err();
        assert_eq!(err, CameraError::I2c(FakeError::Nack));
        assert_eq!(err.health(), ChannelHealth::I2cError);
    }
}
