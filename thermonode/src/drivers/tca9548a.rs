// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! TI TCA9548A 8-channel I2C switch.
//!
//! The device has a single control register: bit *n* connects downstream port *n* to the
//! upstream bus. This driver only ever enables one port at a time.
//!
//! Like the other bus drivers, the I2C bus is passed in as `&mut` to each method so that the
//! switch and the cameras behind it can share the one upstream bus.

use core::fmt;

use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;

/// Default address with A0..A2 tied low.
pub const DEFAULT_ADDRESS: u8 = 0x70;

/// Number of downstream ports on the switch.
pub const PORTS: u8 = 8;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MuxError<E> {
    /// Bus error talking to the switch itself.
    I2c(E),
    /// Port number beyond the eight the switch provides.
    InvalidPort(u8),
    /// Control register read back differently from what was written.
    Verify { expected: u8, found: u8 },
}

impl<E> From<E> for MuxError<E> {
    fn from(e: E) -> Self {
        MuxError::I2c(e)
    }
}

impl<E: fmt::Debug> fmt::Display for MuxError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuxError::I2c(e) => write!(f, "mux bus error: {:?}", e),
            MuxError::InvalidPort(p) => write!(f, "mux port {} does not exist", p),
            MuxError::Verify { expected, found } => write!(
                f,
                "mux control readback {:#04x}, expected {:#04x}",
                found, expected
            ),
        }
    }
}

/// Placeholder for boards that leave the RESET line tied high.
pub struct NoReset;

impl embedded_hal::digital::ErrorType for NoReset {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoReset {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// TCA9548A driver with an optional active-low RESET pin.
pub struct Tca9548a<RST> {
    address: u8,
    reset: Option<RST>,
    /// Port last confirmed enabled, if any.
    active: Option<u8>,
}

impl Tca9548a<NoReset> {
    /// Switch without a RESET line.
    pub fn new(address: u8) -> Self {
        Self {
            address,
            reset: None,
            active: None,
        }
    }
}

impl<RST: OutputPin> Tca9548a<RST> {
    /// Switch whose RESET line is driven by `reset`. The line is released (driven high).
    pub fn with_reset(address: u8, mut reset: RST) -> Self {
        reset.set_high().ok();
        Self {
            address,
            reset: Some(reset),
            active: None,
        }
    }

    #[inline]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Port currently enabled, as last written and verified.
    #[inline]
    pub fn active(&self) -> Option<u8> {
        self.active
    }

    /// Connect exactly one downstream port, disconnecting all others.
    pub fn select<I2C: I2c>(&mut self, bus: &mut I2C, port: u8) -> Result<(), MuxError<I2C::Error>> {
        if port >= PORTS {
            return Err(MuxError::InvalidPort(port));
        }
        let mask = 1u8 << port;

        self.active = None;
        bus.write(self.address, &[mask])?;

        let found = self.read_control(bus)?;
        if found != mask {
            return Err(MuxError::Verify {
                expected: mask,
                found,
            });
        }
        self.active = Some(port);
        Ok(())
    }

    /// Disconnect every downstream port.
    pub fn deselect<I2C: I2c>(&mut self, bus: &mut I2C) -> Result<(), MuxError<I2C::Error>> {
        bus.write(self.address, &[0x00])?;
        self.active = None;
        Ok(())
    }

    /// Raw control register.
    pub fn read_control<I2C: I2c>(&mut self, bus: &mut I2C) -> Result<u8, MuxError<I2C::Error>> {
        let mut buf = [0u8; 1];
        bus.read(self.address, &mut buf)?;
        Ok(buf[0])
    }

    /// Pulse RESET low. Returns `false` if no RESET line is wired.
    ///
    /// The datasheet asks for a 6 ns minimum pulse; two GPIO writes are well beyond that.
    pub fn reset(&mut self) -> bool {
        self.active = None;
        match self.reset.as_mut() {
            Some(pin) => {
                pin.set_low().ok();
                pin.set_high().ok();
                true
            }
            None => false,
        }
    }

    pub fn free(self) -> Option<RST> {
        self.reset
    }
}
