// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Serial Peripheral Interface (SPI) abstraction layer.
//!
//! - `ChipSelect` is an active-low GPIO output wrapper for manual CS control.
//! - `SpiDevice` pairs the HAL bus with one chip select and implements
//!   `embedded_hal::spi::SpiDevice`, asserting CS for the whole transaction.

use embedded_hal::spi::{self as hal_spi, Operation, SpiBus};
use stm32f4xx_hal::{
    gpio::{self, Output, PinState, PushPull},
    spi::{self, Spi},
};

/// Core cycles per microsecond at 168 MHz.
const CYCLES_PER_US: u32 = 168;

/// Manual chip-select line, active-low, generic over any GPIO pin.
pub struct ChipSelect<const P: char, const N: u8> {
    pin: gpio::Pin<P, N, Output<PushPull>>,
}

impl<const P: char, const N: u8> ChipSelect<P, N> {
    /// Create an active-low chip select and set to the inactive state (i.e., high).
    pub fn active_low(mut pin: gpio::Pin<P, N, Output<PushPull>>) -> Self {
        pin.set_state(PinState::High);
        Self { pin }
    }

    /// Assert the chip select.
    #[inline]
    pub fn select(&mut self) {
        self.pin.set_low();
    }

    /// Deassert the chip select.
    #[inline]
    pub fn deselect(&mut self) {
        self.pin.set_high();
    }
}

/// One device on a dedicated SPI bus.
pub struct SpiDevice<I: spi::Instance, const P: char, const N: u8> {
    spi: Spi<I>,
    cs: ChipSelect<P, N>,
}

impl<I: spi::Instance, const P: char, const N: u8> SpiDevice<I, P, N> {
    pub fn new(spi: Spi<I>, cs: ChipSelect<P, N>) -> Self {
        Self { spi, cs }
    }
}

impl<I: spi::Instance, const P: char, const N: u8> hal_spi::ErrorType for SpiDevice<I, P, N> {
    type Error = spi::Error;
}

impl<I: spi::Instance, const P: char, const N: u8> SpiDevice<I, P, N> {
    fn run(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), spi::Error> {
        for op in operations.iter_mut() {
            match op {
                Operation::Read(buf) => SpiBus::read(&mut self.spi, buf)?,
                Operation::Write(buf) => SpiBus::write(&mut self.spi, buf)?,
                Operation::Transfer(read, write) => SpiBus::transfer(&mut self.spi, read, write)?,
                Operation::TransferInPlace(buf) => SpiBus::transfer_in_place(&mut self.spi, buf)?,
                Operation::DelayNs(ns) => cortex_m::asm::delay((*ns / 1000 + 1) * CYCLES_PER_US),
            }
        }
        Ok(())
    }
}

impl<I: spi::Instance, const P: char, const N: u8> hal_spi::SpiDevice for SpiDevice<I, P, N> {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), spi::Error> {
        self.cs.select();
        let result = self.run(operations);
        // CS must stay low until the last byte has left the shift register.
        let flushed = SpiBus::<u8>::flush(&mut self.spi);
        self.cs.deselect();
        result.and(flushed)
    }
}
