// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! WIZnet W5500 hardwired TCP/IP controller.
//!
//! Every SPI frame is a 16-bit offset, a control byte `BSB[7:3] | RWB[2] | OM[1:0]` and the data
//! phase. Frames are sent in variable-length data mode (`OM = 00`), so chip select framing comes
//! from the `SpiDevice`.
//!
//! The driver itself is stateless; the SPI device is passed in to every call and all state lives
//! in the chip. Only socket 0 is used, as a TCP client, and it is given the whole 16 KiB of TX
//! and RX buffer memory.

pub mod registers;
mod socket;

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};

use crate::config::NetworkConfig;
use registers::*;

pub use socket::SocketStatus;

/// Polls of MR after a soft reset, one millisecond apart.
const RESET_POLLS: u32 = 50;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum W5500Error<E> {
    Spi(E),
    /// VERSIONR did not read 0x04; wrong chip or SPI wiring.
    BadVersion(u8),
    /// RST bit in MR stayed set after a soft reset.
    ResetTimeout,
    /// Sn_CR was not cleared after a command.
    CommandTimeout,
    /// Socket was not in the state the operation needs.
    SocketState(u8),
    /// Message larger than the socket's TX buffer.
    TooLarge(usize),
    /// A size register never read the same value twice in a row.
    UnstableRegister(u16),
}

impl<E: fmt::Debug> fmt::Display for W5500Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            W5500Error::Spi(e) => write!(f, "w5500 spi error: {:?}", e),
            W5500Error::BadVersion(v) => write!(f, "w5500 version {:#04x}, expected 0x04", v),
            W5500Error::ResetTimeout => f.write_str("w5500 did not leave reset"),
            W5500Error::CommandTimeout => f.write_str("w5500 socket command not accepted"),
            W5500Error::SocketState(sr) => write!(f, "w5500 socket in state {:#04x}", sr),
            W5500Error::TooLarge(n) => write!(f, "{} bytes exceed the w5500 tx buffer", n),
            W5500Error::UnstableRegister(addr) => {
                write!(f, "w5500 register {:#06x} did not settle", addr)
            }
        }
    }
}

/// W5500 driver.
#[derive(Default)]
pub struct W5500 {
    _private: (),
}

impl W5500 {
    pub const fn new() -> Self {
        Self { _private: () }
    }

    pub(crate) fn read<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        block: u8,
        addr: u16,
        buf: &mut [u8],
    ) -> Result<(), W5500Error<SPI::Error>> {
        let a = addr.to_be_bytes();
        let header = [a[0], a[1], block << 3];
        spi.transaction(&mut [Operation::Write(&header), Operation::Read(buf)])
            .map_err(W5500Error::Spi)
    }

    pub(crate) fn write<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        block: u8,
        addr: u16,
        data: &[u8],
    ) -> Result<(), W5500Error<SPI::Error>> {
        let a = addr.to_be_bytes();
        let header = [a[0], a[1], (block << 3) | CTRL_WRITE];
        spi.transaction(&mut [Operation::Write(&header), Operation::Write(data)])
            .map_err(W5500Error::Spi)
    }

    pub(crate) fn read_u8<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        block: u8,
        addr: u16,
    ) -> Result<u8, W5500Error<SPI::Error>> {
        let mut b = [0u8; 1];
        self.read(spi, block, addr, &mut b)?;
        Ok(b[0])
    }

    pub(crate) fn read_u16<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        block: u8,
        addr: u16,
    ) -> Result<u16, W5500Error<SPI::Error>> {
        let mut b = [0u8; 2];
        self.read(spi, block, addr, &mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    /// Soft reset, verify the chip, program addressing and assign the buffer memory.
    pub fn init<SPI: SpiDevice, D: DelayNs>(
        &mut self,
        spi: &mut SPI,
        delay: &mut D,
        net: &NetworkConfig,
    ) -> Result<(), W5500Error<SPI::Error>> {
        self.write(spi, BLOCK_COMMON, MR, &[MR_RST])?;
        let mut polls = 0;
        while self.read_u8(spi, BLOCK_COMMON, MR)? & MR_RST != 0 {
            polls += 1;
            if polls >= RESET_POLLS {
                return Err(W5500Error::ResetTimeout);
            }
            delay.delay_ms(1);
        }

        let version = self.read_u8(spi, BLOCK_COMMON, VERSIONR)?;
        if version != CHIP_VERSION {
            return Err(W5500Error::BadVersion(version));
        }

        self.write(spi, BLOCK_COMMON, GAR, &net.gateway)?;
        self.write(spi, BLOCK_COMMON, SUBR, &net.subnet)?;
        self.write(spi, BLOCK_COMMON, SHAR, &net.mac)?;
        self.write(spi, BLOCK_COMMON, SIPR, &net.ip)?;

        for n in 0..SOCKETS {
            let kib = if n == 0 { BUFFER_KIB } else { 0 };
            let block = n * 4 + 1;
            self.write(spi, block, SN_RXBUF_SIZE, &[kib])?;
            self.write(spi, block, SN_TXBUF_SIZE, &[kib])?;
        }

        log::info!(
            "w5500: ip {}.{}.{}.{}",
            net.ip[0],
            net.ip[1],
            net.ip[2],
            net.ip[3]
        );
        Ok(())
    }

    /// PHY reports an established Ethernet link.
    pub fn link_up<SPI: SpiDevice>(&self, spi: &mut SPI) -> Result<bool, W5500Error<SPI::Error>> {
        Ok(self.read_u8(spi, BLOCK_COMMON, PHYCFGR)? & PHYCFGR_LNK != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeError, FakeW5500, NoDelay};

    #[test]
    fn init_programs_addresses_and_buffers() {
        let mut spi = FakeW5500::new();
        let net = NetworkConfig::default();
        W5500::new().init(&mut spi, &mut NoDelay, &net).unwrap();

        assert_eq!(spi.common_reg(SIPR, 4), &net.ip);
        assert_eq!(spi.common_reg(SHAR, 6), &net.mac);
        assert_eq!(spi.common_reg(GAR, 4), &net.gateway);
        assert_eq!(spi.common_reg(SUBR, 4), &net.subnet);
        assert_eq!(spi.socket_reg(SN_TXBUF_SIZE), 16);
        assert_eq!(spi.socket_reg(SN_RXBUF_SIZE), 16);
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut spi = FakeW5500::new();
        spi.version = 0x51;
        assert_eq!(
            W5500::new().init(&mut spi, &mut NoDelay, &NetworkConfig::default()),
            Err(W5500Error::BadVersion(0x51))
        );
    }

    #[test]
    fn link_follows_phy() {
        let mut spi = FakeW5500::new();
        let w = W5500::new();
        assert_eq!(w.link_up(&mut spi), Ok(true));
        spi.link = false;
        assert_eq!(w.link_up(&mut spi), Ok(false));
        spi.fail = true;
        assert_eq!(w.link_up(&mut spi), Err(W5500Error::Spi(FakeError::Bus)));
    }
}
