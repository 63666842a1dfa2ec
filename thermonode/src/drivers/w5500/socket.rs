// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Socket 0 as a TCP client.

use embedded_hal::spi::SpiDevice;

use super::registers::*;
use super::{W5500Error, W5500};

/// Polls of Sn_CR waiting for a command to be accepted, and re-reads of a size register
/// waiting for it to settle.
const COMMAND_POLLS: u32 = 100;

/// TX/RX buffer size of socket 0 in bytes.
const SOCKET_BUFFER: usize = BUFFER_KIB as usize * 1024;

/// Decoded Sn_SR.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SocketStatus {
    Closed,
    Init,
    SynSent,
    Established,
    CloseWait,
    /// Transitional states (FIN_WAIT, TIME_WAIT, ...) and non-TCP modes.
    Other(u8),
}

impl From<u8> for SocketStatus {
    fn from(sr: u8) -> Self {
        match sr {
            SR_CLOSED => SocketStatus::Closed,
            SR_INIT => SocketStatus::Init,
            SR_SYNSENT => SocketStatus::SynSent,
            SR_ESTABLISHED => SocketStatus::Established,
            SR_CLOSE_WAIT => SocketStatus::CloseWait,
            other => SocketStatus::Other(other),
        }
    }
}

impl W5500 {
    fn command<SPI: SpiDevice>(&self, spi: &mut SPI, cmd: u8) -> Result<(), W5500Error<SPI::Error>> {
        self.write(spi, BLOCK_SOCKET0, SN_CR, &[cmd])?;
        for _ in 0..COMMAND_POLLS {
            if self.read_u8(spi, BLOCK_SOCKET0, SN_CR)? == 0 {
                return Ok(());
            }
        }
        Err(W5500Error::CommandTimeout)
    }

    /// Read a free/received size register until two reads agree, as the datasheet asks.
    fn stable_u16<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        addr: u16,
    ) -> Result<u16, W5500Error<SPI::Error>> {
        let mut prev = self.read_u16(spi, BLOCK_SOCKET0, addr)?;
        for _ in 0..COMMAND_POLLS {
            let next = self.read_u16(spi, BLOCK_SOCKET0, addr)?;
            if next == prev {
                return Ok(next);
            }
            prev = next;
        }
        Err(W5500Error::UnstableRegister(addr))
    }

    pub fn status<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<SocketStatus, W5500Error<SPI::Error>> {
        self.read_u8(spi, BLOCK_SOCKET0, SN_SR).map(SocketStatus::from)
    }

    /// Open socket 0 in TCP mode bound to `local_port`.
    pub fn open<SPI: SpiDevice>(
        &mut self,
        spi: &mut SPI,
        local_port: u16,
    ) -> Result<(), W5500Error<SPI::Error>> {
        if self.status(spi)? != SocketStatus::Closed {
            self.command(spi, CMD_CLOSE)?;
        }
        self.write(spi, BLOCK_SOCKET0, SN_MR, &[MODE_TCP])?;
        self.write(spi, BLOCK_SOCKET0, SN_PORT, &local_port.to_be_bytes())?;
        self.command(spi, CMD_OPEN)?;

        let sr = self.read_u8(spi, BLOCK_SOCKET0, SN_SR)?;
        if sr != SR_INIT {
            return Err(W5500Error::SocketState(sr));
        }
        Ok(())
    }

    /// Start connecting to `ip:port`. Completion shows up in [`status`](Self::status).
    pub fn connect<SPI: SpiDevice>(
        &mut self,
        spi: &mut SPI,
        ip: [u8; 4],
        port: u16,
    ) -> Result<(), W5500Error<SPI::Error>> {
        self.write(spi, BLOCK_SOCKET0, SN_DIPR, &ip)?;
        self.write(spi, BLOCK_SOCKET0, SN_DPORT, &port.to_be_bytes())?;
        self.command(spi, CMD_CONNECT)
    }

    /// Free space in the TX buffer.
    pub fn free_tx<SPI: SpiDevice>(&self, spi: &mut SPI) -> Result<u16, W5500Error<SPI::Error>> {
        self.stable_u16(spi, SN_TX_FSR)
    }

    /// Queue `data` for transmission.
    ///
    /// Either the whole message is accepted or nothing is written: when the TX buffer lacks room
    /// this returns `WouldBlock` and the caller retries later.
    pub fn send<SPI: SpiDevice>(
        &mut self,
        spi: &mut SPI,
        data: &[u8],
    ) -> nb::Result<(), W5500Error<SPI::Error>> {
        if data.len() > SOCKET_BUFFER {
            return Err(nb::Error::Other(W5500Error::TooLarge(data.len())));
        }
        if (self.free_tx(spi)? as usize) < data.len() {
            return Err(nb::Error::WouldBlock);
        }

        let ptr = self.read_u16(spi, BLOCK_SOCKET0, SN_TX_WR)?;
        self.write(spi, BLOCK_SOCKET0_TX, ptr, data)?;
        let end = ptr.wrapping_add(data.len() as u16);
        self.write(spi, BLOCK_SOCKET0, SN_TX_WR, &end.to_be_bytes())?;
        self.command(spi, CMD_SEND)?;
        Ok(())
    }

    /// Copy received bytes into `buf`. Returns 0 when nothing is pending.
    pub fn recv<SPI: SpiDevice>(
        &mut self,
        spi: &mut SPI,
        buf: &mut [u8],
    ) -> Result<usize, W5500Error<SPI::Error>> {
        let available = self.stable_u16(spi, SN_RX_RSR)? as usize;
        let n = available.min(buf.len());
        if n == 0 {
            return Ok(0);
        }

        let ptr = self.read_u16(spi, BLOCK_SOCKET0, SN_RX_RD)?;
        self.read(spi, BLOCK_SOCKET0_RX, ptr, &mut buf[..n])?;
        let end = ptr.wrapping_add(n as u16);
        self.write(spi, BLOCK_SOCKET0, SN_RX_RD, &end.to_be_bytes())?;
        self.command(spi, CMD_RECV)?;
        Ok(n)
    }

    /// Graceful FIN.
    pub fn disconnect<SPI: SpiDevice>(&mut self, spi: &mut SPI) -> Result<(), W5500Error<SPI::Error>> {
        self.command(spi, CMD_DISCON)
    }

    pub fn close<SPI: SpiDevice>(&mut self, spi: &mut SPI) -> Result<(), W5500Error<SPI::Error>> {
        self.command(spi, CMD_CLOSE)?;
        self.write(spi, BLOCK_SOCKET0, SN_IR, &[0xFF])
    }
}
