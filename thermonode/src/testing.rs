// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Hand-written fakes of the board peripherals for host tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::i2c::{self, I2c, NoAcknowledgeSource};
use embedded_hal::spi::{self, SpiDevice};

use crate::drivers::mlx90640::calibration::tests::example_eeprom;
use crate::drivers::mlx90640::registers::{self, ram, Status};
use crate::drivers::tca9548a;
use crate::drivers::w5500::registers as w5500;
use crate::hw::Watchdog;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FakeError {
    Nack,
    Bus,
}

impl i2c::Error for FakeError {
    fn kind(&self) -> i2c::ErrorKind {
        match self {
            FakeError::Nack => i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            FakeError::Bus => i2c::ErrorKind::Bus,
        }
    }
}

impl spi::Error for FakeError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

/// Delay that returns immediately.
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Output pin whose clones share state, so a test can watch a pin moved into a driver.
#[derive(Clone, Default)]
pub struct Pin {
    state: Rc<RefCell<(bool, u32)>>,
}

impl Pin {
    pub fn is_high(&self) -> bool {
        self.state.borrow().0
    }

    /// Number of `set_*` calls so far.
    pub fn transitions(&self) -> u32 {
        self.state.borrow().1
    }
}

impl digital::ErrorType for Pin {
    type Error = core::convert::Infallible;
}

impl OutputPin for Pin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut s = self.state.borrow_mut();
        s.0 = false;
        s.1 += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut s = self.state.borrow_mut();
        s.0 = true;
        s.1 += 1;
        Ok(())
    }
}

/// Watchdog that counts feeds.
#[derive(Default)]
pub struct CountingWatchdog {
    pub feeds: u32,
}

impl Watchdog for CountingWatchdog {
    fn feed(&mut self) {
        self.feeds += 1;
    }
}

/// Simulated MLX90640 behind one multiplexer port.
pub struct FakeCamera {
    pub eeprom: [u16; registers::EEPROM_WORDS],
    pub ram: [u16; registers::RAM_WORDS],
    pub control: u16,
    pub subpage: u8,
    /// Never flag new data.
    pub never_ready: bool,
    /// NACK every transaction.
    pub dead: bool,
    /// NACK this many upcoming transactions.
    pub fail_next: u32,
    pub status_polls: u32,
    pub acknowledged: u32,
    pub transactions: u32,
    pointer: u16,
}

impl FakeCamera {
    pub fn new() -> Self {
        let mut ram = [0u16; registers::RAM_WORDS];
        ram[ram::GAIN] = 0x1881;
        ram[ram::VDD_PIX] = 0xCCC5;
        ram[ram::TA_PTAT] = 0x06AF;
        ram[ram::TA_VBE] = 0x4BF2;
        Self {
            eeprom: example_eeprom(),
            ram,
            control: 0x1901,
            subpage: 0,
            never_ready: false,
            dead: false,
            fail_next: 0,
            status_polls: 0,
            acknowledged: 0,
            transactions: 0,
            pointer: 0,
        }
    }

    fn read_word(&mut self, addr: u16) -> u16 {
        let ram_end = registers::RAM_START + registers::RAM_WORDS as u16;
        let ee_end = registers::EEPROM_START + registers::EEPROM_WORDS as u16;
        match addr {
            registers::STATUS => {
                self.status_polls += 1;
                let mut s = Status::OVERWRITE_ENABLE | self.subpage as u16;
                if !self.never_ready {
                    s |= Status::NEW_DATA;
                }
                s
            }
            registers::CONTROL => self.control,
            a if (registers::RAM_START..ram_end).contains(&a) => {
                self.ram[(a - registers::RAM_START) as usize]
            }
            a if (registers::EEPROM_START..ee_end).contains(&a) => {
                self.eeprom[(a - registers::EEPROM_START) as usize]
            }
            _ => 0,
        }
    }

    fn write_word(&mut self, addr: u16, value: u16) {
        match addr {
            registers::STATUS if value & Status::NEW_DATA == 0 => {
                self.acknowledged += 1;
                self.subpage ^= 1;
            }
            registers::CONTROL => self.control = value,
            _ => {}
        }
    }

    fn transaction(&mut self, ops: &mut [i2c::Operation<'_>]) -> Result<(), FakeError> {
        self.transactions += 1;
        if self.dead {
            return Err(FakeError::Nack);
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(FakeError::Nack);
        }
        for op in ops.iter_mut() {
            match op {
                i2c::Operation::Write(bytes) if bytes.len() >= 2 => {
                    self.pointer = u16::from_be_bytes([bytes[0], bytes[1]]);
                    if bytes.len() >= 4 {
                        self.write_word(self.pointer, u16::from_be_bytes([bytes[2], bytes[3]]));
                    }
                }
                i2c::Operation::Write(_) => {}
                i2c::Operation::Read(buf) => {
                    for pair in buf.chunks_mut(2) {
                        let word = self.read_word(self.pointer).to_be_bytes();
                        pair.copy_from_slice(&word[..pair.len()]);
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

/// I2C bus with a TCA9548A and four cameras on ports 0..=3.
pub struct FakeBus {
    pub mux_control: u8,
    /// Every value written to the mux control register.
    pub mux_writes: Vec<u8>,
    /// Bits the mux reports set regardless of what was written.
    pub mux_stuck_bits: u8,
    /// Mux never acknowledges.
    pub mux_dead: bool,
    /// Every transaction fails with a bus error, as when SDA is held low.
    pub stuck: bool,
    pub cameras: [FakeCamera; 4],
    /// Camera transactions that found more than one port enabled.
    pub overlapping_selects: u32,
}

impl FakeBus {
    pub fn new() -> Self {
        Self {
            mux_control: 0,
            mux_writes: Vec::new(),
            mux_stuck_bits: 0,
            mux_dead: false,
            stuck: false,
            cameras: [
                FakeCamera::new(),
                FakeCamera::new(),
                FakeCamera::new(),
                FakeCamera::new(),
            ],
            overlapping_selects: 0,
        }
    }
}

impl i2c::ErrorType for FakeBus {
    type Error = FakeError;
}

impl I2c for FakeBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.stuck {
            return Err(FakeError::Bus);
        }
        match address {
            tca9548a::DEFAULT_ADDRESS => {
                if self.mux_dead {
                    return Err(FakeError::Nack);
                }
                for op in operations.iter_mut() {
                    match op {
                        i2c::Operation::Write(bytes) => {
                            if let Some(&b) = bytes.first() {
                                self.mux_writes.push(b);
                                self.mux_control = b | self.mux_stuck_bits;
                            }
                        }
                        i2c::Operation::Read(buf) => buf.fill(self.mux_control),
                    }
                }
                Ok(())
            }
            crate::drivers::mlx90640::DEFAULT_ADDRESS => {
                let ports = self.mux_control & 0x0F;
                match ports.count_ones() {
                    0 => Err(FakeError::Nack),
                    1 => self.cameras[ports.trailing_zeros() as usize].transaction(operations),
                    _ => {
                        self.overlapping_selects += 1;
                        Err(FakeError::Nack)
                    }
                }
            }
            _ => Err(FakeError::Nack),
        }
    }
}

/// How the simulated peer answers a CONNECT.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Peer {
    Accept,
    Refuse,
    /// SYN is never answered.
    Silent,
}

/// W5500 register memory behind an `SpiDevice`, with socket 0 simulated.
pub struct FakeW5500 {
    common: [u8; 0x40],
    socket: [u8; 0x30],
    tx_mem: Vec<u8>,
    rx_pending: VecDeque<u8>,
    rx_committed: u16,
    pub version: u8,
    pub link: bool,
    pub peer: Peer,
    /// Free TX space reported instead of the real value.
    pub tx_free: Option<u16>,
    /// Sn_TX_FSR changes between every two reads, as while the chip is draining the buffer.
    pub fsr_moving: bool,
    fsr_reads: u16,
    /// Bytes handed to the wire by SEND commands.
    pub sent: Vec<u8>,
    pub commands: Vec<u8>,
    pub fail: bool,
}

impl FakeW5500 {
    pub fn new() -> Self {
        let mut w = Self {
            common: [0; 0x40],
            socket: [0; 0x30],
            tx_mem: vec![0; 16 * 1024],
            rx_pending: VecDeque::new(),
            rx_committed: 0,
            version: 0x04,
            link: true,
            peer: Peer::Accept,
            tx_free: None,
            fsr_moving: false,
            fsr_reads: 0,
            sent: Vec::new(),
            commands: Vec::new(),
            fail: false,
        };
        w.reset();
        w
    }

    fn reset(&mut self) {
        self.common = [0; 0x40];
        self.socket = [0; 0x30];
        self.rx_pending.clear();
        self.rx_committed = 0;
    }

    /// Queue bytes as received from the peer.
    pub fn deliver(&mut self, bytes: &[u8]) {
        self.rx_pending.extend(bytes.iter().copied());
    }

    pub fn socket_status(&self) -> u8 {
        self.socket[w5500::SN_SR as usize]
    }

    /// Force the socket state, e.g. to simulate the peer closing.
    pub fn set_socket_status(&mut self, sr: u8) {
        self.socket[w5500::SN_SR as usize] = sr;
    }

    pub fn common_reg(&self, addr: u16, len: usize) -> &[u8] {
        &self.common[addr as usize..addr as usize + len]
    }

    pub fn socket_reg(&self, addr: u16) -> u8 {
        self.socket[addr as usize]
    }

    fn socket_u16(&self, addr: u16) -> u16 {
        u16::from_be_bytes([self.socket[addr as usize], self.socket[addr as usize + 1]])
    }

    fn set_socket_u16(&mut self, addr: u16, v: u16) {
        let b = v.to_be_bytes();
        self.socket[addr as usize] = b[0];
        self.socket[addr as usize + 1] = b[1];
    }

    fn command(&mut self, cmd: u8) {
        self.commands.push(cmd);
        let sr = match cmd {
            w5500::CMD_OPEN if self.socket[w5500::SN_MR as usize] & 0x0F == w5500::MODE_TCP => {
                Some(w5500::SR_INIT)
            }
            w5500::CMD_CONNECT => Some(match self.peer {
                Peer::Accept => w5500::SR_ESTABLISHED,
                Peer::Refuse => w5500::SR_CLOSED,
                Peer::Silent => w5500::SR_SYNSENT,
            }),
            w5500::CMD_DISCON | w5500::CMD_CLOSE => Some(w5500::SR_CLOSED),
            w5500::CMD_SEND => {
                let rd = self.socket_u16(w5500::SN_TX_RD);
                let wr = self.socket_u16(w5500::SN_TX_WR);
                let mut p = rd;
                while p != wr {
                    let b = self.tx_mem[p as usize % self.tx_mem.len()];
                    self.sent.push(b);
                    p = p.wrapping_add(1);
                }
                self.set_socket_u16(w5500::SN_TX_RD, wr);
                None
            }
            w5500::CMD_RECV => {
                let rd = self.socket_u16(w5500::SN_RX_RD);
                let n = rd.wrapping_sub(self.rx_committed) as usize;
                for _ in 0..n.min(self.rx_pending.len()) {
                    self.rx_pending.pop_front();
                }
                self.rx_committed = rd;
                None
            }
            _ => None,
        };
        if let Some(sr) = sr {
            self.socket[w5500::SN_SR as usize] = sr;
        }
    }

    fn read_byte(&mut self, block: u8, addr: u16) -> u8 {
        match block {
            w5500::BLOCK_COMMON => match addr {
                w5500::PHYCFGR => self.link as u8,
                w5500::VERSIONR => self.version,
                a => self.common.get(a as usize).copied().unwrap_or(0),
            },
            w5500::BLOCK_SOCKET0 => {
                let a = addr as usize;
                let fsr = w5500::SN_TX_FSR as usize;
                let rsr = w5500::SN_RX_RSR as usize;
                if a == fsr || a == fsr + 1 {
                    if a == fsr {
                        self.fsr_reads = self.fsr_reads.wrapping_add(1);
                    }
                    let mut free = self.tx_free.unwrap_or(self.tx_mem.len() as u16);
                    if self.fsr_moving {
                        free = free.wrapping_sub(self.fsr_reads);
                    }
                    free.to_be_bytes()[a - fsr]
                } else if a == rsr || a == rsr + 1 {
                    let avail = (self.rx_pending.len() as u16).to_be_bytes();
                    avail[a - rsr]
                } else if a == w5500::SN_CR as usize {
                    0
                } else {
                    self.socket.get(a).copied().unwrap_or(0)
                }
            }
            w5500::BLOCK_SOCKET0_RX => {
                let offset = addr.wrapping_sub(self.rx_committed) as usize;
                self.rx_pending.get(offset).copied().unwrap_or(0)
            }
            _ => 0,
        }
    }

    fn write_byte(&mut self, block: u8, addr: u16, value: u8) {
        match block {
            w5500::BLOCK_COMMON => {
                if addr == w5500::MR && value & w5500::MR_RST != 0 {
                    self.reset();
                } else if let Some(r) = self.common.get_mut(addr as usize) {
                    *r = value;
                }
            }
            w5500::BLOCK_SOCKET0 => {
                if addr == w5500::SN_CR {
                    self.command(value);
                } else if let Some(r) = self.socket.get_mut(addr as usize) {
                    *r = value;
                }
            }
            w5500::BLOCK_SOCKET0_TX => {
                let len = self.tx_mem.len();
                self.tx_mem[addr as usize % len] = value;
            }
            _ => {}
        }
    }
}

impl spi::ErrorType for FakeW5500 {
    type Error = FakeError;
}

impl SpiDevice for FakeW5500 {
    fn transaction(&mut self, operations: &mut [spi::Operation<'_, u8>]) -> Result<(), FakeError> {
        if self.fail {
            return Err(FakeError::Bus);
        }
        let mut header: Option<(u16, u8, bool)> = None;
        for op in operations.iter_mut() {
            match op {
                spi::Operation::Write(bytes) => {
                    let mut data: &[u8] = *bytes;
                    if header.is_none() {
                        let addr = u16::from_be_bytes([data[0], data[1]]);
                        let control = data[2];
                        header = Some((addr, control >> 3, control & w5500::CTRL_WRITE != 0));
                        data = &data[3..];
                    }
                    if let Some((ref mut addr, block, true)) = header {
                        for &b in data {
                            self.write_byte(block, *addr, b);
                            *addr = addr.wrapping_add(1);
                        }
                    }
                }
                spi::Operation::Read(buf) => {
                    if let Some((ref mut addr, block, false)) = header {
                        for b in buf.iter_mut() {
                            *b = self.read_byte(block, *addr);
                            *addr = addr.wrapping_add(1);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}
