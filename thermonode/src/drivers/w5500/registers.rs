// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! W5500 register map (common block and socket n block).

// Block select (BSB) values; socket n uses 4n+1 / 4n+2 / 4n+3.
pub const BLOCK_COMMON: u8 = 0x00;
pub const BLOCK_SOCKET0: u8 = 0x01;
pub const BLOCK_SOCKET0_TX: u8 = 0x02;
pub const BLOCK_SOCKET0_RX: u8 = 0x03;

/// RWB bit of the control phase.
pub const CTRL_WRITE: u8 = 1 << 2;

// Common registers
pub const MR: u16 = 0x0000;
pub const GAR: u16 = 0x0001;
pub const SUBR: u16 = 0x0005;
pub const SHAR: u16 = 0x0009;
pub const SIPR: u16 = 0x000F;
pub const PHYCFGR: u16 = 0x002E;
pub const VERSIONR: u16 = 0x0039;

pub const MR_RST: u8 = 1 << 7;
pub const PHYCFGR_LNK: u8 = 1 << 0;
pub const CHIP_VERSION: u8 = 0x04;

// Socket registers
pub const SN_MR: u16 = 0x0000;
pub const SN_CR: u16 = 0x0001;
pub const SN_IR: u16 = 0x0002;
pub const SN_SR: u16 = 0x0003;
pub const SN_PORT: u16 = 0x0004;
pub const SN_DIPR: u16 = 0x000C;
pub const SN_DPORT: u16 = 0x0010;
pub const SN_RXBUF_SIZE: u16 = 0x001E;
pub const SN_TXBUF_SIZE: u16 = 0x001F;
pub const SN_TX_FSR: u16 = 0x0020;
pub const SN_TX_RD: u16 = 0x0022;
pub const SN_TX_WR: u16 = 0x0024;
pub const SN_RX_RSR: u16 = 0x0026;
pub const SN_RX_RD: u16 = 0x0028;

pub const MODE_TCP: u8 = 0x01;

// Sn_CR commands
pub const CMD_OPEN: u8 = 0x01;
pub const CMD_CONNECT: u8 = 0x04;
pub const CMD_DISCON: u8 = 0x08;
pub const CMD_CLOSE: u8 = 0x10;
pub const CMD_SEND: u8 = 0x20;
pub const CMD_RECV: u8 = 0x40;

// Sn_SR values
pub const SR_CLOSED: u8 = 0x00;
pub const SR_INIT: u8 = 0x13;
pub const SR_SYNSENT: u8 = 0x15;
pub const SR_ESTABLISHED: u8 = 0x17;
pub const SR_CLOSE_WAIT: u8 = 0x1C;

/// Buffer memory per chip, split among the eight sockets in KiB.
pub const BUFFER_KIB: u8 = 16;
pub const SOCKETS: u8 = 8;
