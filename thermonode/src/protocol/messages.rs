// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Messages exchanged with the collector.
//!
//! Every message, in both directions, is framed as
//!
//! ```text
//! 0xA5 | kind: u8 | len: u16 LE | payload: len bytes | crc: u16 LE
//! ```
//!
//! where `crc` is CRC-16/IBM-3740 over `kind`, `len` and `payload`. Structured payloads are
//! postcard-encoded.

use core::fmt;

use crc::{Crc, CRC_16_IBM_3740};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelHealth;
use crate::NUM_CHANNELS;

/// Sync byte for the protocol.
pub const START_BYTE: u8 = 0xA5;

// Message kinds
pub const KIND_FRAME: u8 = 0x01;
pub const KIND_COMMAND: u8 = 0x10;

/// Layout version carried in every frame header.
pub const WIRE_VERSION: u8 = 1;

/// Start byte, kind and length.
pub const PREAMBLE_LEN: usize = 4;
pub const CRC_LEN: usize = 2;

/// Largest command payload the node accepts.
pub const MAX_COMMAND_PAYLOAD: usize = 64;

pub(crate) const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Runtime reconfiguration sent by the collector.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    SetAlarmThreshold { celsius: f32 },
    SetHysteresis { celsius: f32 },
    SetSweepDeadline { millis: u32 },
    SetEmissivity { value: f32 },
    SetMaxRetries { retries: u8 },
}

/// Per-channel part of a frame header.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    /// A pixel block for this channel follows the header.
    pub present: bool,
    pub health: ChannelHealth,
    pub captured_ms: u64,
    pub ambient_centi: i16,
    pub min_centi: i16,
    pub max_centi: i16,
}

impl ChannelSummary {
    pub const fn missing(health: ChannelHealth) -> Self {
        Self {
            present: false,
            health,
            captured_ms: 0,
            ambient_centi: 0,
            min_centi: 0,
            max_centi: 0,
        }
    }
}

/// Hottest pixel of the sweep, located on the monitored surface when the mount allows.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotspotReport {
    pub channel: u8,
    pub column: u8,
    pub row: u8,
    pub celsius_centi: i16,
    pub surface_mm: Option<[f32; 2]>,
}

/// Header of a `KIND_FRAME` payload; pixel blocks for present channels follow in channel order.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub version: u8,
    pub sequence: u32,
    pub started_ms: u64,
    pub finished_ms: u64,
    pub complete: bool,
    pub dropped_frames: u32,
    pub channels: [ChannelSummary; NUM_CHANNELS],
    pub hotspot: Option<HotspotReport>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WireError {
    /// Output buffer cannot hold the message.
    BufferTooSmall,
    /// Declared length exceeds what this kind allows.
    Length(u16),
    /// Kind byte not valid in this direction.
    UnknownKind(u8),
    Crc { expected: u16, found: u16 },
    /// Payload failed to (de)serialize.
    Payload,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::BufferTooSmall => f.write_str("buffer too small for message"),
            WireError::Length(n) => write!(f, "payload length {} out of range", n),
            WireError::UnknownKind(k) => write!(f, "unknown message kind {:#04x}", k),
            WireError::Crc { expected, found } => {
                write!(f, "crc {:#06x}, expected {:#06x}", found, expected)
            }
            WireError::Payload => f.write_str("malformed payload"),
        }
    }
}

impl From<postcard::Error> for WireError {
    fn from(e: postcard::Error) -> Self {
        match e {
            postcard::Error::SerializeBufferFull => WireError::BufferTooSmall,
            _ => WireError::Payload,
        }
    }
}

/// Temperature in centi-degrees, saturating at the `i16` range.
#[inline]
pub fn centi(celsius: f32) -> i16 {
    use micromath::F32Ext;
    (celsius * 100.0).round() as i16
}

/// CRC of a message from its kind byte onward (`kind | len | payload`).
pub fn checksum(kind: u8, payload: &[u8]) -> u16 {
    let mut digest = CRC16.digest();
    digest.update(&[kind]);
    digest.update(&(payload.len() as u16).to_le_bytes());
    digest.update(payload);
    digest.finalize()
}

/// Write preamble and CRC around a payload already placed at `out[PREAMBLE_LEN..][..len]`.
/// Returns the total message length.
pub fn seal(kind: u8, len: usize, out: &mut [u8]) -> Result<usize, WireError> {
    let total = PREAMBLE_LEN + len + CRC_LEN;
    if total > out.len() {
        return Err(WireError::BufferTooSmall);
    }
    let len16 = u16::try_from(len).map_err(|_| WireError::BufferTooSmall)?;
    out[0] = START_BYTE;
    out[1] = kind;
    out[2..4].copy_from_slice(&len16.to_le_bytes());
    let crc = checksum(kind, &out[PREAMBLE_LEN..PREAMBLE_LEN + len]);
    out[PREAMBLE_LEN + len..total].copy_from_slice(&crc.to_le_bytes());
    Ok(total)
}

/// Frame a command the way the collector sends it.
pub fn encode_command(command: &Command, out: &mut [u8]) -> Result<usize, WireError> {
    if out.len() < PREAMBLE_LEN {
        return Err(WireError::BufferTooSmall);
    }
    let len = postcard::to_slice(command, &mut out[PREAMBLE_LEN..])?.len();
    seal(KIND_COMMAND, len, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centi_degrees_round_and_saturate() {
        assert_eq!(centi(25.004), 2500);
        assert_eq!(centi(-12.346), -1235);
        assert_eq!(centi(1000.0), i16::MAX);
        assert_eq!(centi(-1000.0), i16::MIN);
    }

    #[test]
    fn sealed_message_layout() {
        let mut buf = [0u8; 16];
        buf[4..7].copy_from_slice(&[1, 2, 3]);
        let n = seal(0x42, 3, &mut buf).unwrap();
        assert_eq!(n, 9);
        assert_eq!(&buf[..4], &[START_BYTE, 0x42, 3, 0]);
        let crc = CRC16.checksum(&[0x42, 3, 0, 1, 2, 3]);
        assert_eq!(&buf[7..9], &crc.to_le_bytes());
    }

    #[test]
    fn seal_refuses_short_buffers() {
        let mut buf = [0u8; 8];
        assert_eq!(seal(KIND_FRAME, 3, &mut buf), Err(WireError::BufferTooSmall));
    }
}
