// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Aggregated frame serialization.
//!
//! The payload is the postcard-encoded [`FrameHeader`] followed by one pixel block per present
//! channel, in channel order. A block is 768 little-endian `i16` centi-degree values, row-major.

use crate::frame::AggregatedFrame;
use crate::geometry::Mount;
use crate::protocol::messages::*;
use crate::time::millis;
use crate::{FRAME_PIXELS, NUM_CHANNELS};

/// Bytes in one channel's pixel block.
pub const PIXEL_BLOCK_LEN: usize = FRAME_PIXELS * 2;

/// Upper bound of an encoded header.
pub const MAX_HEADER_LEN: usize = 160;

/// Buffer size that fits any frame message.
pub const MAX_FRAME_MESSAGE: usize =
    PREAMBLE_LEN + MAX_HEADER_LEN + NUM_CHANNELS * PIXEL_BLOCK_LEN + CRC_LEN;

/// Build the header for `frame`. The hotspot is placed on the surface with its channel's mount.
pub fn frame_header(
    frame: &AggregatedFrame,
    dropped_frames: u32,
    mounts: &[Mount; NUM_CHANNELS],
) -> FrameHeader {
    let mut channels = [ChannelSummary::missing(frame.health[0]); NUM_CHANNELS];
    for (i, summary) in channels.iter_mut().enumerate() {
        *summary = match &frame.slots[i] {
            Some(f) => ChannelSummary {
                present: true,
                health: frame.health[i],
                captured_ms: millis(f.timestamp),
                ambient_centi: centi(f.ambient),
                min_centi: centi(f.min()),
                max_centi: centi(f.max()),
            },
            None => ChannelSummary::missing(frame.health[i]),
        };
    }

    let hotspot = frame.hotspot().map(|h| HotspotReport {
        channel: h.channel.into(),
        column: h.column,
        row: h.row,
        celsius_centi: centi(h.celsius),
        surface_mm: mounts[h.channel.index()].locate(&h),
    });

    FrameHeader {
        version: WIRE_VERSION,
        sequence: frame.sequence,
        started_ms: millis(frame.started),
        finished_ms: millis(frame.finished),
        complete: frame.complete,
        dropped_frames,
        channels,
        hotspot,
    }
}

/// Encode `frame` as a complete `KIND_FRAME` message into `out`. Returns the message length.
pub fn encode_frame(
    frame: &AggregatedFrame,
    dropped_frames: u32,
    mounts: &[Mount; NUM_CHANNELS],
    out: &mut [u8],
) -> Result<usize, WireError> {
    if out.len() < PREAMBLE_LEN {
        return Err(WireError::BufferTooSmall);
    }
    let header = frame_header(frame, dropped_frames, mounts);
    let mut len = postcard::to_slice(&header, &mut out[PREAMBLE_LEN..])?.len();

    for f in frame.frames() {
        let start = PREAMBLE_LEN + len;
        let block = out
            .get_mut(start..start + PIXEL_BLOCK_LEN)
            .ok_or(WireError::BufferTooSmall)?;
        for (dst, &t) in block.chunks_exact_mut(2).zip(f.pixels.iter()) {
            dst.copy_from_slice(&centi(t).to_le_bytes());
        }
        len += PIXEL_BLOCK_LEN;
    }

    seal(KIND_FRAME, len, out)
}

/// Split a `KIND_FRAME` payload into its header and the pixel blocks that follow.
pub fn decode_frame_payload(payload: &[u8]) -> Result<(FrameHeader, &[u8]), WireError> {
    let (header, rest) = postcard::take_from_bytes::<FrameHeader>(payload)?;
    let present = header.channels.iter().filter(|c| c.present).count();
    if rest.len() != present * PIXEL_BLOCK_LEN {
        return Err(WireError::Length(payload.len() as u16));
    }
    Ok((header, rest))
}
