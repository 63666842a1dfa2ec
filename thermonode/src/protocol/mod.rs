// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Wire protocol between the node and its collector.

pub mod encoder;
pub mod messages;
pub mod parser;

pub use encoder::{encode_frame, MAX_FRAME_MESSAGE};
pub use messages::{Command, FrameHeader, WireError};
pub use parser::Parser;
