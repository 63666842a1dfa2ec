// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # ThermoNode Firmware
//!
//! Board-independent logic for the ThermoNode, a PoE-powered sensor node that watches a surface
//! with four Melexis MLX90640 thermal cameras behind a TCA9548A I2C multiplexer and reports the
//! images to a collector over a WIZnet W5500 TCP connection. The node targets an STM32F405; the
//! board bring-up lives in the `thermonode-fw` crate.
//!
//! ## Crate Structure
//!
//! | Module | Purpose |
//! | ------ | -------- |
//! | [`hw`] | Board seams: indicator outputs, watchdog, monotonic clock |
//! | [`drivers`] | Device-level drivers (TCA9548A, MLX90640, W5500) |
//! | [`acquisition`] | Multiplex manager, frame aggregator and the sweep loop |
//! | [`network`] | Outbound queue, TCP reporter and link telemetry |
//! | [`protocol`] | Framed wire format to and from the collector |
//! | [`status`] | Status LED and alarm output logic |
//! | [`geometry`] | Camera placement and pixel-to-surface projection |
//! | [`config`] | Node configuration and validation |
//!
//! ## Getting Started
//!
//! Run the host tests:
//!
//! ```bash
//! cargo test -p thermonode
//! ```
//!
//! Flash the board:
//!
//! ```bash
//! cd firmware && cargo run --release
//! ```
//!
//! ## License
//!
//! Licensed under the **MIT License**.
//! See the `LICENSE` file in the repository root for full terms.
//!
//! © 2025–2026 Christopher Liu

#![cfg_attr(not(test), no_std)]

pub mod acquisition;
pub mod channel;
pub mod config;
pub mod drivers;
pub mod frame;
pub mod geometry;
pub mod hw;
pub mod network;
pub mod protocol;
pub mod status;
pub mod time;

#[cfg(test)]
mod testing;

/// Columns of an MLX90640 image.
pub const FRAME_WIDTH: usize = 32;
/// Rows of an MLX90640 image.
pub const FRAME_HEIGHT: usize = 24;
pub const FRAME_PIXELS: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// Cameras on the node, one per multiplexer port 0..=3.
pub const NUM_CHANNELS: usize = 4;
