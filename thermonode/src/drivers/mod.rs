// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Device-Specific Drivers
//!
//! Drivers sit above the `embedded-hal` traits and below the acquisition and network logic.
//! None of them owns its bus; the bus is borrowed for each call.
//!
//! ## Existing drivers
//!
//! - [`tca9548a`] – TI TCA9548A 8-channel I2C switch
//! - [`mlx90640`] – Melexis MLX90640 32×24 thermal camera
//! - [`w5500`] – WIZnet W5500 Ethernet controller, socket 0 as TCP client

pub mod mlx90640;
pub mod tca9548a;
pub mod w5500;

pub use mlx90640::{CameraError, Mlx90640, ThermalCamera};
pub use tca9548a::{MuxError, Tca9548a};
pub use w5500::{W5500Error, W5500};
