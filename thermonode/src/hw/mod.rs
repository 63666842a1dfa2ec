// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Board-facing seams: indicator outputs, the watchdog, the monotonic clock and the log queue.
//!
//! Concrete implementations for the STM32F405 live in the firmware crate.

pub mod led;
pub mod log_buffer;
pub mod watchdog;

pub use crate::time::Clock;
pub use led::{ActiveLevel, Led};
pub use log_buffer::LogBuffer;
pub use watchdog::Watchdog;
