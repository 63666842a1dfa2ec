// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Network side of the node: the frame queue, the reporter that drains it over TCP, and the
//! shared link telemetry.

pub mod backoff;
pub mod queue;
pub mod reporter;
pub mod telemetry;

pub use backoff::Backoff;
pub use queue::{CommandConsumer, CommandQueue, FrameConsumer, FrameQueue, FrameSender};
pub use reporter::{Reporter, ReporterState};
pub use telemetry::{LinkState, Telemetry};
