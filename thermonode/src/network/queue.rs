// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Lock-free queues between the acquisition loop and the network reporter.

use heapless::spsc::{Consumer, Producer, Queue};

use crate::frame::AggregatedFrame;
use crate::network::telemetry::Telemetry;
use crate::protocol::Command;

/// Storage slots of the frame queue; one slot is always kept free, so two frames fit.
pub const FRAME_SLOTS: usize = 3;
pub const COMMAND_SLOTS: usize = 5;

pub type FrameQueue = Queue<AggregatedFrame, FRAME_SLOTS>;
pub type CommandQueue = Queue<Command, COMMAND_SLOTS>;

pub type FrameConsumer<'q> = Consumer<'q, AggregatedFrame, FRAME_SLOTS>;
pub type CommandProducer<'q> = Producer<'q, Command, COMMAND_SLOTS>;
pub type CommandConsumer<'q> = Consumer<'q, Command, COMMAND_SLOTS>;

/// Acquisition side of the frame queue.
pub struct FrameSender<'q> {
    producer: Producer<'q, AggregatedFrame, FRAME_SLOTS>,
    telemetry: &'q Telemetry,
}

impl<'q> FrameSender<'q> {
    pub fn new(producer: Producer<'q, AggregatedFrame, FRAME_SLOTS>, telemetry: &'q Telemetry) -> Self {
        Self {
            producer,
            telemetry,
        }
    }

    /// Hand a frame to the reporter without blocking. A full queue discards the frame and
    /// bumps the drop counter. Returns whether the frame was queued.
    pub fn offer(&mut self, frame: AggregatedFrame) -> bool {
        match self.producer.enqueue(frame) {
            Ok(()) => true,
            Err(rejected) => {
                let total = self.telemetry.record_drop();
                log::warn!("queue full, dropped frame {} ({} total)", rejected.sequence, total);
                false
            }
        }
    }

    pub fn telemetry(&self) -> &'q Telemetry {
        self.telemetry
    }
}
