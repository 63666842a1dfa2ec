// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Network reporter.
//!
//! Owns the SPI device and the W5500 and keeps one TCP session to the collector alive. `poll`
//! is called periodically from its own context; every call does a bounded amount of work and
//! never waits on the network.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use crate::config::NetworkConfig;
use crate::drivers::w5500::{SocketStatus, W5500Error, W5500};
use crate::geometry::Mount;
use crate::network::backoff::Backoff;
use crate::network::queue::{CommandProducer, FrameConsumer};
use crate::network::telemetry::{LinkState, Telemetry};
use crate::protocol::encoder::{encode_frame, MAX_FRAME_MESSAGE};
use crate::protocol::Parser;
use crate::time::{Duration, Instant};
use crate::NUM_CHANNELS;

/// Bytes pulled from the socket per poll.
const RX_CHUNK: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReporterState {
    /// Socket closed; the next poll opens it and starts a CONNECT.
    Idle,
    Connecting { since: Instant },
    Connected,
    /// Waiting out a reconnect delay.
    Backoff { until: Instant },
}

pub struct Reporter<'q, SPI> {
    spi: SPI,
    chip: W5500,
    state: ReporterState,
    backoff: Backoff,
    net: NetworkConfig,
    mounts: [Mount; NUM_CHANNELS],
    frames: FrameConsumer<'q>,
    commands: CommandProducer<'q>,
    telemetry: &'q Telemetry,
    parser: Parser,
    /// Encoded message for the frame at the head of the queue.
    tx: &'q mut [u8; MAX_FRAME_MESSAGE],
    pending: Option<usize>,
}

impl<'q, SPI: SpiDevice> Reporter<'q, SPI> {
    pub fn new(
        spi: SPI,
        net: NetworkConfig,
        mounts: [Mount; NUM_CHANNELS],
        frames: FrameConsumer<'q>,
        commands: CommandProducer<'q>,
        telemetry: &'q Telemetry,
        tx: &'q mut [u8; MAX_FRAME_MESSAGE],
    ) -> Self {
        Self {
            spi,
            chip: W5500::new(),
            state: ReporterState::Idle,
            backoff: Backoff::new(net.backoff_min, net.backoff_max),
            net,
            mounts,
            frames,
            commands,
            telemetry,
            parser: Parser::new(),
            tx,
            pending: None,
        }
    }

    /// Reset and program the W5500.
    pub fn start<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), W5500Error<SPI::Error>> {
        self.chip.init(&mut self.spi, delay, &self.net)
    }

    pub fn state(&self) -> ReporterState {
        self.state
    }

    /// Advance the connection state machine and move at most one frame to the W5500.
    pub fn poll(&mut self, now: Instant) {
        let result = match self.state {
            ReporterState::Idle => self.open(now),
            ReporterState::Connecting { since } => self.check_connecting(now, since),
            ReporterState::Connected => self.service(now),
            ReporterState::Backoff { until } => {
                if now >= until {
                    self.state = ReporterState::Idle;
                }
                Ok(())
            }
        };

        if let Err(e) = result {
            log::warn!("reporter: {}", e);
            self.fail(now);
        }
    }

    fn open(&mut self, now: Instant) -> Result<(), W5500Error<SPI::Error>> {
        if !self.chip.link_up(&mut self.spi)? {
            log::debug!("reporter: no ethernet link");
            self.fail(now);
            return Ok(());
        }
        self.chip.open(&mut self.spi, self.net.local_port)?;
        self.chip
            .connect(&mut self.spi, self.net.collector_ip, self.net.collector_port)?;
        self.state = ReporterState::Connecting { since: now };
        Ok(())
    }

    fn check_connecting(
        &mut self,
        now: Instant,
        since: Instant,
    ) -> Result<(), W5500Error<SPI::Error>> {
        match self.chip.status(&mut self.spi)? {
            SocketStatus::Established => {
                self.state = ReporterState::Connected;
                self.backoff.reset();
                self.telemetry.set_link(LinkState::Up);
                self.telemetry.record_reconnect();
                log::info!(
                    "reporter: connected to {}.{}.{}.{}:{}",
                    self.net.collector_ip[0],
                    self.net.collector_ip[1],
                    self.net.collector_ip[2],
                    self.net.collector_ip[3],
                    self.net.collector_port
                );
            }
            SocketStatus::Init | SocketStatus::SynSent => {
                if now - since >= self.net.connect_timeout {
                    log::warn!("reporter: connect timed out");
                    self.fail(now);
                }
            }
            other => {
                log::warn!("reporter: connect failed ({:?})", other);
                self.fail(now);
            }
        }
        Ok(())
    }

    fn service(&mut self, now: Instant) -> Result<(), W5500Error<SPI::Error>> {
        if !self.chip.link_up(&mut self.spi)? {
            self.lost(now, "ethernet link down");
            return Ok(());
        }
        match self.chip.status(&mut self.spi)? {
            SocketStatus::Established => {}
            SocketStatus::CloseWait => {
                self.chip.disconnect(&mut self.spi)?;
                self.lost(now, "collector closed the connection");
                return Ok(());
            }
            _ => {
                self.lost(now, "connection reset");
                return Ok(());
            }
        }

        self.receive()?;
        self.transmit()
    }

    fn receive(&mut self) -> Result<(), W5500Error<SPI::Error>> {
        let mut buf = [0u8; RX_CHUNK];
        let n = self.chip.recv(&mut self.spi, &mut buf)?;
        for &b in &buf[..n] {
            match self.parser.push(b) {
                Ok(Some(cmd)) => {
                    if self.commands.enqueue(cmd).is_err() {
                        log::warn!("reporter: command queue full, dropped {:?}", cmd);
                    }
                }
                Ok(None) => {}
                Err(e) => log::warn!("reporter: bad inbound message: {}", e),
            }
        }
        Ok(())
    }

    fn transmit(&mut self) -> Result<(), W5500Error<SPI::Error>> {
        let len = match self.pending {
            Some(len) => len,
            None => {
                let Some(frame) = self.frames.peek() else {
                    return Ok(());
                };
                let dropped = self.telemetry.dropped_frames();
                match encode_frame(frame, dropped, &self.mounts, &mut self.tx[..]) {
                    Ok(len) => {
                        self.pending = Some(len);
                        len
                    }
                    Err(e) => {
                        log::error!("reporter: frame {} not encodable: {}", frame.sequence, e);
                        self.frames.dequeue();
                        self.telemetry.record_drop();
                        return Ok(());
                    }
                }
            }
        };

        match self.chip.send(&mut self.spi, &self.tx[..len]) {
            Ok(()) => {
                if let Some(frame) = self.frames.dequeue() {
                    log::debug!("reporter: sent frame {} ({} bytes)", frame.sequence, len);
                }
                self.pending = None;
                self.telemetry.record_sent();
                Ok(())
            }
            Err(nb::Error::WouldBlock) => Ok(()),
            Err(nb::Error::Other(e)) => Err(e),
        }
    }

    fn lost(&mut self, now: Instant, reason: &str) {
        log::warn!("reporter: {}", reason);
        self.fail(now);
    }

    /// Close the socket and wait out the next backoff delay.
    fn fail(&mut self, now: Instant) {
        if let Err(e) = self.chip.close(&mut self.spi) {
            log::debug!("reporter: close failed: {}", e);
        }
        self.telemetry.set_link(LinkState::Down);
        let delay: Duration = self.backoff.next_delay();
        log::info!("reporter: retrying in {} ms", delay.ticks());
        self.state = ReporterState::Backoff { until: now + delay };
    }

    pub fn free(self) -> SPI {
        self.spi
    }
}
