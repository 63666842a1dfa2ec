// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! USART abstraction layer and the `log` backend that writes to it.
//!
//! Log lines go to the USART1 debug terminal, CRLF terminated, prefixed with milliseconds since
//! boot and the level. To access the terminal on the host machine, use
//! ```
//! $ screen /dev/tty.usbserial* 115200
//! ```
//!
//! To close the debug terminal, press `Ctrl+A` then `Ctrl+\` then `y`.
//!
//! Logging never waits on the UART. A line is formatted on the caller's stack, copied into a
//! ring buffer inside a short critical section, and the USART1 interrupt is pended. The
//! `log_drain` task then writes the buffer out at the lowest interrupt priority, so the clock
//! and the network reporter keep running while a line is on the wire.

use core::cell::RefCell;
use core::fmt::{self, Write as _};

use cortex_m::interrupt::{self, Mutex};
use cortex_m::peripheral::NVIC;
use heapless::String;
use nb::block;
use stm32f4xx_hal::{
    pac,
    prelude::*,
    serial::{Serial, Tx},
};

use thermonode::hw::LogBuffer;

use crate::clock;

/// Longest line kept; longer messages are cut short.
const LINE_LEN: usize = 160;
/// Bytes waiting for the UART.
const BUFFER_LEN: usize = 2048;

/// Transmit half of the debug USART.
pub struct Usart {
    tx: Tx<pac::USART1>,
}

impl Usart {
    pub fn new(serial: Serial<pac::USART1>) -> Self {
        let (tx, _rx) = serial.split();
        Self { tx }
    }

    #[inline]
    pub fn write_byte(&mut self, b: u8) {
        let _ = block!(self.tx.write(b));
    }

    pub fn write_str(&mut self, s: &str) {
        for &b in s.as_bytes() {
            self.write_byte(b);
        }
    }

    /// Block until the hardware TX FIFO/drain is flushed.
    #[inline]
    pub fn flush(&mut self) {
        let _ = block!(self.tx.flush());
    }
}

// Implement `core::fmt::Write` so we can use `write!` / `writeln!` on `Usart`.
impl fmt::Write for Usart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Usart::write_str(self, s);
        Ok(())
    }
}

static BUFFER: Mutex<RefCell<LogBuffer<BUFFER_LEN>>> = Mutex::new(RefCell::new(LogBuffer::new()));

/// `log` backend over the debug USART.
struct UsartLogger;

static LOGGER: UsartLogger = UsartLogger;

impl log::Log for UsartLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut line: String<LINE_LEN> = String::new();
        // A full line keeps whatever fitted.
        let _ = write!(
            line,
            "[{:>8} {:<5}] {}",
            clock::now().ticks(),
            record.level(),
            record.args()
        );

        interrupt::free(|cs| BUFFER.borrow(cs).borrow_mut().push_line(&line));
        NVIC::pend(pac::Interrupt::USART1);
    }

    fn flush(&self) {}
}

/// Write out everything buffered so far. Runs from the `log_drain` task.
pub fn drain(usart: &mut Usart) {
    let dropped = interrupt::free(|cs| BUFFER.borrow(cs).borrow_mut().take_dropped());
    if dropped > 0 {
        let _ = write!(usart, "[{} log lines dropped]\r\n", dropped);
    }

    while let Some(b) = interrupt::free(|cs| BUFFER.borrow(cs).borrow_mut().pop()) {
        usart.write_byte(b);
    }
    usart.flush();
}

/// Route the `log` macros to the debug USART.
pub fn init_logger(level: log::LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
