// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Inbound message parser.
//!
//! Byte-at-a-time state machine fed from the TCP receive path. Any framing, length or CRC error
//! drops the partial message and the parser waits for the next start byte. A rejected byte that
//! is itself a start byte opens the next message.

use heapless::Vec;

use crate::protocol::messages::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    WaitStart,
    WaitKind,
    WaitLenLo { kind: u8 },
    WaitLenHi { kind: u8, lo: u8 },
    Payload { kind: u8, len: u16 },
    WaitCrcLo { kind: u8 },
    WaitCrcHi { kind: u8, lo: u8 },
}

pub struct Parser {
    state: State,
    payload: Vec<u8, MAX_COMMAND_PAYLOAD>,
    errors: u32,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub const fn new() -> Self {
        Self {
            state: State::WaitStart,
            payload: Vec::new(),
            errors: 0,
        }
    }

    /// Messages rejected since start-up.
    pub fn errors(&self) -> u32 {
        self.errors
    }

    fn reject(&mut self, byte: u8, e: WireError) -> Result<Option<Command>, WireError> {
        self.state = if byte == START_BYTE {
            State::WaitKind
        } else {
            State::WaitStart
        };
        self.errors = self.errors.wrapping_add(1);
        Err(e)
    }

    /// Process a single incoming byte. Returns `Ok(Some(Command))` when a message completes.
    pub fn push(&mut self, byte: u8) -> Result<Option<Command>, WireError> {
        match self.state {
            State::WaitStart => {
                if byte == START_BYTE {
                    self.state = State::WaitKind;
                }
            }
            State::WaitKind => {
                if byte != KIND_COMMAND {
                    return self.reject(byte, WireError::UnknownKind(byte));
                }
                self.state = State::WaitLenLo { kind: byte };
            }
            State::WaitLenLo { kind } => {
                self.state = State::WaitLenHi { kind, lo: byte };
            }
            State::WaitLenHi { kind, lo } => {
                let len = u16::from_le_bytes([lo, byte]);
                if len == 0 || len as usize > MAX_COMMAND_PAYLOAD {
                    return self.reject(byte, WireError::Length(len));
                }
                self.payload.clear();
                self.state = State::Payload { kind, len };
            }
            State::Payload { kind, len } => {
                // Capacity equals the maximum accepted length, which was checked above.
                let _ = self.payload.push(byte);
                if self.payload.len() == len as usize {
                    self.state = State::WaitCrcLo { kind };
                }
            }
            State::WaitCrcLo { kind } => {
                self.state = State::WaitCrcHi { kind, lo: byte };
            }
            State::WaitCrcHi { kind, lo } => {
                self.state = State::WaitStart;
                let found = u16::from_le_bytes([lo, byte]);
                let expected = checksum(kind, &self.payload);
                if found != expected {
                    return self.reject(byte, WireError::Crc { expected, found });
                }
                return match postcard::from_bytes::<Command>(&self.payload) {
                    Ok(cmd) => Ok(Some(cmd)),
                    Err(_) => self.reject(byte, WireError::Payload),
                };
            }
        }
        Ok(None)
    }
}
