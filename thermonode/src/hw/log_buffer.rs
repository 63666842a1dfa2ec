// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Byte queue between the logger and the debug UART.
//!
//! Whole lines go in or nothing does, so the terminal never shows half a line. Lines that do not
//! fit are counted and reported by the drain side.

use heapless::Deque;

pub struct LogBuffer<const N: usize> {
    bytes: Deque<u8, N>,
    dropped: u32,
}

impl<const N: usize> LogBuffer<N> {
    pub const fn new() -> Self {
        Self {
            bytes: Deque::new(),
            dropped: 0,
        }
    }

    /// Queue `line` followed by CRLF. Returns `false` and counts a drop if it does not fit.
    pub fn push_line(&mut self, line: &str) -> bool {
        let free = self.bytes.capacity() - self.bytes.len();
        if free < line.len() + 2 {
            self.dropped = self.dropped.wrapping_add(1);
            return false;
        }
        for &b in line.as_bytes().iter().chain(b"\r\n") {
            let _ = self.bytes.push_back(b);
        }
        true
    }

    pub fn pop(&mut self) -> Option<u8> {
        self.bytes.pop_front()
    }

    /// Lines dropped since the last call.
    pub fn take_dropped(&mut self) -> u32 {
        core::mem::take(&mut self.dropped)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl<const N: usize> Default for LogBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<const N: usize>(buffer: &mut LogBuffer<N>) -> Vec<u8> {
        core::iter::from_fn(|| buffer.pop()).collect()
    }

    #[test]
    fn lines_come_out_in_order_with_crlf() {
        let mut buffer = LogBuffer::<64>::new();
        assert!(buffer.push_line("one"));
        assert!(buffer.push_line("two"));
        assert_eq!(drain(&mut buffer), b"one\r\ntwo\r\n");
        assert!(buffer.is_empty());
    }

    #[test]
    fn a_line_that_does_not_fit_is_dropped_whole() {
        let mut buffer = LogBuffer::<8>::new();
        assert!(buffer.push_line("abcd"));
        assert!(!buffer.push_line("ef"));
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.take_dropped(), 1);
        assert_eq!(buffer.take_dropped(), 0);

        // Draining frees room for the next line.
        assert_eq!(drain(&mut buffer), b"abcd\r\n");
        assert!(buffer.push_line("ef"));
        assert_eq!(drain(&mut buffer), b"ef\r\n");
    }

    #[test]
    fn exact_fit_is_accepted() {
        let mut buffer = LogBuffer::<6>::new();
        assert!(buffer.push_line("abcd"));
        assert!(!buffer.push_line(""));
        assert_eq!(buffer.take_dropped(), 1);
    }
}
