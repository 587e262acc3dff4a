//! Console surface: line input and notification output.
//!
//! Input is line-oriented. A line ends at `\r` or `\n` (a `\r\n` pair
//! counts once) and is handed over without its terminator; an empty line
//! is still a line. Bytes past the buffer capacity are dropped.
//!
//! Output is log-only: [`LogSink`] renders each notification as text.

use heapless::{String, Vec};

use crate::ble::subscription::NotificationSink;
use crate::config::MAX_PAYLOAD_LEN;

/// Capacity of a rendered payload. Replacement characters take three
/// bytes, so a heavily corrupted payload renders truncated.
pub const RENDER_MAX: usize = 256;

const REPLACEMENT: char = '\u{FFFD}';

/// Accumulates console bytes into lines.
pub struct LineBuffer<const N: usize> {
    buf: Vec<u8, N>,
    complete: bool,
    last_was_cr: bool,
    truncated: bool,
}

impl<const N: usize> LineBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            complete: false,
            last_was_cr: false,
            truncated: false,
        }
    }

    /// Feed one byte. Returns the completed line when `byte` ends one.
    ///
    /// The line stays readable until the next call.
    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        let after_cr = core::mem::replace(&mut self.last_was_cr, byte == b'\r');
        if self.complete {
            self.buf.clear();
            self.complete = false;
            self.truncated = false;
        }

        match byte {
            b'\n' if after_cr => None,
            b'\r' | b'\n' => {
                if self.truncated {
                    warn!("console: line longer than {} bytes, truncated", N);
                }
                self.complete = true;
                Some(self.buf.as_slice())
            }
            _ => {
                if self.buf.push(byte).is_err() {
                    self.truncated = true;
                }
                None
            }
        }
    }

    /// Bytes of the line still being typed.
    pub fn pending(&self) -> &[u8] {
        if self.complete {
            &[]
        } else {
            self.buf.as_slice()
        }
    }
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Render `payload` as text: valid UTF-8 is kept, invalid sequences and
/// NUL bytes become U+FFFD.
pub fn render_printable<const N: usize>(payload: &[u8]) -> String<N> {
    let mut out = String::new();
    let mut rest = payload;

    while !rest.is_empty() {
        let (valid, consumed) = match core::str::from_utf8(rest) {
            Ok(s) => (s, rest.len()),
            Err(e) => {
                let good = e.valid_up_to();
                let bad = e.error_len().unwrap_or(rest.len() - good);
                let s = core::str::from_utf8(&rest[..good]).unwrap_or_default();
                (s, good + bad)
            }
        };

        for c in valid.chars() {
            let c = if c == '\0' { REPLACEMENT } else { c };
            if out.push(c).is_err() {
                return out;
            }
        }
        if consumed > valid.len() && out.push(REPLACEMENT).is_err() {
            return out;
        }
        rest = &rest[consumed..];
    }
    out
}

/// Notification consumer that logs every payload.
#[derive(Default)]
pub struct LogSink {
    received: usize,
}

impl LogSink {
    pub const fn new() -> Self {
        Self { received: 0 }
    }

    /// Number of payloads logged so far.
    pub fn received(&self) -> usize {
        self.received
    }
}

impl NotificationSink for LogSink {
    fn on_notification(&mut self, value_handle: u16, payload: &[u8]) {
        self.received += 1;
        if payload.len() > MAX_PAYLOAD_LEN {
            debug!("console: oversized payload ({} bytes)", payload.len());
        }
        let text: String<RENDER_MAX> = render_printable(payload);
        info!(
            "central: received {} bytes on {:#x}: {}",
            payload.len(),
            value_handle,
            text.as_str()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed<const N: usize>(lb: &mut LineBuffer<N>, input: &[u8]) -> std::vec::Vec<std::vec::Vec<u8>> {
        let mut lines = std::vec::Vec::new();
        for &b in input {
            if let Some(line) = lb.push(b) {
                lines.push(line.to_vec());
            }
        }
        lines
    }

    #[test]
    fn lines_split_on_cr_lf_and_crlf() {
        let mut lb: LineBuffer<32> = LineBuffer::new();
        let lines = feed(&mut lb, b"one\rtwo\nthree\r\nfour");
        assert_eq!(lines, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
        assert_eq!(lb.pending(), b"four");
    }

    #[test]
    fn empty_lines_are_kept() {
        let mut lb: LineBuffer<8> = LineBuffer::new();
        let lines = feed(&mut lb, b"\n\r\n");
        assert_eq!(lines, vec![vec![], vec![]]);
    }

    #[test]
    fn long_lines_are_truncated() {
        let mut lb: LineBuffer<4> = LineBuffer::new();
        let lines = feed(&mut lb, b"abcdefg\nxy\n");
        assert_eq!(lines, vec![b"abcd".to_vec(), b"xy".to_vec()]);
    }

    #[test]
    fn render_keeps_text() {
        let s: String<32> = render_printable(b"HELLO");
        assert_eq!(s.as_str(), "HELLO");
    }

    #[test]
    fn render_replaces_nul_and_invalid_bytes() {
        let s: String<32> = render_printable(&[b'A', 0x00, b'B', 0xFF, b'C']);
        assert_eq!(s.as_str(), "A\u{FFFD}B\u{FFFD}C");
    }

    #[test]
    fn render_handles_truncated_sequence_at_end() {
        let s: String<32> = render_printable(&[b'o', b'k', 0xE2, 0x82]);
        assert_eq!(s.as_str(), "ok\u{FFFD}");
    }

    #[test]
    fn render_stops_at_capacity() {
        let s: String<4> = render_printable(b"abcdefgh");
        assert_eq!(s.as_str(), "abcd");
    }

    #[test]
    fn log_sink_counts_payloads() {
        let mut sink = LogSink::new();
        sink.on_notification(0x0012, b"HI");
        sink.on_notification(0x0012, &[0x00]);
        assert_eq!(sink.received(), 2);
    }
}
