//! Incremental `\r\n` line framing.
//!
//! Bytes from the transport are appended with [`LineFramer::push`]; complete
//! lines are taken out with [`LineFramer::next_line`]. Once the transport
//! reports end-of-stream ([`LineFramer::mark_eof`]), any unterminated tail
//! is emitted as one final line.

use bytes::{Buf, BytesMut};

/// The two-byte line terminator used on AT links.
pub const TERMINATOR: &[u8] = b"\r\n";

/// Line-buffering cursor over an append-only byte stream.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: BytesMut,
    /// Offset below which `buf` is known to hold no terminator.
    scanned: usize,
    eof: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the transport.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Record that the stream has ended; no more bytes will be pushed.
    pub fn mark_eof(&mut self) {
        self.eof = true;
    }

    /// Whether the stream has ended and every byte has been framed.
    pub fn is_exhausted(&self) -> bool {
        self.eof && self.buf.is_empty()
    }

    /// Take the next complete line, without its terminator.
    ///
    /// Returns `None` when more bytes are needed, or when the stream has
    /// ended and the buffer is empty.
    pub fn next_line(&mut self) -> Option<String> {
        if let Some(pos) = find_terminator(&self.buf[self.scanned..]) {
            let line = self.buf.split_to(self.scanned + pos);
            self.buf.advance(TERMINATOR.len());
            self.scanned = 0;
            return Some(to_text(&line));
        }
        if self.eof && !self.buf.is_empty() {
            let tail = self.buf.split();
            self.scanned = 0;
            return Some(to_text(&tail));
        }
        // A terminator may straddle the end of the buffer and the next push.
        self.scanned = self.buf.len().saturating_sub(TERMINATOR.len() - 1);
        None
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(TERMINATOR.len()).position(|w| w == TERMINATOR)
}

/// Decode a framed line, dropping one trailing `\r`.
fn to_text(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(framer: &mut LineFramer) -> Vec<String> {
        std::iter::from_fn(|| framer.next_line()).collect()
    }

    #[test]
    fn one_line_per_terminator() {
        let mut f = LineFramer::new();
        f.push(b"AT\r\nOK\r\n+CEREG: 1,1\r\n");
        assert_eq!(drain(&mut f), vec!["AT", "OK", "+CEREG: 1,1"]);
    }

    #[test]
    fn empty_lines_are_framed() {
        let mut f = LineFramer::new();
        f.push(b"\r\nOK\r\n\r\n");
        assert_eq!(drain(&mut f), vec!["", "OK", ""]);
    }

    #[test]
    fn partial_line_waits_for_more_bytes() {
        let mut f = LineFramer::new();
        f.push(b"+NSON");
        assert_eq!(f.next_line(), None);
        f.push(b"MI: 0,7\r");
        assert_eq!(f.next_line(), None);
        f.push(b"\nOK");
        assert_eq!(f.next_line().as_deref(), Some("+NSONMI: 0,7"));
        assert_eq!(f.next_line(), None);
    }

    #[test]
    fn long_line_is_not_rescanned() {
        let mut f = LineFramer::new();
        for _ in 0..8 {
            f.push(&[b'A'; 512]);
            assert_eq!(f.next_line(), None);
            assert_eq!(f.scanned, f.buf.len() - 1);
        }
        f.push(b"\r");
        assert_eq!(f.next_line(), None);
        f.push(b"\nOK\r\n");
        assert_eq!(f.next_line().map(|l| l.len()), Some(8 * 512));
        assert_eq!(f.scanned, 0);
        assert_eq!(f.next_line().as_deref(), Some("OK"));
    }

    #[test]
    fn tail_emitted_once_at_eof() {
        let mut f = LineFramer::new();
        f.push(b"AT\r\n123");
        assert_eq!(f.next_line().as_deref(), Some("AT"));
        assert_eq!(f.next_line(), None);
        f.mark_eof();
        assert_eq!(f.next_line().as_deref(), Some("123"));
        assert_eq!(f.next_line(), None);
        assert!(f.is_exhausted());
    }

    #[test]
    fn eof_with_empty_buffer_emits_nothing() {
        let mut f = LineFramer::new();
        f.push(b"OK\r\n");
        f.mark_eof();
        assert_eq!(drain(&mut f), vec!["OK"]);
        assert!(f.is_exhausted());
    }

    #[test]
    fn stray_carriage_return_is_dropped() {
        let mut f = LineFramer::new();
        f.push(b"OK\r\r\nDATA\r");
        f.mark_eof();
        assert_eq!(drain(&mut f), vec!["OK", "DATA"]);
    }

    #[test]
    fn line_count_matches_terminators() {
        let input = b"a\r\nb\r\n\r\nc\r\nd";
        let k = input.windows(2).filter(|w| *w == TERMINATOR).count();
        let mut f = LineFramer::new();
        f.push(input);
        assert_eq!(drain(&mut f).len(), k);
        f.mark_eof();
        assert_eq!(drain(&mut f), vec!["d"]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut f = LineFramer::new();
        f.push(b"\xffOK\r\n");
        assert_eq!(f.next_line().as_deref(), Some("\u{fffd}OK"));
    }
}
