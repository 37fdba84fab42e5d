//! Incremental line framing for the text protocol
//!
//! Stream sockets deliver bytes in arbitrary chunks: a single name may arrive
//! over several reads, and one read may carry several commands. The
//! `LineAssembler` keeps the unterminated tail of a connection between reads
//! and hands out complete lines one at a time, so a caller never has to wait
//! on a connection that has not finished a line.
//!
//! A line ends at the first CR or LF. An LF that directly follows a CR
//! terminator belongs to the same terminator, even when it arrives in a later
//! read, so CRLF clients do not produce spurious empty lines.

use crate::{MAXMESSAGE, MAXNAME};

/// Framing failures surfaced to the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    #[error("peer closed the connection")]
    PeerClosed,
    #[error("name exceeds {} bytes", MAXNAME)]
    NameTooLong,
    #[error("message exceeds {} bytes", MAXMESSAGE)]
    MessageTooLong,
}

/// Bound applied to unterminated input, depending on the session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineLimit {
    Name,
    Message,
    /// Arbitrary bound, reported as `MessageTooLong` when exceeded
    Custom(usize),
}

impl LineLimit {
    /// Longest permitted line content in bytes, terminator excluded
    pub fn max_len(self) -> usize {
        match self {
            LineLimit::Name => MAXNAME,
            LineLimit::Message => MAXMESSAGE,
            LineLimit::Custom(max_len) => max_len,
        }
    }

    fn overflow(self) -> LineError {
        match self {
            LineLimit::Name => LineError::NameTooLong,
            LineLimit::Message | LineLimit::Custom(_) => LineError::MessageTooLong,
        }
    }
}

/// Per-connection accumulation buffer
#[derive(Debug)]
pub struct LineAssembler {
    buffer: Vec<u8>,
    limit: LineLimit,
    /// Set after a CR terminator; a directly following LF is swallowed
    skip_lf: bool,
}

impl LineAssembler {
    pub fn new(limit: LineLimit) -> Self {
        Self {
            buffer: Vec::with_capacity(limit.max_len() + 1),
            limit,
            skip_lf: false,
        }
    }

    /// Switches the bound for all bytes not yet returned as lines
    pub fn set_limit(&mut self, limit: LineLimit) {
        self.limit = limit;
    }

    /// Number of buffered bytes not yet returned as part of a line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Appends the bytes of one read
    ///
    /// An empty slice is what a read returns once the peer has closed its
    /// side, so it is reported as `PeerClosed` rather than ignored.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), LineError> {
        if bytes.is_empty() {
            return Err(LineError::PeerClosed);
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Returns the next complete line, or `None` if more bytes are needed
    ///
    /// Invalid UTF-8 is replaced rather than rejected; callers that need the
    /// exact bytes use [`LineAssembler::next_raw_line`].
    pub fn next_line(&mut self) -> Result<Option<String>, LineError> {
        let line = self.next_raw_line()?;
        Ok(line.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Returns the bytes of the next complete line, terminator stripped
    ///
    /// Once the buffered content exceeds the current bound without a
    /// terminator the buffer is discarded and the matching overflow error is
    /// returned.
    pub fn next_raw_line(&mut self) -> Result<Option<Vec<u8>>, LineError> {
        if self.skip_lf {
            match self.buffer.first() {
                Some(b'\n') => {
                    self.buffer.remove(0);
                    self.skip_lf = false;
                }
                Some(_) => self.skip_lf = false,
                None => return Ok(None),
            }
        }

        let max_len = self.limit.max_len();
        match self
            .buffer
            .iter()
            .position(|byte| *byte == b'\r' || *byte == b'\n')
        {
            Some(end) if end > max_len => {
                self.buffer.clear();
                Err(self.limit.overflow())
            }
            Some(end) => {
                let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
                self.skip_lf = line.pop() == Some(b'\r');
                Ok(Some(line))
            }
            None if self.buffer.len() > max_len => {
                self.buffer.clear();
                Err(self.limit.overflow())
            }
            None => Ok(None),
        }
    }

    /// Lazily drains every complete line currently buffered
    pub fn lines(&mut self) -> Lines<'_> {
        Lines {
            assembler: self,
            failed: false,
        }
    }
}

/// Iterator returned by [`LineAssembler::lines`]; stops after the first error
pub struct Lines<'a> {
    assembler: &'a mut LineAssembler,
    failed: bool,
}

impl Iterator for Lines<'_> {
    type Item = Result<String, LineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = self.assembler.next_line().transpose();
        if matches!(next, Some(Err(_))) {
            self.failed = true;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_delivery() {
        let mut assembler = LineAssembler::new(LineLimit::Name);

        assembler.feed(b"ali").unwrap();
        assert_eq!(assembler.next_line(), Ok(None));
        assert_eq!(assembler.pending(), 3);

        assembler.feed(b"ce\n").unwrap();
        assert_eq!(assembler.next_line(), Ok(Some("alice".to_string())));
        assert_eq!(assembler.next_line(), Ok(None));
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn test_multiple_lines_in_one_read() {
        let mut assembler = LineAssembler::new(LineLimit::Message);
        assembler.feed(b"1\n2\n3").unwrap();

        let lines: Vec<_> = assembler.lines().collect();
        assert_eq!(lines, vec![Ok("1".to_string()), Ok("2".to_string())]);
        assert_eq!(assembler.pending(), 1);
    }

    #[test]
    fn test_crlf_is_one_terminator() {
        let mut assembler = LineAssembler::new(LineLimit::Message);
        assembler.feed(b"3\r\n4\r\n").unwrap();

        let lines: Vec<_> = assembler.lines().collect();
        assert_eq!(lines, vec![Ok("3".to_string()), Ok("4".to_string())]);
    }

    #[test]
    fn test_crlf_split_across_reads() {
        let mut assembler = LineAssembler::new(LineLimit::Message);

        assembler.feed(b"2\r").unwrap();
        assert_eq!(assembler.next_line(), Ok(Some("2".to_string())));
        assert_eq!(assembler.next_line(), Ok(None));

        assembler.feed(b"\n5\n").unwrap();
        assert_eq!(assembler.next_line(), Ok(Some("5".to_string())));
        assert_eq!(assembler.next_line(), Ok(None));
    }

    #[test]
    fn test_bare_terminators_yield_empty_lines() {
        let mut assembler = LineAssembler::new(LineLimit::Message);
        assembler.feed(b"\n\r\r\n").unwrap();

        let lines: Vec<_> = assembler.lines().collect();
        assert_eq!(
            lines,
            vec![Ok(String::new()), Ok(String::new()), Ok(String::new())]
        );
    }

    #[test]
    fn test_name_at_limit_is_accepted() {
        let mut assembler = LineAssembler::new(LineLimit::Name);
        let name = "n".repeat(MAXNAME);

        assembler.feed(name.as_bytes()).unwrap();
        assert_eq!(assembler.next_line(), Ok(None));
        assembler.feed(b"\r\n").unwrap();
        assert_eq!(assembler.next_line(), Ok(Some(name)));
    }

    #[test]
    fn test_name_too_long_without_terminator() {
        let mut assembler = LineAssembler::new(LineLimit::Name);
        assembler.feed(&[b'x'; MAXNAME + 1]).unwrap();

        assert_eq!(assembler.next_line(), Err(LineError::NameTooLong));
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn test_name_too_long_with_terminator() {
        let mut assembler = LineAssembler::new(LineLimit::Name);
        let mut bytes = vec![b'x'; MAXNAME + 5];
        bytes.push(b'\n');
        assembler.feed(&bytes).unwrap();

        assert_eq!(assembler.next_line(), Err(LineError::NameTooLong));
    }

    #[test]
    fn test_message_limit_is_larger() {
        let mut assembler = LineAssembler::new(LineLimit::Message);
        assembler.feed(&[b'7'; MAXNAME + 1]).unwrap();
        assert_eq!(assembler.next_line(), Ok(None));

        assembler.feed(&[b'7'; MAXMESSAGE]).unwrap();
        assert_eq!(assembler.next_line(), Err(LineError::MessageTooLong));
    }

    #[test]
    fn test_limit_switch_applies_to_buffered_bytes() {
        let mut assembler = LineAssembler::new(LineLimit::Name);
        let mut bytes = b"dave\n".to_vec();
        bytes.extend_from_slice(&[b'1'; MAXNAME + 10]);
        bytes.push(b'\n');
        assembler.feed(&bytes).unwrap();

        assert_eq!(assembler.next_line(), Ok(Some("dave".to_string())));
        assembler.set_limit(LineLimit::Message);
        assert_eq!(assembler.limit, LineLimit::Message);
        assert_eq!(
            assembler.next_line(),
            Ok(Some("1".repeat(MAXNAME + 10)))
        );
    }

    #[test]
    fn test_custom_limit() {
        let mut assembler = LineAssembler::new(LineLimit::Custom(4));
        assembler.feed(b"abcd\nabcde").unwrap();

        assert_eq!(assembler.next_line(), Ok(Some("abcd".to_string())));
        assert_eq!(assembler.next_line(), Err(LineError::MessageTooLong));
    }

    #[test]
    fn test_raw_lines_keep_invalid_utf8() {
        let mut assembler = LineAssembler::new(LineLimit::Name);
        assembler.feed(b"a\xffb\r\na\xfeb\n").unwrap();

        assert_eq!(assembler.next_raw_line(), Ok(Some(b"a\xffb".to_vec())));
        assert_eq!(
            assembler.next_line(),
            Ok(Some("a\u{fffd}b".to_string()))
        );
        assert_eq!(assembler.next_raw_line(), Ok(None));
    }

    #[test]
    fn test_empty_read_is_peer_closed() {
        let mut assembler = LineAssembler::new(LineLimit::Name);
        assert_eq!(assembler.feed(&[]), Err(LineError::PeerClosed));
    }

    #[test]
    fn test_lines_iterator_stops_after_error() {
        let mut assembler = LineAssembler::new(LineLimit::Name);
        assembler.feed(&[b'x'; MAXNAME + 2]).unwrap();

        let mut lines = assembler.lines();
        assert_eq!(lines.next(), Some(Err(LineError::NameTooLong)));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut assembler = LineAssembler::new(LineLimit::Name);
        assembler.feed(&[b'a', 0xff, b'b', b'\n']).unwrap();

        assert_eq!(
            assembler.next_line(),
            Ok(Some("a\u{fffd}b".to_string()))
        );
    }
}
