//! Per-connection protocol state: naming first, then moves

use crate::error::{ProtocolViolation, SessionError};
use crate::roster::ConnectionId;
use log::debug;
use shared::{LineAssembler, LineLimit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Naming,
    Playing,
    Closed,
}

/// A validated line from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Candidate name; uniqueness is checked against the roster
    Name(String),
    /// Pit index, or `None` if the line was not a number
    Move(Option<usize>),
}

/// Protocol state machine of one connection
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    phase: Phase,
    assembler: LineAssembler,
}

impl Session {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            phase: Phase::Naming,
            assembler: LineAssembler::new(LineLimit::Name),
        }
    }

    /// Buffers the bytes of one read; an empty read means the peer closed
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.assembler.feed(bytes)?;
        debug!(
            "Connection {} has {} byte(s) buffered",
            self.id,
            self.assembler.pending()
        );
        Ok(())
    }

    /// Next command from the buffered input, `None` until a line completes
    ///
    /// A non-empty name line moves the session to `Playing` straight away,
    /// so bytes pipelined behind the name are framed with the message bound.
    /// If the roster then refuses the name the caller closes the session.
    pub fn next_command(&mut self) -> Result<Option<Command>, SessionError> {
        if self.phase == Phase::Closed {
            return Ok(None);
        }
        let Some(line) = self.assembler.next_raw_line()? else {
            return Ok(None);
        };

        match self.phase {
            Phase::Naming => {
                let name =
                    String::from_utf8(line).map_err(|_| ProtocolViolation::NameNotUtf8)?;
                if name.is_empty() {
                    return Err(ProtocolViolation::EmptyName.into());
                }
                self.phase = Phase::Playing;
                self.assembler.set_limit(LineLimit::Message);
                debug!("Connection {} offered name {:?}", self.id, name);
                Ok(Some(Command::Name(name)))
            }
            Phase::Playing => {
                let pit = parse_pit(&String::from_utf8_lossy(&line));
                Ok(Some(Command::Move(pit)))
            }
            Phase::Closed => Ok(None),
        }
    }

    pub fn close(&mut self) {
        self.phase = Phase::Closed;
    }
}

/// Parses a decimal pit index, surrounding whitespace allowed
pub fn parse_pit(line: &str) -> Option<usize> {
    line.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_then_moves() {
        let mut session = Session::new(1);
        assert_eq!(session.phase, Phase::Naming);

        session.feed(b"alice\r\n3\r\n").unwrap();
        assert_eq!(
            session.next_command(),
            Ok(Some(Command::Name("alice".to_string())))
        );
        assert_eq!(session.phase, Phase::Playing);
        assert_eq!(session.next_command(), Ok(Some(Command::Move(Some(3)))));
        assert_eq!(session.next_command(), Ok(None));
    }

    #[test]
    fn test_empty_name_is_violation() {
        let mut session = Session::new(1);
        session.feed(b"\n").unwrap();

        assert_eq!(
            session.next_command(),
            Err(SessionError::Violation(ProtocolViolation::EmptyName))
        );
    }

    #[test]
    fn test_name_must_be_utf8() {
        let mut session = Session::new(1);
        session.feed(b"a\xffb\r\n").unwrap();

        assert_eq!(
            session.next_command(),
            Err(SessionError::Violation(ProtocolViolation::NameNotUtf8))
        );
        assert_eq!(session.phase, Phase::Naming);
    }

    #[test]
    fn test_non_utf8_move_is_unparseable() {
        let mut session = Session::new(1);
        session.feed(b"frank
\xff3
").unwrap();
        session.next_command().unwrap();

        assert_eq!(session.next_command(), Ok(Some(Command::Move(None))));
    }

    #[test]
    fn test_name_too_long() {
        let mut session = Session::new(1);
        session.feed(&[b'a'; 100]).unwrap();

        assert_eq!(
            session.next_command(),
            Err(SessionError::Violation(ProtocolViolation::NameTooLong))
        );
    }

    #[test]
    fn test_message_too_long_while_playing() {
        let mut session = Session::new(1);
        session.feed(b"bob\n").unwrap();
        session.next_command().unwrap();

        session.feed(&[b'1'; 200]).unwrap();
        assert_eq!(
            session.next_command(),
            Err(SessionError::Violation(ProtocolViolation::MessageTooLong))
        );
    }

    #[test]
    fn test_empty_read_is_peer_closed() {
        let mut session = Session::new(1);
        assert_eq!(session.feed(&[]), Err(SessionError::PeerClosed));

        session.feed(b"carol\n").unwrap();
        session.next_command().unwrap();
        assert_eq!(session.feed(&[]), Err(SessionError::PeerClosed));
    }

    #[test]
    fn test_unparseable_moves() {
        let mut session = Session::new(1);
        session.feed(b"dave\n\nabc\n-1\n 4 \n").unwrap();
        session.next_command().unwrap();

        assert_eq!(session.next_command(), Ok(Some(Command::Move(None))));
        assert_eq!(session.next_command(), Ok(Some(Command::Move(None))));
        assert_eq!(session.next_command(), Ok(Some(Command::Move(None))));
        assert_eq!(session.next_command(), Ok(Some(Command::Move(Some(4)))));
    }

    #[test]
    fn test_closed_session_is_inert() {
        let mut session = Session::new(5);
        session.feed(b"erin\n1\n").unwrap();
        session.close();

        assert_eq!(session.phase, Phase::Closed);
        assert_eq!(session.id, 5);
        assert_eq!(session.next_command(), Ok(None));
        assert_eq!(session.feed(&[]), Ok(()));
    }

    #[test]
    fn test_parse_pit() {
        assert_eq!(parse_pit("0"), Some(0));
        assert_eq!(parse_pit("5\t"), Some(5));
        assert_eq!(parse_pit("12"), Some(12));
        assert_eq!(parse_pit(""), None);
        assert_eq!(parse_pit("0x2"), None);
        assert_eq!(parse_pit("two"), None);
    }
}
