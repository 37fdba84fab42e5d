//! Error taxonomy of the server
//!
//! Everything except [`ServerError`] is recovered locally: it affects one
//! connection or one move and never stops the server.

use crate::roster::ConnectionId;
use shared::LineError;
use std::io;

/// Input that gets the offending connection rejected and closed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("empty name")]
    EmptyName,
    #[error("name is too long")]
    NameTooLong,
    #[error("name is not valid UTF-8")]
    NameNotUtf8,
    #[error("message is too long")]
    MessageTooLong,
    #[error("name {0:?} is already taken")]
    DuplicateName(String),
}

/// Reasons a session stops producing commands
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("peer closed the connection")]
    PeerClosed,
    #[error("protocol violation: {0}")]
    Violation(#[from] ProtocolViolation),
}

impl From<LineError> for SessionError {
    fn from(error: LineError) -> Self {
        match error {
            LineError::PeerClosed => SessionError::PeerClosed,
            LineError::NameTooLong => ProtocolViolation::NameTooLong.into(),
            LineError::MessageTooLong => ProtocolViolation::MessageTooLong.into(),
        }
    }
}

/// Transport faults: the multiplexing substrate itself is broken
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
    #[error("failed to write to connection {id}: {source}")]
    Write {
        id: ConnectionId,
        #[source]
        source: io::Error,
    },
}

/// Write failures that only mean the peer has already gone away
pub fn is_peer_gone(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_errors_map_onto_taxonomy() {
        assert_eq!(
            SessionError::from(LineError::PeerClosed),
            SessionError::PeerClosed
        );
        assert_eq!(
            SessionError::from(LineError::NameTooLong),
            SessionError::Violation(ProtocolViolation::NameTooLong)
        );
        assert_eq!(
            SessionError::from(LineError::MessageTooLong),
            SessionError::Violation(ProtocolViolation::MessageTooLong)
        );
    }

    #[test]
    fn test_peer_gone_classification() {
        assert!(is_peer_gone(&io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(is_peer_gone(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(!is_peer_gone(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!is_peer_gone(&io::Error::from(io::ErrorKind::OutOfMemory)));
    }

    #[test]
    fn test_error_messages() {
        let violation = ProtocolViolation::DuplicateName("alice".to_string());
        assert_eq!(violation.to_string(), "name \"alice\" is already taken");

        let fault = ServerError::Write {
            id: 3,
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(fault.to_string().starts_with("failed to write to connection 3"));
    }
}
