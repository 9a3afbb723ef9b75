//! Transport error types
//!
//! `NetworkError` is what callers of the transport layer see. `HandshakeError`
//! and `CodecError` classify failures inside the handshake and the codec and
//! are converted into events or log lines before they reach a caller.

use crate::network::event::Event;
use std::io;
use thiserror::Error;

/// Errors returned by the transport layer
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Output already exists: {0}")]
    AlreadyExists(String),
    #[error("Output not found: {0}")]
    NotFound(String),
    #[error("Output closed: {0}")]
    MailboxClosed(String),
    #[error("Output queue full: {0}")]
    QueueFull(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("Invalid listen address {0}")]
    InvalidAddress(String),
    #[error("Could not bind {address}: {source}")]
    BindFailure {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Transport is shut down")]
    Shutdown,
}

/// Ways a handshake can end without an established connection
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("could not read syn packet: {0}")]
    Read(#[source] io::Error),
    #[error("could not write ack packet: {0}")]
    Write(#[source] io::Error),
    #[error("handshake timed out")]
    Timeout,
    #[error("invalid network {claimed}")]
    NetworkMismatch { claimed: String },
    #[error("connection to self")]
    SelfConnection,
}

impl HandshakeError {
    /// Whether the peer broke protocol, as opposed to the exchange failing.
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            HandshakeError::NetworkMismatch { .. } | HandshakeError::SelfConnection
        )
    }

    /// The terminal event reported for a peer whose handshake ended with this error.
    pub fn into_event(self, address: String) -> Event {
        if self.is_violation() {
            Event::Violation { address }
        } else {
            Event::Failure { address }
        }
    }
}

impl From<HandshakeError> for NetworkError {
    fn from(err: HandshakeError) -> Self {
        match err {
            HandshakeError::Read(e) | HandshakeError::Write(e) => NetworkError::Io(e),
            HandshakeError::Timeout => {
                NetworkError::Io(io::Error::new(io::ErrorKind::TimedOut, "handshake timed out"))
            }
            other => NetworkError::ProtocolViolation(other.to_string()),
        }
    }
}

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },
}

impl CodecError {
    /// True when the underlying stream ended, which is how a peer hangs up.
    pub fn is_eof(&self) -> bool {
        matches!(self, CodecError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_classification() {
        let mismatch = HandshakeError::NetworkMismatch {
            claimed: "09090909".to_string(),
        };
        assert!(mismatch.is_violation());
        assert!(HandshakeError::SelfConnection.is_violation());
        assert!(!HandshakeError::Timeout.is_violation());

        match HandshakeError::SelfConnection.into_event("10.0.0.1:1".to_string()) {
            Event::Violation { address } => assert_eq!(address, "10.0.0.1:1"),
            other => panic!("unexpected event {:?}", other),
        }
        let read = HandshakeError::Read(io::Error::from(io::ErrorKind::ConnectionReset));
        match read.into_event("10.0.0.1:1".to_string()) {
            Event::Failure { address } => assert_eq!(address, "10.0.0.1:1"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_codec_eof() {
        let eof = CodecError::Io(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(eof.is_eof());
        let large = CodecError::FrameTooLarge { size: 10, max: 5 };
        assert!(!large.is_eof());
    }
}
