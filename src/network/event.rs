//! Transport events
//!
//! Notifications flowing from the transport layer up to the node. Events are
//! plain values; they hold no reference back into the transport.

use crate::network::admission::SlotPermit;
use crate::network::message::Message;
use chrono::{DateTime, Utc};
use tokio::net::TcpStream;

/// Event emitted by the transport layer
#[derive(Debug)]
pub enum Event {
    /// A peer finished its handshake and has a mailbox
    Connected {
        address: String,
        timestamp: DateTime<Utc>,
    },

    /// An established peer went away
    Disconnected {
        address: String,
        timestamp: DateTime<Utc>,
    },

    /// A peer delivered a message
    Received {
        address: String,
        timestamp: DateTime<Utc>,
        message: Message,
    },

    /// Handshake succeeded; ownership of the socket moves with the event.
    /// `slot` is the admission slot held by inbound peers.
    Connection {
        address: String,
        stream: TcpStream,
        nonce: Vec<u8>,
        slot: Option<SlotPermit>,
    },

    /// I/O error while talking to the peer
    Failure { address: String },

    /// Peer is on another network or is ourselves
    Violation { address: String },
}

impl Event {
    /// Address of the peer the event is about
    pub fn address(&self) -> &str {
        match self {
            Event::Connected { address, .. }
            | Event::Disconnected { address, .. }
            | Event::Received { address, .. }
            | Event::Connection { address, .. }
            | Event::Failure { address }
            | Event::Violation { address } => address,
        }
    }

    /// Get event type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::Connected { .. } => "Connected",
            Event::Disconnected { .. } => "Disconnected",
            Event::Received { .. } => "Received",
            Event::Connection { .. } => "Connection",
            Event::Failure { .. } => "Failure",
            Event::Violation { .. } => "Violation",
        }
    }

    pub fn connected(address: impl Into<String>) -> Self {
        Event::Connected {
            address: address.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn disconnected(address: impl Into<String>) -> Self {
        Event::Disconnected {
            address: address.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn received(address: impl Into<String>, message: Message) -> Self {
        Event::Received {
            address: address.into(),
            timestamp: Utc::now(),
            message,
        }
    }
}
