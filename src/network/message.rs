//! Network message types for P2P communication
//!
//! Defines the application messages carried over an established connection.
//! The transport never looks inside them; they only pass through the codec.

use serde::{Deserialize, Serialize};

/// Network message types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Keep-alive ping
    Ping(u64),

    /// Keep-alive pong response
    Pong(u64),

    /// Our distance from the root of the best known header path
    Status { distance: u64 },

    /// Ask a peer for the addresses it knows
    Discover,

    /// Response with peer addresses
    Peers(Vec<String>),

    /// Announce which transactions make up a block
    Inventory { hash: String, transactions: Vec<String> },

    /// Request entities by hash
    Request { hashes: Vec<String> },

    /// Request a batch of transactions by hash
    Batch { hashes: Vec<String> },
}

impl Message {
    /// Get message type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Ping(_) => "Ping",
            Message::Pong(_) => "Pong",
            Message::Status { .. } => "Status",
            Message::Discover => "Discover",
            Message::Peers(_) => "Peers",
            Message::Inventory { .. } => "Inventory",
            Message::Request { .. } => "Request",
            Message::Batch { .. } => "Batch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization() {
        let msg = Message::Inventory {
            hash: "abc123".to_string(),
            transactions: vec!["tx1".to_string(), "tx2".to_string()],
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: Message = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Message::Status { distance: 3 }.type_name(), "Status");
        assert_eq!(Message::Discover.type_name(), "Discover");
    }
}
