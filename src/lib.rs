//! Mini-P2P: the peer-to-peer transport layer of a blockchain node
//!
//! This crate provides:
//! - A listener that admits only peers of the same network and rejects
//!   connections to itself
//! - Outbound dialing with the same handshake
//! - One bounded output mailbox per peer, drained by its own task
//! - An ordered stream of transport events and a handler that turns them into
//!   peer liveness updates and status exchange
//!
//! # Example
//!
//! ```no_run
//! use mini_p2p::config::TransportConfig;
//! use mini_p2p::network::{JsonCodec, Transport};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TransportConfig::default();
//! let identity = config.identity()?;
//! let (transport, mut events) =
//!     Transport::start(&config, identity, Arc::new(JsonCodec::default())).await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{} from {}", event.type_name(), event.address());
//! }
//! transport.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod network;
pub mod node;

// Re-export commonly used types
pub use config::{ConfigError, TransportConfig};
pub use network::{
    Admission, Codec, EncodeFailurePolicy, Event, JsonCodec, Listener, Message, NetworkError,
    NetworkIdentity, Sender, Transport,
};
pub use node::{EventHandler, GenesisHeaders, LogProcessor, PeerBook};
