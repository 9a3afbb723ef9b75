//! Node-side consumers of the transport
//!
//! The event handler and the collaborator seams it talks to.

pub mod handler;
pub mod memory;

pub use handler::{EventHandler, Headers, MessageProcessor, Network, Peers};
pub use memory::{GenesisHeaders, LogProcessor, PeerBook};
