//! In-memory collaborators
//!
//! Minimal stand-ins for the chain store, peer registry and message processing
//! so the transport can run on its own.

use crate::network::Message;
use crate::node::handler::{Headers, MessageProcessor, Peers};
use dashmap::DashSet;

/// Tracks which peer addresses are currently active
#[derive(Debug, Default)]
pub struct PeerBook {
    active: DashSet<String>,
}

impl PeerBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, address: &str) -> bool {
        self.active.contains(address)
    }

    /// Active addresses, sorted
    pub fn actives(&self) -> Vec<String> {
        let mut actives: Vec<String> = self.active.iter().map(|a| a.key().clone()).collect();
        actives.sort();
        actives
    }
}

impl Peers for PeerBook {
    fn active(&self, address: &str) {
        if self.active.insert(address.to_string()) {
            log::info!("Peer {} active", address);
        }
    }

    fn inactive(&self, address: &str) {
        if self.active.remove(address).is_some() {
            log::info!("Peer {} inactive", address);
        }
    }
}

/// Header store holding only the root
#[derive(Debug, Clone)]
pub struct GenesisHeaders {
    root: String,
}

impl GenesisHeaders {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for GenesisHeaders {
    fn default() -> Self {
        Self::new("0".repeat(64))
    }
}

impl Headers for GenesisHeaders {
    fn path(&self) -> (Vec<String>, u64) {
        (vec![self.root.clone()], 0)
    }
}

/// Logs every received message
#[derive(Debug, Default)]
pub struct LogProcessor;

impl MessageProcessor for LogProcessor {
    fn process(&self, address: &str, message: Message) {
        log::info!("Received {} from {}: {:?}", message.type_name(), address, message);
    }
}
