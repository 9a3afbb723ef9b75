//! Transport configuration
//!
//! Loaded from a JSON file; every field has a default so a partial file works.

use crate::network::identity::{NetworkIdentity, DEFAULT_NETWORK};
use crate::network::listener::split_host_port;
use crate::network::sender::{EncodeFailurePolicy, MAILBOX_CAPACITY};
use crate::network::MAX_FRAME_SIZE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid hex in {field}: {source}")]
    InvalidHex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Address to accept peers on (host:port)
    pub listen_address: String,
    /// Network magic bytes, hex encoded
    pub network: String,
    /// Node nonce, hex encoded; random when absent
    pub nonce: Option<String>,
    /// Outbound queue size per peer
    pub mailbox_capacity: usize,
    /// Inbound connection slots
    pub max_inbound: usize,
    pub accept_poll_ms: u64,
    pub handshake_timeout_ms: u64,
    pub encode_failure: EncodeFailurePolicy,
    pub max_frame_size: usize,
    /// Capacity of the transport event channels
    pub event_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8333".to_string(),
            network: hex::encode(DEFAULT_NETWORK),
            nonce: None,
            mailbox_capacity: MAILBOX_CAPACITY,
            max_inbound: 8,
            accept_poll_ms: 500,
            handshake_timeout_ms: 5000,
            encode_failure: EncodeFailurePolicy::Tolerate,
            max_frame_size: MAX_FRAME_SIZE,
            event_buffer: 1000,
        }
    }
}

impl TransportConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = fs::File::open(path)?;
        let config: TransportConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if split_host_port(&self.listen_address).is_err() {
            return Err(ConfigError::Invalid(format!(
                "listen address {} is not host:port",
                self.listen_address
            )));
        }
        if self.magic()?.is_empty() {
            return Err(ConfigError::Invalid("network magic is empty".to_string()));
        }
        if let Some(nonce) = self.nonce()? {
            if nonce.is_empty() {
                return Err(ConfigError::Invalid("nonce is empty".to_string()));
            }
        }
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid("mailbox capacity must be positive".to_string()));
        }
        if self.max_inbound == 0 {
            return Err(ConfigError::Invalid("max inbound must be positive".to_string()));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid("event buffer must be positive".to_string()));
        }
        Ok(())
    }

    pub fn magic(&self) -> Result<Vec<u8>, ConfigError> {
        hex::decode(&self.network).map_err(|source| ConfigError::InvalidHex {
            field: "network",
            source,
        })
    }

    pub fn nonce(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        self.nonce
            .as_deref()
            .map(hex::decode)
            .transpose()
            .map_err(|source| ConfigError::InvalidHex {
                field: "nonce",
                source,
            })
    }

    /// Identity for this process
    pub fn identity(&self) -> Result<NetworkIdentity, ConfigError> {
        let magic = self.magic()?;
        Ok(match self.nonce()? {
            Some(nonce) => NetworkIdentity::new(magic, nonce),
            None => NetworkIdentity::random(magic),
        })
    }

    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
