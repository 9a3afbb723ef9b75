//! Per-peer output mailboxes
//!
//! Every established peer gets one bounded queue and one draining task that
//! owns the write side of its socket. `send` never waits: a full queue is
//! reported back to the caller, who decides whether to retry, drop the message
//! or disconnect the peer.
//!
//! The registry is a concurrent map; `add_output` and `remove_output` are
//! atomic check-then-act through the map's entry API, and `send` to one peer
//! is not held up by registration of another.

use crate::network::codec::Codec;
use crate::network::compression::CompressedWriter;
use crate::network::error::NetworkError;
use crate::network::event::Event;
use crate::network::message::Message;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Default mailbox capacity
pub const MAILBOX_CAPACITY: usize = 16;

/// What a draining task does when a message cannot be encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeFailurePolicy {
    /// Log, drop the message and keep the connection
    #[default]
    Tolerate,
    /// Stop draining and report a `Failure` for the peer
    Disconnect,
}

/// Manages all the output mailboxes used to send messages to peers
pub struct Sender {
    outputs: DashMap<String, mpsc::Sender<Message>>,
    capacity: usize,
    policy: EncodeFailurePolicy,
    failures: Option<mpsc::Sender<Event>>,
}

impl Sender {
    pub fn new(capacity: usize) -> Self {
        Self {
            outputs: DashMap::new(),
            capacity: capacity.max(1),
            policy: EncodeFailurePolicy::Tolerate,
            failures: None,
        }
    }

    /// Choose the encode failure policy. `failures` receives a `Failure`
    /// event whenever a draining task gives up on its peer.
    pub fn with_policy(mut self, policy: EncodeFailurePolicy, failures: mpsc::Sender<Event>) -> Self {
        self.policy = policy;
        self.failures = Some(failures);
        self
    }

    /// Register a mailbox for `address` and start its draining task.
    pub fn add_output<W>(
        &self,
        address: &str,
        codec: Arc<dyn Codec>,
        socket: W,
    ) -> Result<JoinHandle<()>, NetworkError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mailbox = match self.outputs.entry(address.to_string()) {
            Entry::Occupied(_) => return Err(NetworkError::AlreadyExists(address.to_string())),
            Entry::Vacant(slot) => {
                let (tx, rx) = mpsc::channel(self.capacity);
                slot.insert(tx);
                rx
            }
        };

        log::debug!("Added output for {}", address);
        Ok(tokio::spawn(drain(
            address.to_string(),
            mailbox,
            codec,
            socket,
            self.policy,
            self.failures.clone(),
        )))
    }

    /// Close the mailbox for `address`. Messages already queued are still
    /// delivered before the draining task ends.
    pub fn remove_output(&self, address: &str) -> Result<(), NetworkError> {
        match self.outputs.remove(address) {
            Some(_) => {
                log::debug!("Removed output for {}", address);
                Ok(())
            }
            None => Err(NetworkError::NotFound(address.to_string())),
        }
    }

    /// Try to queue `message` for the peer at `address` without waiting.
    pub fn send(&self, address: &str, message: Message) -> Result<(), NetworkError> {
        let output = self
            .outputs
            .get(address)
            .ok_or_else(|| NetworkError::NotFound(address.to_string()))?;

        output.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => NetworkError::QueueFull(address.to_string()),
            TrySendError::Closed(_) => NetworkError::MailboxClosed(address.to_string()),
        })
    }

    pub fn contains(&self, address: &str) -> bool {
        self.outputs.contains_key(address)
    }

    /// Addresses with a registered mailbox
    pub fn addresses(&self) -> Vec<String> {
        self.outputs.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl Default for Sender {
    fn default() -> Self {
        Self::new(MAILBOX_CAPACITY)
    }
}

async fn drain<W>(
    address: String,
    mut mailbox: mpsc::Receiver<Message>,
    codec: Arc<dyn Codec>,
    socket: W,
    policy: EncodeFailurePolicy,
    failures: Option<mpsc::Sender<Event>>,
) where
    W: AsyncWrite + Unpin,
{
    let mut writer = CompressedWriter::new(socket);

    while let Some(msg) = mailbox.recv().await {
        let encoded = codec.encode(writer.staging(), &msg);
        if let Err(e) = encoded {
            log::error!("Could not write {} to {}: {}", msg.type_name(), address, e);
            match policy {
                EncodeFailurePolicy::Tolerate => continue,
                EncodeFailurePolicy::Disconnect => {
                    report_failure(&failures, &address).await;
                    return;
                }
            }
        }

        if let Err(e) = writer.flush_frame().await {
            log::warn!("Could not deliver to {}: {}", address, e);
            report_failure(&failures, &address).await;
            return;
        }
    }

    log::debug!("Output for {} drained", address);
}

async fn report_failure(failures: &Option<mpsc::Sender<Event>>, address: &str) {
    if let Some(failures) = failures {
        let _ = failures
            .send(Event::Failure {
                address: address.to_string(),
            })
            .await;
    }
}
