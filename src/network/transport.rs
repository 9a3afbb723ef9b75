//! Transport orchestration
//!
//! Owns the listener, the mailbox registry and the per-peer receivers. A single
//! supervisor task consumes everything the transport produces, turns handshake
//! results into established peers and forwards the resulting event stream to
//! the node in order.

use crate::config::TransportConfig;
use crate::network::admission::{Admission, SlotPermit};
use crate::network::codec::Codec;
use crate::network::dialer::dial;
use crate::network::error::NetworkError;
use crate::network::event::Event;
use crate::network::identity::NetworkIdentity;
use crate::network::listener::{Listener, ListenerOptions};
use crate::network::message::Message;
use crate::network::receiver::spawn_receiver;
use crate::network::sender::Sender;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// How long shutdown waits for a peer's queued messages to be written
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A running transport layer
pub struct Transport {
    identity: NetworkIdentity,
    sender: Arc<Sender>,
    admission: Admission,
    inbox: mpsc::Sender<Event>,
    handshake_timeout: Duration,
    listener: Listener,
    supervisor: JoinHandle<()>,
}

impl Transport {
    /// Start listening and return the transport with its event stream.
    pub async fn start(
        config: &TransportConfig,
        identity: NetworkIdentity,
        codec: Arc<dyn Codec>,
    ) -> Result<(Self, mpsc::Receiver<Event>), NetworkError> {
        let (inbox, inbox_rx) = mpsc::channel(config.event_buffer);
        let (upstream, events) = mpsc::channel(config.event_buffer);

        let sender = Arc::new(
            Sender::new(config.mailbox_capacity).with_policy(config.encode_failure, inbox.clone()),
        );
        let admission = Admission::new(config.max_inbound);
        let options = ListenerOptions {
            accept_poll: config.accept_poll(),
            handshake_timeout: config.handshake_timeout(),
        };

        let listener = Listener::start(
            &config.listen_address,
            identity.clone(),
            admission.clone(),
            inbox.clone(),
            options,
        )
        .await?;

        let supervisor = tokio::spawn(supervise(
            inbox_rx,
            upstream,
            sender.clone(),
            codec,
            inbox.clone(),
            admission.shutdown_token(),
        ));

        Ok((
            Self {
                identity,
                sender,
                admission,
                inbox,
                handshake_timeout: options.handshake_timeout,
                listener,
                supervisor,
            },
            events,
        ))
    }

    /// Dial a peer and register it once the handshake succeeds.
    pub async fn connect(&self, address: &str) -> Result<SocketAddr, NetworkError> {
        let dialed = dial(address, &self.identity, self.handshake_timeout).await?;
        let peer = dialed.address;

        self.inbox
            .send(Event::Connection {
                address: peer.to_string(),
                stream: dialed.stream,
                nonce: dialed.nonce,
                slot: None,
            })
            .await
            .map_err(|_| NetworkError::Shutdown)?;

        Ok(peer)
    }

    /// Queue a message for a peer without waiting
    pub fn send(&self, address: &str, message: Message) -> Result<(), NetworkError> {
        self.sender.send(address, message)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Admission slots, for callers that hand out more capacity
    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    /// Addresses of peers with an open mailbox
    pub fn peers(&self) -> Vec<String> {
        self.sender.addresses()
    }

    /// Signal the listener and supervisor to stop without waiting for them.
    /// The event stream ends once the supervisor has closed every peer.
    pub fn stop(&self) {
        self.admission.close();
        self.admission.shutdown();
    }

    /// Stop accepting, close every peer and wait for the tasks to end.
    pub async fn shutdown(self) {
        self.stop();
        self.listener.stopped().await;
        if let Err(e) = self.supervisor.await {
            log::error!("Transport supervisor failed: {}", e);
        }
        log::info!("Transport shut down");
    }
}

/// Tasks and resources of an established peer
struct Peer {
    slot: Option<SlotPermit>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Peer {
    /// Wait for the peer's tasks once its reader is cancelled and its mailbox closed.
    async fn finish(self, address: &str) {
        if let Err(e) = self.reader.await {
            log::error!("Receiver for {} failed: {}", address, e);
        }

        let mut writer = self.writer;
        if timeout(DRAIN_GRACE, &mut writer).await.is_err() {
            log::warn!("Output for {} did not drain in time", address);
            writer.abort();
        }
        drop(self.slot);
    }
}

async fn supervise(
    mut inbox: mpsc::Receiver<Event>,
    upstream: mpsc::Sender<Event>,
    sender: Arc<Sender>,
    codec: Arc<dyn Codec>,
    receivers: mpsc::Sender<Event>,
    shutdown: CancellationToken,
) {
    let mut peers: HashMap<String, Peer> = HashMap::new();

    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = inbox.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let forward = match event {
            Event::Connection {
                address,
                stream,
                nonce,
                slot,
            } => match establish(&sender, &codec, &receivers, &shutdown, &address, stream, slot) {
                Ok(peer) => {
                    log::info!("Peer {} established (nonce {})", address, hex::encode(&nonce));
                    peers.insert(address.clone(), peer);
                    Event::connected(address)
                }
                Err(e) => {
                    log::warn!("Could not register peer {}: {}", address, e);
                    continue;
                }
            },
            Event::Disconnected { address, timestamp } => {
                if sender.remove_output(&address).is_err() {
                    log::debug!("Output for {} already removed", address);
                }
                peers.remove(&address);
                Event::Disconnected { address, timestamp }
            }
            Event::Failure { address } => {
                // the receiver reports Disconnected once it has stopped
                if let Some(peer) = peers.get(&address) {
                    peer.cancel.cancel();
                    if sender.remove_output(&address).is_ok() {
                        log::info!("Closed output for failed peer {}", address);
                    }
                }
                Event::Failure { address }
            }
            other => other,
        };

        if upstream.send(forward).await.is_err() {
            log::warn!("Event receiver dropped, stopping transport");
            break;
        }
    }

    // receivers see a closed channel from here on
    inbox.close();
    for (address, peer) in peers.drain() {
        peer.cancel.cancel();
        let _ = sender.remove_output(&address);
        peer.finish(&address).await;
    }
}

fn establish(
    sender: &Sender,
    codec: &Arc<dyn Codec>,
    receivers: &mpsc::Sender<Event>,
    shutdown: &CancellationToken,
    address: &str,
    stream: TcpStream,
    slot: Option<SlotPermit>,
) -> Result<Peer, NetworkError> {
    let (reader, writer) = stream.into_split();
    let writer = sender.add_output(address, codec.clone(), writer)?;

    let cancel = shutdown.child_token();
    let reader = spawn_receiver(
        address.to_string(),
        codec.clone(),
        reader,
        receivers.clone(),
        cancel.clone(),
    );

    Ok(Peer {
        slot,
        cancel,
        reader,
        writer,
    })
}
