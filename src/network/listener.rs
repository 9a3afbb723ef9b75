//! Inbound connection listener
//!
//! Accepts sockets on one address and drives each through the handshake before
//! accepting the next, so at most one handshake is in flight per listener. The
//! outcome of every admitted connection is reported as exactly one event:
//! `Connection`, `Failure` or `Violation`. Connections turned away for lack of
//! a slot produce no event.

use crate::network::admission::{Admission, Admit};
use crate::network::error::NetworkError;
use crate::network::event::Event;
use crate::network::handshake::{self, HANDSHAKE_TIMEOUT};
use crate::network::identity::NetworkIdentity;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// How long a single accept waits before the loop checks for shutdown again
pub const ACCEPT_POLL: Duration = Duration::from_millis(500);

/// Listener timing knobs
#[derive(Debug, Clone, Copy)]
pub struct ListenerOptions {
    pub accept_poll: Duration,
    pub handshake_timeout: Duration,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            accept_poll: ACCEPT_POLL,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }
}

/// A running listener
pub struct Listener {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl Listener {
    /// Bind `address` and start accepting. Fails without starting when the
    /// address is malformed or cannot be bound.
    pub async fn start(
        address: &str,
        identity: NetworkIdentity,
        admission: Admission,
        events: mpsc::Sender<Event>,
        options: ListenerOptions,
    ) -> Result<Self, NetworkError> {
        if let Err(e) = split_host_port(address) {
            log::error!("Invalid listen address {}", address);
            return Err(e);
        }

        let listener = match TcpListener::bind(address).await {
            Ok(listener) => listener,
            Err(source) => {
                log::error!("Could not create listener on {}: {}", address, source);
                return Err(NetworkError::BindFailure {
                    address: address.to_string(),
                    source,
                });
            }
        };
        let local_addr = listener.local_addr()?;
        log::info!("Listening for peers on {}", local_addr);

        let task = tokio::spawn(accept_loop(listener, identity, admission, events, options));

        Ok(Self { local_addr, task })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the accept loop has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the loop has ended and the listening socket is closed.
    pub async fn stopped(self) {
        if let Err(e) = self.task.await {
            log::error!("Listener task on {} failed: {}", self.local_addr, e);
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    identity: NetworkIdentity,
    admission: Admission,
    events: mpsc::Sender<Event>,
    options: ListenerOptions,
) {
    let local_addr = listener.local_addr().ok();
    let shutdown = admission.shutdown_token();

    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = timeout(options.accept_poll, listener.accept()) => accepted,
        };

        let (mut stream, remote) = match accepted {
            Err(_) => continue,
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                log::error!("Could not accept connection: {}", e);
                break;
            }
        };
        let address = remote.to_string();

        let slot = match admission.try_admit() {
            Admit::Slot(slot) => slot,
            Admit::Full => {
                log::info!("No available connection slots for {}", address);
                drop(stream);
                continue;
            }
            Admit::Closed => {
                drop(stream);
                break;
            }
        };

        let result = handshake::with_deadline(
            options.handshake_timeout,
            handshake::respond(&mut stream, &identity),
        )
        .await;

        let event = match result {
            Ok(nonce) => {
                log::debug!("Handshake with {} complete", address);
                Event::Connection {
                    address,
                    stream,
                    nonce,
                    slot: Some(slot),
                }
            }
            Err(err) => {
                if err.is_violation() {
                    log::warn!("Dropping peer {}: {}", address, err);
                } else {
                    log::error!("Handshake with {} failed: {}", address, err);
                }
                drop(stream);
                err.into_event(address)
            }
        };

        if events.send(event).await.is_err() {
            log::warn!("Event receiver dropped, stopping listener");
            break;
        }
    }

    drop(listener);
    if let Some(addr) = local_addr {
        log::info!("Listener on {} stopped", addr);
    }
}

/// Check that `address` has the form `host:port`
pub fn split_host_port(address: &str) -> Result<(&str, u16), NetworkError> {
    let invalid = || NetworkError::InvalidAddress(address.to_string());

    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    let host = match host.strip_prefix('[') {
        Some(inner) => inner.strip_suffix(']').ok_or_else(invalid)?,
        None if host.contains(':') => return Err(invalid()),
        None => host,
    };
    let port = port.parse::<u16>().map_err(|_| invalid())?;

    Ok((host, port))
}
