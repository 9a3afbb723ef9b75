//! Outbound connections
//!
//! Dialing runs the same handshake as the listener from the other side. There
//! is no retry here; whoever supplies addresses decides whether to try again.

use crate::network::error::NetworkError;
use crate::network::handshake;
use crate::network::identity::NetworkIdentity;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// A dialed peer that passed the handshake
#[derive(Debug)]
pub struct Dialed {
    pub address: SocketAddr,
    pub stream: TcpStream,
    pub nonce: Vec<u8>,
}

/// Connect to a peer
pub async fn dial(
    address: &str,
    identity: &NetworkIdentity,
    handshake_timeout: Duration,
) -> Result<Dialed, NetworkError> {
    let mut stream = TcpStream::connect(address).await?;
    let peer_addr = stream.peer_addr()?;

    let nonce = handshake::with_deadline(
        handshake_timeout,
        handshake::initiate(&mut stream, identity),
    )
    .await
    .map_err(|e| {
        log::warn!("Handshake with {} failed: {}", peer_addr, e);
        NetworkError::from(e)
    })?;

    log::info!("Connected to peer {}", peer_addr);
    Ok(Dialed {
        address: peer_addr,
        stream,
        nonce,
    })
}
