//! Network-identity handshake
//!
//! Both directions exchange a packet of the same shape, `magic || nonce`, with
//! no length prefix. The inbound side reads the syn before answering; the
//! outbound side writes first and then checks the ack. A packet from another
//! network or carrying our own nonce ends the handshake as a violation.

use crate::network::error::HandshakeError;
use crate::network::identity::NetworkIdentity;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Default bound on a whole handshake
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Answer an inbound handshake. Returns the peer's nonce.
pub async fn respond<S>(stream: &mut S, identity: &NetworkIdentity) -> Result<Vec<u8>, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut syn = vec![0u8; identity.packet_len()];
    stream
        .read_exact(&mut syn)
        .await
        .map_err(HandshakeError::Read)?;

    let nonce = verify(identity, &syn)?;

    stream
        .write_all(&identity.packet())
        .await
        .map_err(HandshakeError::Write)?;
    stream.flush().await.map_err(HandshakeError::Write)?;

    Ok(nonce)
}

/// Open an outbound handshake. Returns the peer's nonce.
pub async fn initiate<S>(stream: &mut S, identity: &NetworkIdentity) -> Result<Vec<u8>, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(&identity.packet())
        .await
        .map_err(HandshakeError::Write)?;
    stream.flush().await.map_err(HandshakeError::Write)?;

    let mut ack = vec![0u8; identity.packet_len()];
    stream
        .read_exact(&mut ack)
        .await
        .map_err(HandshakeError::Read)?;

    verify(identity, &ack)
}

/// Run a handshake step under a deadline
pub async fn with_deadline<F>(limit: Duration, handshake: F) -> Result<Vec<u8>, HandshakeError>
where
    F: std::future::Future<Output = Result<Vec<u8>, HandshakeError>>,
{
    match timeout(limit, handshake).await {
        Ok(result) => result,
        Err(_) => Err(HandshakeError::Timeout),
    }
}

/// Check a received packet against our identity and return the peer nonce.
pub fn verify(identity: &NetworkIdentity, packet: &[u8]) -> Result<Vec<u8>, HandshakeError> {
    let (network, nonce) = identity.split(packet);
    if network != identity.magic() {
        return Err(HandshakeError::NetworkMismatch {
            claimed: hex::encode(network),
        });
    }
    if nonce == identity.nonce() {
        return Err(HandshakeError::SelfConnection);
    }
    Ok(nonce.to_vec())
}
