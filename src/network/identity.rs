//! Network identity used during the handshake
//!
//! Magic bytes name the logical network; the nonce names this node instance so
//! a dial that loops back to ourselves can be detected.

use rand::RngCore;
use std::fmt;

/// Magic bytes of the default network ("MINI")
pub const DEFAULT_NETWORK: [u8; 4] = [0x4D, 0x49, 0x4E, 0x49];

/// Length of a randomly generated node nonce
pub const NONCE_LEN: usize = 16;

/// Immutable identity of this node on its network
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    magic: Vec<u8>,
    nonce: Vec<u8>,
}

impl NetworkIdentity {
    pub fn new(magic: Vec<u8>, nonce: Vec<u8>) -> Self {
        Self { magic, nonce }
    }

    /// Identity on the given network with a fresh random nonce
    pub fn random(magic: Vec<u8>) -> Self {
        let mut nonce = vec![0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self { magic, nonce }
    }

    pub fn magic(&self) -> &[u8] {
        &self.magic
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// Size of a syn or ack packet
    pub fn packet_len(&self) -> usize {
        self.magic.len() + self.nonce.len()
    }

    /// Our syn/ack packet: magic bytes followed by our nonce
    pub fn packet(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(self.packet_len());
        packet.extend_from_slice(&self.magic);
        packet.extend_from_slice(&self.nonce);
        packet
    }

    /// Split a received packet into claimed network and nonce
    pub fn split<'a>(&self, packet: &'a [u8]) -> (&'a [u8], &'a [u8]) {
        packet.split_at(self.magic.len().min(packet.len()))
    }
}

impl Default for NetworkIdentity {
    fn default() -> Self {
        Self::random(DEFAULT_NETWORK.to_vec())
    }
}

impl fmt::Debug for NetworkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkIdentity")
            .field("magic", &hex::encode(&self.magic))
            .field("nonce", &hex::encode(&self.nonce))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_layout() {
        let identity = NetworkIdentity::new(vec![1, 2, 3, 4], vec![9, 8]);
        assert_eq!(identity.packet_len(), 6);
        assert_eq!(identity.packet(), vec![1, 2, 3, 4, 9, 8]);

        let (network, nonce) = identity.split(&[1, 2, 3, 4, 7, 7]);
        assert_eq!(network, &[1, 2, 3, 4]);
        assert_eq!(nonce, &[7, 7]);
    }

    #[test]
    fn test_random_nonce() {
        let a = NetworkIdentity::random(DEFAULT_NETWORK.to_vec());
        let b = NetworkIdentity::random(DEFAULT_NETWORK.to_vec());
        assert_eq!(a.nonce().len(), NONCE_LEN);
        assert_eq!(a.magic(), b.magic());
        assert_ne!(a.nonce(), b.nonce());
    }
}
