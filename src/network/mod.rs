//! P2P transport module
//!
//! Accepts and dials peer connections and manages outbound delivery.
//!
//! # Features
//! - Network-identity handshake with self-connection detection
//! - Non-blocking admission control for inbound peers
//! - Per-peer bounded mailboxes with fail-fast backpressure
//! - Deflate-compressed streams with pluggable message codecs
//! - Ordered event stream for the node

pub mod admission;
pub mod codec;
pub mod compression;
pub mod dialer;
pub mod error;
pub mod event;
pub mod handshake;
pub mod identity;
pub mod listener;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod transport;

pub use admission::{Admission, Admit, SlotPermit};
pub use codec::{Codec, FrameDecoder, JsonCodec, MAX_FRAME_SIZE};
pub use compression::{message_reader, MessageReader};
pub use dialer::{dial, Dialed};
pub use error::{CodecError, HandshakeError, NetworkError};
pub use event::Event;
pub use identity::{NetworkIdentity, DEFAULT_NETWORK, NONCE_LEN};
pub use listener::{Listener, ListenerOptions};
pub use message::Message;
pub use sender::{EncodeFailurePolicy, Sender, MAILBOX_CAPACITY};
pub use transport::Transport;
