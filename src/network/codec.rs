//! Message codec
//!
//! The transport hands whole messages to a `Codec` and never interprets the
//! payload itself. Every frame starts with a big-endian `u32` length; inbound
//! bytes are split on that prefix by `FrameDecoder` and each complete frame is
//! decoded exactly once. `JsonCodec` fills the frame with JSON.

use crate::network::error::CodecError;
use crate::network::message::Message;
use bytes::{BufMut, BytesMut};
use std::io::{self, Read, Write};
use std::sync::Arc;
use tokio_util::codec::Decoder;

/// Length prefix of every frame
const HEADER_LEN: usize = 4;

/// Default upper bound for a single frame
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Encodes messages onto a stream and decodes them back
pub trait Codec: Send + Sync {
    /// Write one message. Implementations should write the whole frame in a
    /// single call so a failed encode leaves nothing on the stream.
    fn encode(&self, writer: &mut dyn Write, message: &Message) -> Result<(), CodecError>;

    /// Read one frame, length prefix included.
    fn decode(&self, reader: &mut dyn Read) -> Result<Message, CodecError>;

    /// Largest payload a frame may announce
    fn max_frame_size(&self) -> usize {
        MAX_FRAME_SIZE
    }
}

/// Length-prefixed JSON framing
#[derive(Debug, Clone)]
pub struct JsonCodec {
    max_frame_size: usize,
}

impl JsonCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Codec for JsonCodec {
    fn encode(&self, writer: &mut dyn Write, message: &Message) -> Result<(), CodecError> {
        let data = serde_json::to_vec(message)?;
        if data.len() > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                size: data.len(),
                max: self.max_frame_size,
            });
        }

        // Length (4) + Data
        let mut frame = BytesMut::with_capacity(4 + data.len());
        frame.put_u32(data.len() as u32);
        frame.put_slice(&data);
        writer.write_all(&frame)?;

        Ok(())
    }

    fn decode(&self, reader: &mut dyn Read) -> Result<Message, CodecError> {
        let mut header = [0u8; 4];
        reader.read_exact(&mut header)?;

        let len = u32::from_be_bytes(header) as usize;
        if len > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;

        Ok(serde_json::from_slice(&data)?)
    }

    fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

/// Splits an inbound byte stream into frames for a `Codec`
pub struct FrameDecoder {
    codec: Arc<dyn Codec>,
}

impl FrameDecoder {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }
}

impl Decoder for FrameDecoder {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Need at least header
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        let max = self.codec.max_frame_size();
        if len > max {
            return Err(CodecError::FrameTooLarge { size: len, max });
        }

        // Check if we have the full frame
        let total = HEADER_LEN + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total);
        let mut data: &[u8] = &frame;
        self.codec.decode(&mut data).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            // the peer hung up inside a frame
            None => Err(CodecError::Io(io::ErrorKind::UnexpectedEof.into())),
        }
    }
}
