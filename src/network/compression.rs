//! Per-connection stream compression
//!
//! After the handshake every byte on a socket belongs to one continuous deflate
//! stream per direction. The writer sync-flushes after each message so the
//! remote side can decode it without waiting for more input. The reader side
//! is an `AsyncRead` that inflates whatever arrives, framed by `FrameDecoder`.

use crate::network::codec::{Codec, FrameDecoder};
use bytes::{Buf, BytesMut};
use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::{self, Write};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_util::codec::FramedRead;

/// Bytes read from the socket per attempt
const READ_CHUNK: usize = 8 * 1024;

/// Compressing writer over the write side of a peer socket
pub struct CompressedWriter<W> {
    inner: W,
    encoder: DeflateEncoder<Vec<u8>>,
}

impl<W: AsyncWrite + Unpin> CompressedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            encoder: DeflateEncoder::new(Vec::new(), Compression::default()),
        }
    }

    /// Synchronous sink the codec encodes into
    pub fn staging(&mut self) -> &mut dyn Write {
        &mut self.encoder
    }

    /// Sync-flush the compressor and push everything staged so far to the socket.
    pub async fn flush_frame(&mut self) -> io::Result<()> {
        self.encoder.flush()?;
        let pending = std::mem::take(self.encoder.get_mut());
        if pending.is_empty() {
            return Ok(());
        }
        self.inner.write_all(&pending).await?;
        self.inner.flush().await
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Inbound messages of a peer: inflated socket bytes split into frames
pub type MessageReader<R> = FramedRead<InflateReader<R>, FrameDecoder>;

/// Read messages from the compressed stream on `socket`
pub fn message_reader<R>(socket: R, codec: Arc<dyn Codec>) -> MessageReader<R>
where
    R: AsyncRead + Unpin,
{
    FramedRead::new(InflateReader::new(socket), FrameDecoder::new(codec))
}

/// Decompressing reader over the read side of a peer socket
pub struct InflateReader<R> {
    inner: R,
    inflater: Decompress,
    input: BytesMut,
    chunk: Vec<u8>,
    eof: bool,
}

impl<R> InflateReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            inflater: Decompress::new(false),
            input: BytesMut::new(),
            chunk: vec![0u8; READ_CHUNK],
            eof: false,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for InflateReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            if !this.input.is_empty() {
                let (before_in, before_out) = (this.inflater.total_in(), this.inflater.total_out());
                let status = this
                    .inflater
                    .decompress(&this.input, buf.initialize_unfilled(), FlushDecompress::None)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

                let consumed = (this.inflater.total_in() - before_in) as usize;
                let produced = (this.inflater.total_out() - before_out) as usize;
                this.input.advance(consumed);
                buf.advance(produced);

                if produced > 0 || status == Status::StreamEnd {
                    return Poll::Ready(Ok(()));
                }
                if consumed > 0 {
                    continue;
                }
            }

            // leftover input that inflates to nothing is dropped at EOF
            if this.eof {
                return Poll::Ready(Ok(()));
            }

            let mut read = ReadBuf::new(&mut this.chunk);
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut read))?;
            if read.filled().is_empty() {
                this.eof = true;
            } else {
                this.input.extend_from_slice(read.filled());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::codec::JsonCodec;
    use crate::network::error::CodecError;
    use crate::network::message::Message;
    use futures::StreamExt;
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how often a complete frame is handed to the codec
    #[derive(Default)]
    struct CountingCodec {
        decodes: AtomicUsize,
    }

    impl Codec for CountingCodec {
        fn encode(&self, writer: &mut dyn Write, message: &Message) -> Result<(), CodecError> {
            JsonCodec::default().encode(writer, message)
        }

        fn decode(&self, reader: &mut dyn Read) -> Result<Message, CodecError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            JsonCodec::default().decode(reader)
        }
    }

    async fn compress(messages: &[Message]) -> Vec<u8> {
        let codec = JsonCodec::default();
        let mut writer = CompressedWriter::new(Vec::new());
        for msg in messages {
            codec.encode(writer.staging(), msg).unwrap();
            writer.flush_frame().await.unwrap();
        }
        writer.into_inner()
    }

    #[tokio::test]
    async fn test_frames_decode_without_stream_end() {
        // the deflate stream is never finished, like a live connection
        let bytes = compress(&[Message::Ping(1), Message::Discover]).await;

        let mut reader = message_reader(bytes.as_slice(), Arc::new(JsonCodec::default()));
        assert_eq!(reader.next().await.unwrap().unwrap(), Message::Ping(1));
        assert_eq!(reader.next().await.unwrap().unwrap(), Message::Discover);
        assert!(reader.next().await.is_none());
    }

    #[tokio::test]
    async fn test_large_message_decoded_once() {
        let hashes: Vec<String> = (0..8000)
            .map(|_| hex::encode(rand::random::<[u8; 32]>()))
            .collect();
        let msg = Message::Request { hashes };
        let bytes = compress(&[msg.clone()]).await;
        assert!(bytes.len() > READ_CHUNK);

        let codec = Arc::new(CountingCodec::default());
        let mut reader = message_reader(bytes.as_slice(), codec.clone());
        assert_eq!(reader.next().await.unwrap().unwrap(), msg);
        assert!(reader.next().await.is_none());
        assert_eq!(codec.decodes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_truncated_frame_is_eof_error() {
        let codec = JsonCodec::default();
        let mut frame = Vec::new();
        codec.encode(&mut frame, &Message::Ping(1)).unwrap();

        // the peer hangs up halfway through a frame
        let mut writer = CompressedWriter::new(Vec::new());
        writer.staging().write_all(&frame[..6]).unwrap();
        writer.flush_frame().await.unwrap();

        let bytes = writer.into_inner();
        let mut reader = message_reader(bytes.as_slice(), Arc::new(codec));
        let err = reader.next().await.unwrap().unwrap_err();
        assert!(err.is_eof());
    }

    #[tokio::test]
    async fn test_corrupt_stream_is_error() {
        let garbage = [0xFFu8; 64];
        let mut reader = message_reader(&garbage[..], Arc::new(JsonCodec::default()));
        assert!(matches!(reader.next().await, Some(Err(CodecError::Io(_)))));
    }
}
