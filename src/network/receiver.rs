//! Inbound side of an established connection
//!
//! Reads the peer's compressed stream, decodes messages with the codec and
//! reports them as `Received` events. When the stream ends, stops decoding or
//! the peer is torn down, a single `Disconnected` event closes the sequence for
//! that address.

use crate::network::codec::Codec;
use crate::network::compression::message_reader;
use crate::network::event::Event;
use futures::StreamExt;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Start reading from `socket` until it ends or `cancel` fires
pub fn spawn_receiver<R>(
    address: String,
    codec: Arc<dyn Codec>,
    socket: R,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut frames = message_reader(socket, codec);
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!("Stopped reading from {}", address);
                    break;
                }
                next = frames.next() => next,
            };

            match next {
                Some(Ok(message)) => {
                    log::debug!("Received {} from {}", message.type_name(), address);
                    if events
                        .send(Event::received(address.as_str(), message))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Some(Err(e)) => {
                    log::warn!("Error reading from {}: {}", address, e);
                    break;
                }
                None => {
                    log::info!("Peer {} disconnected", address);
                    break;
                }
            }
        }
        let _ = events.send(Event::disconnected(address)).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::codec::JsonCodec;
    use crate::network::compression::CompressedWriter;
    use crate::network::message::Message;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncWriteExt};
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_received_then_disconnected() {
        let codec: Arc<dyn Codec> = Arc::new(JsonCodec::default());
        let (local, remote) = duplex(4096);
        let (tx, mut rx) = mpsc::channel(8);
        let task = spawn_receiver(
            "192.0.2.1:1".to_string(),
            codec.clone(),
            local,
            tx,
            CancellationToken::new(),
        );

        let mut writer = CompressedWriter::new(remote);
        codec.encode(writer.staging(), &Message::Ping(5)).unwrap();
        writer.flush_frame().await.unwrap();
        codec
            .encode(writer.staging(), &Message::Peers(vec!["192.0.2.2:1".to_string()]))
            .unwrap();
        writer.flush_frame().await.unwrap();
        writer.into_inner().shutdown().await.unwrap();

        match rx.recv().await.unwrap() {
            Event::Received { address, message, .. } => {
                assert_eq!(address, "192.0.2.1:1");
                assert_eq!(message, Message::Ping(5));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(rx.recv().await.unwrap(), Event::Received { .. }));
        assert!(matches!(rx.recv().await.unwrap(), Event::Disconnected { .. }));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_disconnects() {
        let codec: Arc<dyn Codec> = Arc::new(JsonCodec::default());
        let (local, mut remote) = duplex(4096);
        let (tx, mut rx) = mpsc::channel(8);
        let task = spawn_receiver("192.0.2.1:1".to_string(), codec, local, tx, CancellationToken::new());

        remote.write_all(&[0xFF; 64]).await.unwrap();
        drop(remote);

        assert!(matches!(rx.recv().await.unwrap(), Event::Disconnected { .. }));
        assert!(rx.recv().await.is_none());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_idle_reader() {
        let codec: Arc<dyn Codec> = Arc::new(JsonCodec::default());
        // the remote end stays open and silent
        let (local, _remote) = duplex(4096);
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = spawn_receiver("192.0.2.1:1".to_string(), codec, local, tx, cancel.clone());

        cancel.cancel();
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();

        match rx.recv().await.unwrap() {
            Event::Disconnected { address, .. } => assert_eq!(address, "192.0.2.1:1"),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.recv().await.is_none());
    }
}
