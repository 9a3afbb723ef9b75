//! Transport event handler
//!
//! Turns transport events into peer liveness updates, sends our status to new
//! peers and hands received payloads to message processing. Events are handled
//! one at a time, so events for the same address keep their order.

use crate::network::{Event, Message, NetworkError, Sender, Transport};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Source of the best known header path
pub trait Headers: Send + Sync {
    /// Hashes along the best path and its distance from the root
    fn path(&self) -> (Vec<String>, u64);
}

/// Peer registry notified about liveness
pub trait Peers: Send + Sync {
    fn active(&self, address: &str);
    fn inactive(&self, address: &str);
}

/// Application-level processing of received messages
pub trait MessageProcessor: Send + Sync {
    fn process(&self, address: &str, message: Message);
}

/// Outbound side of the transport as seen by the handler
pub trait Network: Send + Sync {
    fn send(&self, address: &str, message: Message) -> Result<(), NetworkError>;
}

impl Network for Sender {
    fn send(&self, address: &str, message: Message) -> Result<(), NetworkError> {
        Sender::send(self, address, message)
    }
}

impl Network for Transport {
    fn send(&self, address: &str, message: Message) -> Result<(), NetworkError> {
        Transport::send(self, address, message)
    }
}

/// Handler for events received from the network layer
pub struct EventHandler {
    net: Arc<dyn Network>,
    headers: Arc<dyn Headers>,
    peers: Arc<dyn Peers>,
    messages: Arc<dyn MessageProcessor>,
}

impl EventHandler {
    pub fn new(
        net: Arc<dyn Network>,
        headers: Arc<dyn Headers>,
        peers: Arc<dyn Peers>,
        messages: Arc<dyn MessageProcessor>,
    ) -> Self {
        Self {
            net,
            headers,
            peers,
            messages,
        }
    }

    /// Process a single event
    pub fn process(&self, event: Event) {
        log::debug!("Processing {} for {}", event.type_name(), event.address());

        match event {
            Event::Connected { address, .. } => {
                self.peers.active(&address);

                // send our current best distance
                let (_, distance) = self.headers.path();
                if let Err(e) = self.net.send(&address, Message::Status { distance }) {
                    log::error!("Could not send status message to {}: {}", address, e);
                }
            }

            Event::Disconnected { address, .. } => {
                self.peers.inactive(&address);
            }

            Event::Received {
                address, message, ..
            } => {
                self.messages.process(&address, message);
            }

            Event::Failure { address } => {
                log::debug!("Peer {} failed", address);
            }

            Event::Violation { address } => {
                log::debug!("Peer {} violated the protocol", address);
            }

            // sockets are taken over by the transport before events reach us
            Event::Connection { address, .. } => {
                log::warn!("Unexpected raw connection event for {}", address);
            }
        }
    }

    /// Process events until the stream ends
    pub async fn run(self, mut events: mpsc::Receiver<Event>) {
        log::debug!("Event handler started");
        while let Some(event) = events.recv().await {
            self.process(event);
        }
        log::debug!("Event handler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl Peers for Recorder {
        fn active(&self, address: &str) {
            self.record(format!("active {}", address));
        }

        fn inactive(&self, address: &str) {
            self.record(format!("inactive {}", address));
        }
    }

    impl MessageProcessor for Recorder {
        fn process(&self, address: &str, message: Message) {
            self.record(format!("process {} {}", address, message.type_name()));
        }
    }

    struct FixedHeaders(u64);

    impl Headers for FixedHeaders {
        fn path(&self) -> (Vec<String>, u64) {
            (vec!["root".to_string()], self.0)
        }
    }

    #[derive(Default)]
    struct RecordingNet {
        sent: Mutex<Vec<(String, Message)>>,
        fail: bool,
    }

    impl Network for RecordingNet {
        fn send(&self, address: &str, message: Message) -> Result<(), NetworkError> {
            if self.fail {
                return Err(NetworkError::QueueFull(address.to_string()));
            }
            self.sent.lock().unwrap().push((address.to_string(), message));
            Ok(())
        }
    }

    fn handler(net: Arc<RecordingNet>, recorder: Arc<Recorder>) -> EventHandler {
        EventHandler::new(net, Arc::new(FixedHeaders(7)), recorder.clone(), recorder)
    }

    #[test]
    fn test_connected_marks_active_and_sends_status() {
        let net = Arc::new(RecordingNet::default());
        let recorder = Arc::new(Recorder::default());
        let handler = handler(net.clone(), recorder.clone());

        handler.process(Event::connected("192.0.2.100:1337"));

        assert_eq!(recorder.calls(), vec!["active 192.0.2.100:1337"]);
        assert_eq!(
            *net.sent.lock().unwrap(),
            vec![("192.0.2.100:1337".to_string(), Message::Status { distance: 7 })]
        );
    }

    #[test]
    fn test_status_failure_keeps_peer_active() {
        let net = Arc::new(RecordingNet {
            fail: true,
            ..Default::default()
        });
        let recorder = Arc::new(Recorder::default());
        let handler = handler(net, recorder.clone());

        handler.process(Event::connected("192.0.2.100:1337"));

        assert_eq!(recorder.calls(), vec!["active 192.0.2.100:1337"]);
    }

    #[test]
    fn test_disconnected_and_received() {
        let net = Arc::new(RecordingNet::default());
        let recorder = Arc::new(Recorder::default());
        let handler = handler(net.clone(), recorder.clone());

        handler.process(Event::received("192.0.2.100:1337", Message::Ping(1)));
        handler.process(Event::disconnected("192.0.2.100:1337"));
        handler.process(Event::Failure {
            address: "192.0.2.200:1337".to_string(),
        });

        assert_eq!(
            recorder.calls(),
            vec!["process 192.0.2.100:1337 Ping", "inactive 192.0.2.100:1337"]
        );
        assert!(net.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_status_to_unknown_mailbox() {
        let sender = Arc::new(Sender::new(2));
        let recorder = Arc::new(Recorder::default());
        let handler = EventHandler::new(
            sender.clone(),
            Arc::new(FixedHeaders(1)),
            recorder.clone(),
            recorder.clone(),
        );

        handler.process(Event::connected("192.0.2.100:1337"));

        assert_eq!(recorder.calls(), vec!["active 192.0.2.100:1337"]);
        assert!(sender.is_empty());
    }

    #[tokio::test]
    async fn test_run_preserves_order() {
        let net = Arc::new(RecordingNet::default());
        let recorder = Arc::new(Recorder::default());
        let handler = handler(net, recorder.clone());
        let (tx, rx) = mpsc::channel(8);

        tx.send(Event::connected("a:1")).await.unwrap();
        tx.send(Event::received("a:1", Message::Discover)).await.unwrap();
        tx.send(Event::disconnected("a:1")).await.unwrap();
        drop(tx);
        handler.run(rx).await;

        assert_eq!(
            recorder.calls(),
            vec!["active a:1", "process a:1 Discover", "inactive a:1"]
        );
    }
}
