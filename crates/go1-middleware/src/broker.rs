//! In-process loopback broker.
//!
//! Uses a single [`tokio::sync::broadcast`] channel under the hood so that
//! every subscription receives every message without any subscriber blocking
//! the others.  Each subscription is served by its own Tokio task, which is
//! the "inbound delivery context" of the link.
//!
//! The broker plays both ends of the link:
//!
//! * the client side goes through the [`Transport`] impl (`connect`,
//!   `publish`, `subscribe`);
//! * the robot side uses [`LoopbackBroker::inject`] to publish telemetry and
//!   [`LoopbackBroker::tap`] to observe the commands the client sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use go1_types::Go1Error;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::topics::topic_matches;
use crate::transport::{MessageHandler, Transport};

/// Default channel capacity (number of buffered messages before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// One message on the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
}

struct Inner {
    sender: broadcast::Sender<Message>,
    connected: AtomicBool,
    deliveries: Mutex<Vec<JoinHandle<()>>>,
}

/// Shared loopback broker.  Clone it cheaply – all clones share the same
/// channel and connection state.
#[derive(Clone)]
pub struct LoopbackBroker {
    inner: Arc<Inner>,
}

impl LoopbackBroker {
    /// Create a new broker with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                sender,
                connected: AtomicBool::new(false),
                deliveries: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Publish `payload` on `topic` from the robot side.
    ///
    /// Works whether or not the client is connected; returns the number of
    /// receivers that were handed the message (`0` is a normal condition).
    pub fn inject(&self, topic: &str, payload: impl Into<Vec<u8>>) -> usize {
        self.inner
            .sender
            .send(Message {
                topic: topic.to_string(),
                payload: payload.into(),
            })
            .unwrap_or(0)
    }

    /// Observe every message whose topic matches `filter`, including the
    /// client's outbound commands.
    pub fn tap(&self, filter: impl Into<String>) -> TopicReceiver {
        TopicReceiver {
            filter: filter.into(),
            receiver: self.inner.sender.subscribe(),
        }
    }

    /// Number of live subscription delivery tasks.
    pub fn active_subscriptions(&self) -> usize {
        self.inner
            .deliveries
            .lock()
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    fn require_connected(&self, op: &str) -> Result<(), Go1Error> {
        if self.inner.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Go1Error::Connection(format!("{op} on a disconnected link")))
        }
    }
}

impl Default for LoopbackBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl Transport for LoopbackBroker {
    async fn connect(&self) -> Result<(), Go1Error> {
        self.inner.connected.store(true, Ordering::SeqCst);
        debug!("loopback link up");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Go1Error> {
        self.inner.connected.store(false, Ordering::SeqCst);
        for handle in self.inner.deliveries.lock().drain(..) {
            handle.abort();
        }
        debug!("loopback link down");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Go1Error> {
        self.require_connected("publish")?;
        // A send with no receivers is not an error for a broker.
        let _ = self.inner.sender.send(Message {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), Go1Error> {
        self.require_connected("subscribe")?;
        let filter = topic.to_string();
        let mut receiver = self.inner.sender.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(msg) if topic_matches(&filter, &msg.topic) => {
                        handler(&msg.topic, &msg.payload);
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(filter = %filter, lagged_by = n, "subscription lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        let mut deliveries = self.inner.deliveries.lock();
        deliveries.retain(|h| !h.is_finished());
        deliveries.push(handle);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tap receiver
// ---------------------------------------------------------------------------

/// A receiver that only yields messages matching its topic filter.
///
/// Obtained via [`LoopbackBroker::tap`].
pub struct TopicReceiver {
    filter: String,
    receiver: broadcast::Receiver<Message>,
}

impl TopicReceiver {
    /// Wait for the next matching message.
    ///
    /// Returns `None` when the broker is gone and no further messages will
    /// arrive.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) if topic_matches(&self.filter, &msg.topic) => return Some(msg),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(filter = %self.filter, lagged_by = n, "tap lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drain every matching message already buffered, without waiting.
    pub fn drain(&mut self) -> Vec<Message> {
        let mut out = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(msg) if topic_matches(&self.filter, &msg.topic) => out.push(msg),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return out,
            }
        }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_handler() -> (Arc<AtomicUsize>, MessageHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handler: MessageHandler = Arc::new(move |_topic: &str, _payload: &[u8]| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    #[tokio::test]
    async fn publish_requires_connection() {
        let broker = LoopbackBroker::default();
        let err = broker.publish("controller/stick", vec![0; 16]).await.unwrap_err();
        assert!(matches!(err, Go1Error::Connection(_)));

        broker.connect().await.unwrap();
        broker.publish("controller/stick", vec![0; 16]).await.unwrap();
    }

    #[tokio::test]
    async fn tap_sees_outbound_commands() {
        let broker = LoopbackBroker::default();
        broker.connect().await.unwrap();
        let mut tap = broker.tap("controller/+");

        broker.publish("controller/action", b"walk".to_vec()).await.unwrap();
        broker.publish("programming/code", b"noop".to_vec()).await.unwrap();

        let msg = tap.recv().await.unwrap();
        assert_eq!(msg.topic, "controller/action");
        assert_eq!(msg.payload, b"walk");
        assert!(tap.drain().is_empty());
    }

    #[tokio::test]
    async fn subscription_receives_only_matching_topic() {
        let broker = LoopbackBroker::default();
        broker.connect().await.unwrap();
        let (count, handler) = counting_handler();
        broker.subscribe("bms/state", handler).await.unwrap();

        broker.inject("robot/state", "{}");
        broker.inject("bms/state", "{}");
        broker.inject("bms/state", "{}");

        tokio::time::timeout(Duration::from_secs(1), async {
            while count.load(Ordering::SeqCst) < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("both bms messages delivered");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disconnect_stops_delivery() {
        let broker = LoopbackBroker::default();
        broker.connect().await.unwrap();
        let (count, handler) = counting_handler();
        broker.subscribe("#", handler).await.unwrap();
        assert_eq!(broker.active_subscriptions(), 1);

        broker.disconnect().await.unwrap();
        tokio::task::yield_now().await;
        broker.inject("bms/state", "{}");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(broker.active_subscriptions(), 0);
        assert!(!broker.is_connected());
    }

    #[tokio::test]
    async fn finished_deliveries_are_pruned_on_subscribe() {
        let broker = LoopbackBroker::default();
        broker.connect().await.unwrap();
        let dying: MessageHandler = Arc::new(|topic: &str, _payload: &[u8]| {
            panic!("handler for {topic} gave up");
        });
        broker.subscribe("bms/state", dying).await.unwrap();
        broker.inject("bms/state", "{}");

        tokio::time::timeout(Duration::from_secs(1), async {
            while broker.active_subscriptions() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("delivery task ended");

        let (_, handler) = counting_handler();
        broker.subscribe("robot/state", handler).await.unwrap();
        assert_eq!(broker.inner.deliveries.lock().len(), 1);
        assert_eq!(broker.active_subscriptions(), 1);
    }

    #[tokio::test]
    async fn subscribe_on_disconnected_link_fails() {
        let broker = LoopbackBroker::default();
        let (_, handler) = counting_handler();
        assert!(broker.subscribe("#", handler).await.is_err());
    }

    #[test]
    fn inject_without_receivers_returns_zero() {
        let broker = LoopbackBroker::default();
        assert_eq!(broker.inject("bms/state", "{}"), 0);
    }
}
