//! Transport double shared by the runtime's unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use go1_middleware::{MessageHandler, Transport};
use go1_types::Go1Error;
use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub(crate) struct Published {
    pub at: Instant,
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Records every publish with its (virtual) timestamp.
///
/// Publish calls whose 0-based index is in `failing` are rejected with
/// [`Go1Error::Publish`]; those in `stalled` hang for a minute first.
/// Subscribe calls are indexed separately and fail the same way.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    connected: AtomicBool,
    calls: AtomicUsize,
    failing: Mutex<HashSet<usize>>,
    stalled: Mutex<HashSet<usize>>,
    subscribe_calls: AtomicUsize,
    failing_subscribes: Mutex<HashSet<usize>>,
    failing_disconnects: AtomicUsize,
    published: Mutex<Vec<Published>>,
    pub subscriptions: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn connected() -> Self {
        let t = Self::default();
        t.connected.store(true, Ordering::SeqCst);
        t
    }

    pub fn fail_calls(&self, calls: impl IntoIterator<Item = usize>) {
        self.failing.lock().extend(calls);
    }

    pub fn stall_calls(&self, calls: impl IntoIterator<Item = usize>) {
        self.stalled.lock().extend(calls);
    }

    pub fn fail_subscribe_calls(&self, calls: impl IntoIterator<Item = usize>) {
        self.failing_subscribes.lock().extend(calls);
    }

    /// Reject the next `n` disconnects, leaving the link up.
    pub fn fail_disconnects(&self, n: usize) {
        self.failing_disconnects.store(n, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn connect(&self) -> Result<(), Go1Error> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Go1Error> {
        let pending = self
            .failing_disconnects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(Go1Error::Connection("disconnect refused by test transport".to_string()));
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Go1Error> {
        if !self.is_connected() {
            return Err(Go1Error::Connection("link is down".to_string()));
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let stall = self.stalled.lock().contains(&call);
        if stall {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if self.failing.lock().contains(&call) {
            return Err(Go1Error::Publish {
                topic: topic.to_string(),
                reason: "rejected by test transport".to_string(),
            });
        }
        self.published.lock().push(Published {
            at: Instant::now(),
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str, _handler: MessageHandler) -> Result<(), Go1Error> {
        if !self.is_connected() {
            return Err(Go1Error::Connection("link is down".to_string()));
        }
        let call = self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_subscribes.lock().contains(&call) {
            return Err(Go1Error::Connection(format!("subscribe to {topic} refused")));
        }
        self.subscriptions.lock().push(topic.to_string());
        Ok(())
    }
}
