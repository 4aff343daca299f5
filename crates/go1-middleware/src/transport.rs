//! The transport seam.
//!
//! The session never speaks a broker protocol directly.  It talks to a
//! [`Transport`], and broker clients (MQTT, the in-process
//! [`LoopbackBroker`][crate::broker::LoopbackBroker], test doubles) implement
//! it.

use std::sync::Arc;

use async_trait::async_trait;
use go1_types::Go1Error;

/// Callback invoked from the transport's delivery context with the concrete
/// topic and the raw payload.
///
/// Handlers must return quickly; the transport does not wait on application
/// logic beyond the call itself.
pub type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync + 'static>;

/// Publish/subscribe capability used by the session.
///
/// # Contract
///
/// * `connect` / `disconnect` – establish and tear down the link.
///   `disconnect` on an unconnected transport is a no-op.
/// * `publish` – fire-and-forget send.  Fails with
///   [`Go1Error::Connection`] when the link is down and
///   [`Go1Error::Publish`] when the broker rejects the message.
/// * `subscribe` – register `handler` for every message whose topic matches
///   `topic`.  Delivery stops on `disconnect`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<(), Go1Error>;

    async fn disconnect(&self) -> Result<(), Go1Error>;

    fn is_connected(&self) -> bool;

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Go1Error>;

    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), Go1Error>;
}
