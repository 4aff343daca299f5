//! [`Session`] – connect / subscribe / drive / disconnect.
//!
//! The session owns one [`CommandState`], one [`TelemetryStore`] and the
//! [`TelemetryAggregator`] that feeds it, and it sequences the transport's
//! lifecycle around them.
//!
//! # Streams
//!
//! At most one stick stream runs per session.  Starting a stream cancels the
//! one in flight and then waits on the stream lock until the old loop has
//! exited, so the two cadences never interleave on the wire.  Every stream
//! token is a child of the session token, which `disconnect` cancels.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use go1_middleware::{InboundTopic, Transport, codec, topics};
use go1_types::{AxisCommand, ConnectionState, Go1Error, LedColor, Mode};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregator::{AggregatorStats, TelemetryAggregator};
use crate::command_state::CommandState;
use crate::config::SessionConfig;
use crate::stream::{CommandStreamPublisher, StreamReport};
use crate::telemetry_store::{TelemetrySnapshot, TelemetryStore};

pub struct Session {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    client_id: String,
    command: Arc<CommandState>,
    store: Arc<TelemetryStore>,
    aggregator: Arc<TelemetryAggregator>,
    publisher: CommandStreamPublisher,
    /// Cancelled on disconnect; replaced on the next connect or when the
    /// link refuses to close.
    lifecycle: Mutex<CancellationToken>,
    active_stream: Mutex<Option<(u64, CancellationToken)>>,
    next_stream_id: AtomicU64,
    stream_lock: tokio::sync::Mutex<()>,
    subscribed: tokio::sync::Mutex<HashSet<InboundTopic>>,
}

impl Session {
    /// Build a session over `transport`.  Nothing is sent until
    /// [`connect`][Self::connect].
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let client_id = config.connection.client_id_or_random();
        let command = Arc::new(CommandState::new());
        let store = Arc::new(TelemetryStore::new());
        let aggregator = Arc::new(TelemetryAggregator::new(Arc::clone(&store)));
        let publisher = CommandStreamPublisher::new(Arc::clone(&transport), Arc::clone(&command));
        Self {
            transport,
            config,
            client_id,
            command,
            store,
            aggregator,
            publisher,
            lifecycle: Mutex::new(CancellationToken::new()),
            active_stream: Mutex::new(None),
            next_stream_id: AtomicU64::new(0),
            stream_lock: tokio::sync::Mutex::new(()),
            subscribed: tokio::sync::Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Client identifier presented to the broker.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Open the link.  On a live link this only re-arms the session token,
    /// so streams work again after a refused disconnect.
    ///
    /// Telemetry from any previous connection is discarded.
    ///
    /// # Errors
    ///
    /// [`Go1Error::Connection`] when the broker cannot be reached.
    pub async fn connect(&self) -> Result<(), Go1Error> {
        if self.transport.is_connected() {
            self.renew_lifecycle();
            debug!("connect called on a live session; ignoring");
            return Ok(());
        }
        self.transport.connect().await.inspect_err(|e| {
            warn!(address = %self.config.connection.address(), error = %e, "connect failed");
        })?;

        self.renew_lifecycle();
        self.store.reset();
        self.store.modify_connection(|prev| ConnectionState {
            transport_connected: true,
            updated_at: Some(chrono::Utc::now()),
            ..prev.clone()
        });
        info!(
            address = %self.config.connection.address(),
            client_id = %self.client_id,
            keep_alive_secs = self.config.connection.keep_alive_secs,
            protocol = %self.config.connection.protocol_version,
            "session connected"
        );
        Ok(())
    }

    /// Route every telemetry topic into the aggregator.
    ///
    /// Idempotent: topics already registered are skipped, so calling this
    /// twice never delivers a message twice.
    ///
    /// # Errors
    ///
    /// [`Go1Error::Connection`] before [`connect`][Self::connect].
    pub async fn subscribe(&self) -> Result<(), Go1Error> {
        self.require_connected("subscribe")?;
        let mut subscribed = self.subscribed.lock().await;
        for topic in InboundTopic::ALL {
            if subscribed.contains(&topic) {
                continue;
            }
            self.transport
                .subscribe(topic.name(), self.aggregator.handler())
                .await?;
            subscribed.insert(topic);
            debug!(topic = topic.name(), "subscribed");
        }
        Ok(())
    }

    /// Stop any running stream and close the link.
    ///
    /// Safe to call when never connected or already disconnected.  Returns
    /// once the stream loop has exited, so no publish can follow.
    ///
    /// # Errors
    ///
    /// The transport's error when the link refuses to close.  The session
    /// stays connected and usable: subscriptions are kept and later streams
    /// run normally.
    pub async fn disconnect(&self) -> Result<(), Go1Error> {
        self.lifecycle.lock().cancel();
        drop(self.stream_lock.lock().await);

        let mut subscribed = self.subscribed.lock().await;
        if !self.transport.is_connected() {
            subscribed.clear();
            return Ok(());
        }
        if let Err(e) = self.transport.disconnect().await {
            warn!(client_id = %self.client_id, error = %e, "disconnect failed; link still up");
            self.renew_lifecycle();
            return Err(e);
        }
        subscribed.clear();
        drop(subscribed);
        self.store.modify_connection(|prev| ConnectionState {
            transport_connected: false,
            updated_at: Some(chrono::Utc::now()),
            ..prev.clone()
        });
        info!(client_id = %self.client_id, "session disconnected");
        Ok(())
    }

    // ── Axes ─────────────────────────────────────────────────────────────────

    /// Set the axes the next stream tick will send.
    ///
    /// # Errors
    ///
    /// [`Go1Error::Validation`] for any value outside `[-1.0, 1.0]` or not
    /// finite; the previous axes are kept.
    pub fn set_axes(&self, strafe: f32, turn: f32, tilt: f32, forward: f32) -> Result<(), Go1Error> {
        self.command.set_axes(strafe, turn, tilt, forward)
    }

    pub fn set_command(&self, cmd: AxisCommand) -> Result<(), Go1Error> {
        self.command.set(cmd)
    }

    pub fn reset_axes(&self) {
        self.command.reset();
    }

    pub fn axes(&self) -> AxisCommand {
        self.command.snapshot()
    }

    // ── Streaming ────────────────────────────────────────────────────────────

    /// Stream the current axes for `duration` at the configured cadence.
    pub async fn stream(&self, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.stream_with_interval(duration, self.config.stream_interval())
            .await
    }

    /// Stream the current axes for `duration`, one publish every `interval`.
    ///
    /// Replaces any stream already running (that one returns with
    /// [`StreamReport::cancelled`] set).  Returns early, without error, when
    /// the session disconnects.
    ///
    /// # Errors
    ///
    /// [`Go1Error::Connection`] when the link is down at the start and
    /// [`Go1Error::Validation`] for a zero interval.
    pub async fn stream_with_interval(
        &self,
        duration: Duration,
        interval: Duration,
    ) -> Result<StreamReport, Go1Error> {
        self.require_connected("stream")?;

        let id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let token = self.lifecycle.lock().child_token();
        let previous = self.active_stream.lock().replace((id, token.clone()));
        if let Some((prev_id, prev)) = previous {
            debug!(stream = prev_id, replaced_by = id, "cancelling running stream");
            prev.cancel();
        }

        let result = {
            let _serial = self.stream_lock.lock().await;
            self.publisher.run(duration, interval, &token).await
        };

        let mut active = self.active_stream.lock();
        if active.as_ref().is_some_and(|(current, _)| *current == id) {
            *active = None;
        }
        result
    }

    /// Cancel the running stream, if any, without touching the link.
    pub fn stop_stream(&self) {
        if let Some((id, token)) = self.active_stream.lock().take() {
            debug!(stream = id, "stream stopped by caller");
            token.cancel();
        }
    }

    /// Sleep for `duration`, returning early when the session disconnects.
    ///
    /// Returns `true` when the full duration elapsed.
    pub async fn wait(&self, duration: Duration) -> bool {
        let token = self.lifecycle.lock().child_token();
        tokio::select! {
            biased;
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    // ── One-shot commands ────────────────────────────────────────────────────

    /// Switch the robot's locomotion mode.
    pub async fn set_mode(&self, mode: Mode) -> Result<(), Go1Error> {
        self.publish_once(topics::ACTION, codec::encode_mode(mode))
            .await?;
        info!(mode = %mode, "mode requested");
        Ok(())
    }

    /// [`set_mode`][Self::set_mode], then wait the configured settle time so
    /// the robot is ready for motion commands.
    pub async fn set_mode_and_settle(&self, mode: Mode) -> Result<(), Go1Error> {
        self.set_mode(mode).await?;
        self.wait(self.config.mode_settle()).await;
        Ok(())
    }

    pub async fn set_led(&self, color: LedColor) -> Result<(), Go1Error> {
        self.publish_once(topics::PROGRAMMING, codec::encode_led(color))
            .await
    }

    /// [`set_led`][Self::set_led] from unchecked channel values.
    ///
    /// # Errors
    ///
    /// [`Go1Error::Validation`] when a channel is outside `0..=255`.
    pub async fn set_led_rgb(&self, r: i32, g: i32, b: i32) -> Result<(), Go1Error> {
        self.set_led(LedColor::from_channels(r, g, b)?).await
    }

    async fn publish_once(&self, topic: &str, payload: Vec<u8>) -> Result<(), Go1Error> {
        self.transport
            .publish(topic, payload)
            .await
            .inspect_err(|e| warn!(topic = %topic, error = %e, "one-shot publish failed"))
    }

    // ── Telemetry ────────────────────────────────────────────────────────────

    /// Latest telemetry; never blocks.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.store.read()
    }

    /// Battery state of charge, once a battery report has arrived.
    pub fn battery_level(&self) -> Option<f32> {
        let battery = self.store.read().battery;
        battery.is_known().then_some(battery.soc)
    }

    pub fn aggregator_stats(&self) -> AggregatorStats {
        self.aggregator.stats()
    }

    /// Swap in a live token if the current one was cancelled.
    fn renew_lifecycle(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.is_cancelled() {
            *lifecycle = CancellationToken::new();
        }
    }

    fn require_connected(&self, op: &str) -> Result<(), Go1Error> {
        if self.transport.is_connected() {
            Ok(())
        } else {
            Err(Go1Error::Connection(format!("{op} requires a connected session")))
        }
    }
}
