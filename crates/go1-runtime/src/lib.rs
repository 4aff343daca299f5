//! `go1-runtime` – The Engine
//!
//! Streams stick commands to the robot and folds its telemetry into one
//! consistent snapshot.
//!
//! # Modules
//!
//! - [`telemetry_store`] – [`TelemetryStore`]: latest connection, battery and
//!   robot records, each swapped atomically so readers never see a torn
//!   record and never block.
//! - [`aggregator`] – [`TelemetryAggregator`]: decodes inbound messages by
//!   topic and merges them into the store; malformed payloads are logged and
//!   dropped.
//! - [`command_state`] – [`CommandState`]: the caller's four stick axes,
//!   validated on write and read as one unit.
//! - [`stream`] – [`CommandStreamPublisher`]: the cancellable, fixed-cadence
//!   publish loop.
//! - [`session`] – [`Session`]: connect / subscribe / disconnect, axis
//!   updates, streams and one-shot mode and LED commands.
//! - [`motion`] – named motions (`go_forward`, `look_up`, `pose`, …) built on
//!   [`Session::stream`].
//! - [`choreography`] – beat-timed dance moves with turn balancing.
//! - [`config`] – [`SessionConfig`] loaded from `~/.go1link/config.toml`
//!   with `GO1_*` environment overrides.
//! - [`logging`] – [`init_tracing`][logging::init_tracing]: console and
//!   optional OTLP output for binaries.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use go1_middleware::LoopbackBroker;
//! use go1_runtime::{Session, SessionConfig};
//! use go1_types::Mode;
//!
//! # async fn run() -> Result<(), go1_types::Go1Error> {
//! let session = Session::new(Arc::new(LoopbackBroker::default()), SessionConfig::default());
//! session.connect().await?;
//! session.subscribe().await?;
//! session.set_mode(Mode::Walk).await?;
//! session.go_forward(0.5, Duration::from_secs(2)).await?;
//! println!("battery: {:?}", session.battery_level());
//! session.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod choreography;
pub mod command_state;
pub mod config;
pub mod logging;
pub mod motion;
pub mod session;
pub mod stream;
pub mod telemetry_store;

#[cfg(test)]
mod testing;

pub use aggregator::{AggregatorStats, TelemetryAggregator};
pub use choreography::{DanceMove, DanceStep, TurnState};
pub use command_state::CommandState;
pub use config::{ConnectionConfig, ProtocolVersion, SessionConfig};
pub use motion::Motion;
pub use session::Session;
pub use stream::{CommandStreamPublisher, DEFAULT_STREAM_INTERVAL, StreamReport};
pub use telemetry_store::{TelemetrySnapshot, TelemetryStore};
