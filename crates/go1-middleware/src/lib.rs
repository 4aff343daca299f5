//! `go1-middleware` – The Wire
//!
//! Moves bytes between the client and the robot without caring about
//! session state.
//!
//! # Modules
//!
//! - [`transport`] – the [`Transport`] capability (`publish` / `subscribe`)
//!   every broker client implements.
//! - [`broker`] – [`LoopbackBroker`], an in-process broker built on Tokio
//!   broadcast channels.  Plays both ends of the link in tests and demos.
//! - [`topics`] – the static topic table for outbound commands and inbound
//!   telemetry.
//! - [`codec`] – payload encoders for stick, mode and LED commands, and
//!   decoders that turn raw telemetry payloads into [`TelemetryFragment`]s.

pub mod broker;
pub mod codec;
pub mod topics;
pub mod transport;

pub use broker::{LoopbackBroker, Message, TopicReceiver};
pub use codec::{BatteryFrame, ServiceStatus, TelemetryFragment};
pub use topics::InboundTopic;
pub use transport::{MessageHandler, Transport};
