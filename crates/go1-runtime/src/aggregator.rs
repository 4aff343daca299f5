//! [`TelemetryAggregator`] – turns raw inbound messages into store updates.
//!
//! Runs inside the transport's delivery context.  Every message is handled
//! on its own: a bad payload is logged and dropped, the prior record stays
//! in place, and the next message is decoded as if nothing happened.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use go1_middleware::codec::{self, TelemetryFragment};
use go1_middleware::{InboundTopic, MessageHandler};
use go1_types::{BatteryState, ConnectionState, Go1Error};
use tracing::{debug, warn};

use crate::telemetry_store::TelemetryStore;

/// Running counters, mostly useful in tests and health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AggregatorStats {
    /// Fragments decoded and merged into the store.
    pub accepted: u64,
    /// Payloads that failed to decode.
    pub rejected: u64,
    /// Messages on topics without a decoder.
    pub ignored: u64,
}

pub struct TelemetryAggregator {
    store: Arc<TelemetryStore>,
    accepted: AtomicU64,
    rejected: AtomicU64,
    ignored: AtomicU64,
}

impl TelemetryAggregator {
    pub fn new(store: Arc<TelemetryStore>) -> Self {
        Self {
            store,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        }
    }

    /// Decode `payload` received on `topic` and merge it into the store.
    ///
    /// # Errors
    ///
    /// Returns [`Go1Error::Decode`] when the payload is malformed.  The error
    /// has already been logged; the store is untouched.
    pub fn handle(&self, topic: &str, payload: &[u8]) -> Result<(), Go1Error> {
        let Some(inbound) = InboundTopic::from_name(topic) else {
            self.ignored.fetch_add(1, Ordering::Relaxed);
            debug!(topic = %topic, "no decoder for topic; ignoring");
            return Ok(());
        };

        match codec::decode(inbound, payload) {
            Ok(fragment) => {
                self.apply(fragment);
                self.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(topic = %topic, bytes = payload.len(), error = %e, "dropping malformed telemetry");
                Err(e)
            }
        }
    }

    /// A [`MessageHandler`] that feeds this aggregator and swallows decode
    /// errors.
    pub fn handler(self: &Arc<Self>) -> MessageHandler {
        let aggregator = Arc::clone(self);
        Arc::new(move |topic: &str, payload: &[u8]| {
            let _ = aggregator.handle(topic, payload);
        })
    }

    pub fn stats(&self) -> AggregatorStats {
        AggregatorStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
        }
    }

    fn apply(&self, fragment: TelemetryFragment) {
        let now = Utc::now();
        match fragment {
            TelemetryFragment::Battery(frame) => {
                self.store.modify_battery(|prev| BatteryState {
                    soc: frame.soc,
                    voltage: frame.voltage,
                    current: frame.current,
                    cycle: frame.cycle,
                    cell_temps: frame.cell_temps.clone(),
                    cell_voltages: frame.cell_voltages.clone(),
                    version: prev.version.clone(),
                    status: frame.status,
                    updated_at: Some(now),
                });
            }
            // The version alone does not make the battery record known.
            TelemetryFragment::FirmwareVersion(version) => {
                self.store.modify_battery(|prev| BatteryState {
                    version: version.clone(),
                    ..prev.clone()
                });
            }
            TelemetryFragment::Robot(mut robot) => {
                robot.updated_at = Some(now);
                self.store.update_robot(robot);
            }
            TelemetryFragment::Services(status) => {
                self.store.modify_connection(|prev| ConnectionState {
                    transport_connected: prev.transport_connected,
                    manager_on: status.manager_on,
                    controller_on: status.controller_on,
                    updated_at: Some(now),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BMS: &str = r#"{"soc":64.0,"voltage":27.5,"current":-2.0,"cycle":12,
        "cell_temps":[30.0,31.0],"cell_voltages":[3.4,3.45],"status":2}"#;

    const ROBOT: &str = r#"{"serial_number":"GO1-7","version":{"hardware":"1.1","software":"3.0"},
        "motor_temps":[38.0,39.0],"mode":2,"gait":1,"obstacles":[0,0,1,0],
        "state":"walking","distance_warning":{"front":0.4,"back":1.0,"left":0.8,"right":0.8}}"#;

    fn make() -> (Arc<TelemetryStore>, Arc<TelemetryAggregator>) {
        let store = Arc::new(TelemetryStore::new());
        let aggregator = Arc::new(TelemetryAggregator::new(Arc::clone(&store)));
        (store, aggregator)
    }

    #[test]
    fn battery_message_updates_battery() {
        let (store, agg) = make();
        agg.handle("bms/state", BMS.as_bytes()).unwrap();
        let snap = store.read();
        assert!(snap.battery.is_known());
        assert_eq!(snap.battery.soc, 64.0);
        assert_eq!(snap.battery.cell_temps, vec![30.0, 31.0]);
        assert!(!snap.robot.is_known());
    }

    #[test]
    fn firmware_version_merges_into_battery_in_either_order() {
        let (store, agg) = make();
        agg.handle("firmware/version", b"fw-1.4").unwrap();
        assert_eq!(store.read().battery.version, "fw-1.4");
        assert!(!store.read().battery.is_known());

        agg.handle("bms/state", BMS.as_bytes()).unwrap();
        let snap = store.read();
        assert_eq!(snap.battery.version, "fw-1.4");
        assert_eq!(snap.battery.cycle, 12);

        agg.handle("firmware/version", b"fw-1.5").unwrap();
        let snap = store.read();
        assert_eq!(snap.battery.version, "fw-1.5");
        assert_eq!(snap.battery.cycle, 12);
    }

    #[test]
    fn malformed_battery_then_valid_robot_updates_only_robot() {
        let (store, agg) = make();
        agg.handle("bms/state", BMS.as_bytes()).unwrap();
        let battery_before = store.read().battery;

        let err = agg.handle("bms/state", br#"{"soc":"full"}"#).unwrap_err();
        assert!(matches!(err, Go1Error::Decode { .. }));
        let between = store.read();
        assert_eq!(between.battery, battery_before);
        assert!(!between.robot.is_known());

        agg.handle("robot/state", ROBOT.as_bytes()).unwrap();
        let after = store.read();
        assert_eq!(after.battery, battery_before);
        assert_eq!(after.robot.state, "walking");
        assert_eq!(after.robot.distance_warning.front, 0.4);
        assert_eq!(agg.stats(), AggregatorStats { accepted: 2, rejected: 1, ignored: 0 });
    }

    #[test]
    fn service_status_keeps_transport_flag() {
        let (store, agg) = make();
        store.update_connection(ConnectionState {
            transport_connected: true,
            ..Default::default()
        });
        agg.handle("connection/status", br#"{"manager_on":true,"controller_on":true}"#)
            .unwrap();
        let conn = store.read().connection;
        assert!(conn.transport_connected);
        assert!(conn.manager_on && conn.controller_on);
        assert!(conn.is_known());
    }

    #[test]
    fn unknown_topic_is_ignored() {
        let (store, agg) = make();
        agg.handle("usys/weather", b"sunny").unwrap();
        assert!(!store.read().any_known());
        assert_eq!(agg.stats().ignored, 1);
    }

    #[test]
    fn handler_swallows_decode_errors() {
        let (store, agg) = make();
        let handler = agg.handler();
        handler("robot/state", b"\x00\x01 not json");
        handler("robot/state", ROBOT.as_bytes());
        assert_eq!(store.read().robot.serial_number, "GO1-7");
        assert_eq!(agg.stats().rejected, 1);
    }
}
