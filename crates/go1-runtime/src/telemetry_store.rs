//! [`TelemetryStore`] – latest merged robot state.
//!
//! Each sub-record lives behind its own [`ArcSwap`], so a writer replaces a
//! whole record with one pointer swap and a reader either sees the old record
//! or the new one, never a half-written mix.  Records are independent: an
//! update to `battery` never touches `robot` and no lock spans more than one
//! record.
//!
//! Reads never block, not even against a concurrent writer.

use std::sync::Arc;

use arc_swap::ArcSwap;
use go1_types::{BatteryState, ConnectionState, RobotState};

/// Immutable view of every sub-record at the instant of [`TelemetryStore::read`].
///
/// Sub-records may come from different update times; fields inside one
/// sub-record always come from the same update.
#[derive(Debug, Clone)]
pub struct TelemetrySnapshot {
    pub connection: Arc<ConnectionState>,
    pub battery: Arc<BatteryState>,
    pub robot: Arc<RobotState>,
}

impl TelemetrySnapshot {
    /// `true` once at least one sub-record has been received.
    pub fn any_known(&self) -> bool {
        self.connection.is_known() || self.battery.is_known() || self.robot.is_known()
    }
}

/// Lock-free per-record telemetry state.
pub struct TelemetryStore {
    connection: ArcSwap<ConnectionState>,
    battery: ArcSwap<BatteryState>,
    robot: ArcSwap<RobotState>,
}

impl TelemetryStore {
    /// Create a store with every record in its "unknown" default.
    pub fn new() -> Self {
        Self {
            connection: ArcSwap::from_pointee(ConnectionState::default()),
            battery: ArcSwap::from_pointee(BatteryState::default()),
            robot: ArcSwap::from_pointee(RobotState::default()),
        }
    }

    pub fn read(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            connection: self.connection.load_full(),
            battery: self.battery.load_full(),
            robot: self.robot.load_full(),
        }
    }

    pub fn update_connection(&self, state: ConnectionState) {
        self.connection.store(Arc::new(state));
    }

    pub fn update_battery(&self, state: BatteryState) {
        self.battery.store(Arc::new(state));
    }

    pub fn update_robot(&self, state: RobotState) {
        self.robot.store(Arc::new(state));
    }

    /// Read-copy-update of the battery record.
    ///
    /// `f` may run more than once if another writer races it; it must be a
    /// pure function of the previous record.
    pub fn modify_battery<F>(&self, f: F)
    where
        F: Fn(&BatteryState) -> BatteryState,
    {
        self.battery.rcu(|current| f(current));
    }

    /// Read-copy-update of the connection record; same contract as
    /// [`modify_battery`][Self::modify_battery].
    pub fn modify_connection<F>(&self, f: F)
    where
        F: Fn(&ConnectionState) -> ConnectionState,
    {
        self.connection.rcu(|current| f(current));
    }

    /// Return every record to "unknown".
    pub fn reset(&self) {
        self.update_connection(ConnectionState::default());
        self.update_battery(BatteryState::default());
        self.update_robot(RobotState::default());
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}
