//! Static topic table.
//!
//! | Topic | Direction | Payload |
//! |---|---|---|
//! | [`STICK`] | out | four little-endian `f32` axes |
//! | [`ACTION`] | out | mode name, UTF-8 |
//! | [`PROGRAMMING`] | out | LED program line, UTF-8 |
//! | [`BMS_STATE`] | in | battery frame, JSON |
//! | [`FIRMWARE_VERSION`] | in | version string |
//! | [`ROBOT_STATE`] | in | robot frame, JSON |
//! | [`CONNECTION_STATUS`] | in | on-board service flags, JSON |

pub const STICK: &str = "controller/stick";
pub const ACTION: &str = "controller/action";
pub const PROGRAMMING: &str = "programming/code";

pub const BMS_STATE: &str = "bms/state";
pub const FIRMWARE_VERSION: &str = "firmware/version";
pub const ROBOT_STATE: &str = "robot/state";
pub const CONNECTION_STATUS: &str = "connection/status";

/// Telemetry topics the client subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundTopic {
    BmsState,
    FirmwareVersion,
    RobotState,
    ConnectionStatus,
}

impl InboundTopic {
    pub const ALL: [InboundTopic; 4] = [
        InboundTopic::BmsState,
        InboundTopic::FirmwareVersion,
        InboundTopic::RobotState,
        InboundTopic::ConnectionStatus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InboundTopic::BmsState => BMS_STATE,
            InboundTopic::FirmwareVersion => FIRMWARE_VERSION,
            InboundTopic::RobotState => ROBOT_STATE,
            InboundTopic::ConnectionStatus => CONNECTION_STATUS,
        }
    }

    /// Resolve a concrete topic name; `None` for topics we do not decode.
    pub fn from_name(topic: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == topic)
    }
}

/// MQTT-style filter matching: `+` matches one level, a trailing `#` matches
/// the rest of the topic.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
