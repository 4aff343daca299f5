//! Payload codec.
//!
//! Outbound encoders are infallible: their inputs are already validated
//! types.  Inbound decoders turn one raw payload into one
//! [`TelemetryFragment`] or a [`Go1Error::Decode`]; they never panic on
//! hostile input.

use go1_types::{AxisCommand, DistanceWarning, Go1Error, LedColor, Mode, RobotState};
use serde::Deserialize;

use crate::topics::InboundTopic;

/// Size of an encoded stick payload.
pub const STICK_PAYLOAD_LEN: usize = 16;

/// Upper bound on inbound payload size; larger frames are rejected unread.
pub const MAX_TELEMETRY_PAYLOAD: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Four little-endian `f32` in order strafe, turn, tilt, forward.
pub fn encode_stick(cmd: &AxisCommand) -> Vec<u8> {
    let mut out = Vec::with_capacity(STICK_PAYLOAD_LEN);
    for axis in cmd.to_array() {
        out.extend_from_slice(&axis.to_le_bytes());
    }
    out
}

/// Inverse of [`encode_stick`]; used by robot-side observers.
pub fn decode_stick(payload: &[u8]) -> Result<AxisCommand, Go1Error> {
    let bytes: &[u8; STICK_PAYLOAD_LEN] = payload.try_into().map_err(|_| Go1Error::Decode {
        topic: crate::topics::STICK.to_string(),
        reason: format!("expected {STICK_PAYLOAD_LEN} bytes, got {}", payload.len()),
    })?;
    let axis = |i: usize| f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    Ok(AxisCommand {
        strafe: axis(0),
        turn: axis(4),
        tilt: axis(8),
        forward: axis(12),
    })
}

pub fn encode_mode(mode: Mode) -> Vec<u8> {
    mode.wire_name().as_bytes().to_vec()
}

/// The on-board program line that switches the head LEDs.
pub fn encode_led(color: LedColor) -> Vec<u8> {
    format!(
        "child_conn.send('change_light({},{},{})')",
        color.r, color.g, color.b
    )
    .into_bytes()
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A decoded partial update to one telemetry sub-record.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryFragment {
    /// Battery report; carries everything except the firmware version.
    Battery(BatteryFrame),
    FirmwareVersion(String),
    Robot(RobotState),
    Services(ServiceStatus),
}

/// `bms/state` body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatteryFrame {
    pub soc: f32,
    pub voltage: f32,
    pub current: f32,
    pub cycle: u32,
    #[serde(default, alias = "temps")]
    pub cell_temps: Vec<f32>,
    #[serde(default, alias = "cell_vol")]
    pub cell_voltages: Vec<f32>,
    pub status: u8,
}

/// `connection/status` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ServiceStatus {
    pub manager_on: bool,
    pub controller_on: bool,
}

#[derive(Deserialize)]
struct RobotVersion {
    #[serde(default)]
    hardware: String,
    #[serde(default)]
    software: String,
}

#[derive(Deserialize)]
struct RobotFrame {
    #[serde(default, alias = "sn")]
    serial_number: String,
    version: RobotVersion,
    #[serde(alias = "temps")]
    motor_temps: Vec<f32>,
    mode: u8,
    #[serde(alias = "gaitType")]
    gait: u8,
    #[serde(default)]
    obstacles: Vec<u8>,
    state: String,
    #[serde(alias = "distanceWarning")]
    distance_warning: DistanceWarning,
}

/// Decode `payload` received on `topic`.
pub fn decode(topic: InboundTopic, payload: &[u8]) -> Result<TelemetryFragment, Go1Error> {
    let fail = |reason: String| Go1Error::Decode {
        topic: topic.name().to_string(),
        reason,
    };
    if payload.len() > MAX_TELEMETRY_PAYLOAD {
        return Err(fail(format!(
            "payload is {} bytes, exceeding the limit of {MAX_TELEMETRY_PAYLOAD}",
            payload.len()
        )));
    }
    match topic {
        InboundTopic::BmsState => {
            let frame: BatteryFrame =
                serde_json::from_slice(payload).map_err(|e| fail(e.to_string()))?;
            validate_battery(&frame).map_err(fail)?;
            Ok(TelemetryFragment::Battery(frame))
        }
        InboundTopic::FirmwareVersion => decode_version(payload)
            .map(TelemetryFragment::FirmwareVersion)
            .map_err(fail),
        InboundTopic::RobotState => {
            let frame: RobotFrame =
                serde_json::from_slice(payload).map_err(|e| fail(e.to_string()))?;
            validate_robot(&frame).map_err(fail)?;
            Ok(TelemetryFragment::Robot(RobotState {
                serial_number: frame.serial_number,
                hardware_version: frame.version.hardware,
                software_version: frame.version.software,
                motor_temps: frame.motor_temps,
                mode: frame.mode,
                gait: frame.gait,
                obstacles: frame.obstacles,
                state: frame.state,
                distance_warning: frame.distance_warning,
                updated_at: None,
            }))
        }
        InboundTopic::ConnectionStatus => serde_json::from_slice(payload)
            .map(TelemetryFragment::Services)
            .map_err(|e| fail(e.to_string())),
    }
}

fn validate_battery(frame: &BatteryFrame) -> Result<(), String> {
    if !(0.0..=100.0).contains(&frame.soc) {
        return Err(format!("soc {} outside 0..=100", frame.soc));
    }
    all_finite("voltage", &[frame.voltage])?;
    all_finite("current", &[frame.current])?;
    all_finite("cell_temps", &frame.cell_temps)?;
    all_finite("cell_voltages", &frame.cell_voltages)?;
    Ok(())
}

fn validate_robot(frame: &RobotFrame) -> Result<(), String> {
    all_finite("motor_temps", &frame.motor_temps)?;
    let w = &frame.distance_warning;
    for (side, d) in [("front", w.front), ("back", w.back), ("left", w.left), ("right", w.right)] {
        if !d.is_finite() || d < 0.0 {
            return Err(format!("distance_warning.{side} must be a non-negative distance, got {d}"));
        }
    }
    Ok(())
}

fn all_finite(field: &str, values: &[f32]) -> Result<(), String> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(v) => Err(format!("{field} contains non-finite value {v}")),
        None => Ok(()),
    }
}

/// Accept either a bare UTF-8 version or a JSON string.
fn decode_version(payload: &[u8]) -> Result<String, String> {
    let text = std::str::from_utf8(payload).map_err(|e| format!("version is not UTF-8: {e}"))?;
    let text = text.trim();
    let version = if text.starts_with('"') {
        serde_json::from_str::<String>(text).map_err(|e| e.to_string())?
    } else {
        text.to_string()
    };
    if version.is_empty() {
        return Err("empty version string".to_string());
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BMS: &str = r#"{"soc":87.5,"voltage":28.1,"current":-1.2,"cycle":42,
        "cell_temps":[31.0,32.0],"cell_voltages":[3.5,3.51],"status":1}"#;

    const ROBOT: &str = r#"{"serial_number":"GO1-0042","version":{"hardware":"1.0","software":"2.3"},
        "motor_temps":[40.0,41.0,39.5],"mode":1,"gait":0,"obstacles":[0,1],
        "state":"standing","distance_warning":{"front":0.6,"back":1.2,"left":0.9,"right":2.0}}"#;

    #[test]
    fn stick_payload_layout() {
        let cmd = AxisCommand::new(0.25, -0.5, 0.0, 1.0).unwrap();
        let bytes = encode_stick(&cmd);
        assert_eq!(bytes.len(), STICK_PAYLOAD_LEN);
        assert_eq!(&bytes[0..4], &0.25f32.to_le_bytes());
        assert_eq!(&bytes[12..16], &1.0f32.to_le_bytes());
        assert_eq!(decode_stick(&bytes).unwrap(), cmd);
    }

    #[test]
    fn stick_decode_rejects_short_payload() {
        assert!(decode_stick(&[0u8; 15]).is_err());
    }

    #[test]
    fn mode_and_led_payloads() {
        assert_eq!(encode_mode(Mode::StandDown), b"standDown");
        assert_eq!(
            encode_led(LedColor::new(255, 0, 16)),
            b"child_conn.send('change_light(255,0,16)')"
        );
    }

    #[test]
    fn decodes_battery_frame() {
        let frag = decode(InboundTopic::BmsState, BMS.as_bytes()).unwrap();
        let TelemetryFragment::Battery(frame) = frag else {
            panic!("expected battery fragment");
        };
        assert_eq!(frame.soc, 87.5);
        assert_eq!(frame.cycle, 42);
        assert_eq!(frame.cell_voltages, vec![3.5, 3.51]);
    }

    #[test]
    fn battery_soc_out_of_range_is_rejected() {
        let payload = BMS.replace("87.5", "120.0");
        let err = decode(InboundTopic::BmsState, payload.as_bytes()).unwrap_err();
        assert!(matches!(err, Go1Error::Decode { ref topic, .. } if topic == "bms/state"));
    }

    #[test]
    fn battery_wrong_field_type_is_rejected() {
        let payload = BMS.replace("42", "\"many\"");
        assert!(decode(InboundTopic::BmsState, payload.as_bytes()).is_err());
    }

    #[test]
    fn decodes_robot_frame_with_nested_fields() {
        let frag = decode(InboundTopic::RobotState, ROBOT.as_bytes()).unwrap();
        let TelemetryFragment::Robot(robot) = frag else {
            panic!("expected robot fragment");
        };
        assert_eq!(robot.serial_number, "GO1-0042");
        assert_eq!(robot.software_version, "2.3");
        assert_eq!(robot.distance_warning.back, 1.2);
        assert_eq!(robot.state, "standing");
        assert!(robot.updated_at.is_none());
    }

    #[test]
    fn robot_negative_distance_is_rejected() {
        let payload = ROBOT.replace("\"front\":0.6", "\"front\":-0.6");
        assert!(decode(InboundTopic::RobotState, payload.as_bytes()).is_err());
    }

    #[test]
    fn firmware_version_accepts_plain_and_json() {
        assert_eq!(
            decode(InboundTopic::FirmwareVersion, b"v1.2.3\n").unwrap(),
            TelemetryFragment::FirmwareVersion("v1.2.3".to_string())
        );
        assert_eq!(
            decode(InboundTopic::FirmwareVersion, br#""v2.0""#).unwrap(),
            TelemetryFragment::FirmwareVersion("v2.0".to_string())
        );
        assert!(decode(InboundTopic::FirmwareVersion, b"   ").is_err());
        assert!(decode(InboundTopic::FirmwareVersion, &[0xff, 0xfe]).is_err());
    }

    #[test]
    fn decodes_service_status() {
        let frag = decode(
            InboundTopic::ConnectionStatus,
            br#"{"manager_on":true,"controller_on":false}"#,
        )
        .unwrap();
        assert_eq!(
            frag,
            TelemetryFragment::Services(ServiceStatus {
                manager_on: true,
                controller_on: false
            })
        );
    }

    #[test]
    fn oversized_payload_is_rejected_unread() {
        let payload = vec![b' '; MAX_TELEMETRY_PAYLOAD + 1];
        assert!(decode(InboundTopic::RobotState, &payload).is_err());
    }
}
