use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lower bound of every normalized stick axis.
pub const AXIS_MIN: f32 = -1.0;
/// Upper bound of every normalized stick axis.
pub const AXIS_MAX: f32 = 1.0;

// ────────────────────────────────────────────────────────────────────────────
// Outbound command vocabulary
// ────────────────────────────────────────────────────────────────────────────

/// The four normalized "stick" values that drive locomotion and posture.
///
/// Every field lives in `[-1.0, 1.0]`.  Values outside that range (and any
/// non-finite value) are rejected with [`Go1Error::Validation`]; they are
/// never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisCommand {
    /// Sideways walk in walk mode, body lean in stand mode.
    pub strafe: f32,
    /// Yaw rate in walk mode, body twist in stand mode.
    pub turn: f32,
    /// Head pitch (look up / down).
    pub tilt: f32,
    /// Forward walk in walk mode, body height in stand mode.
    pub forward: f32,
}

impl AxisCommand {
    /// All axes at rest.
    pub const NEUTRAL: AxisCommand = AxisCommand {
        strafe: 0.0,
        turn: 0.0,
        tilt: 0.0,
        forward: 0.0,
    };

    /// Build a validated command.
    ///
    /// # Errors
    ///
    /// Returns [`Go1Error::Validation`] naming the first offending axis.
    pub fn new(strafe: f32, turn: f32, tilt: f32, forward: f32) -> Result<Self, Go1Error> {
        let cmd = Self {
            strafe,
            turn,
            tilt,
            forward,
        };
        cmd.validate()?;
        Ok(cmd)
    }

    /// Check every axis is finite and inside `[AXIS_MIN, AXIS_MAX]`.
    pub fn validate(&self) -> Result<(), Go1Error> {
        check_axis("strafe", self.strafe)?;
        check_axis("turn", self.turn)?;
        check_axis("tilt", self.tilt)?;
        check_axis("forward", self.forward)?;
        Ok(())
    }

    /// Axes in wire order: strafe, turn, tilt, forward.
    pub fn to_array(self) -> [f32; 4] {
        [self.strafe, self.turn, self.tilt, self.forward]
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }
}

fn check_axis(name: &str, value: f32) -> Result<(), Go1Error> {
    if value.is_finite() && (AXIS_MIN..=AXIS_MAX).contains(&value) {
        Ok(())
    } else {
        Err(Go1Error::Validation(format!(
            "axis `{name}` must be a finite value in [{AXIS_MIN}, {AXIS_MAX}], got {value}"
        )))
    }
}

/// High-level robot modes accepted on the action topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Dance1,
    Dance2,
    StraightHand1,
    Damping,
    StandUp,
    StandDown,
    RecoverStand,
    Stand,
    Walk,
    Run,
    Climb,
    JumpYaw,
}

impl Mode {
    /// Every mode, in declaration order.
    pub const ALL: [Mode; 12] = [
        Mode::Dance1,
        Mode::Dance2,
        Mode::StraightHand1,
        Mode::Damping,
        Mode::StandUp,
        Mode::StandDown,
        Mode::RecoverStand,
        Mode::Stand,
        Mode::Walk,
        Mode::Run,
        Mode::Climb,
        Mode::JumpYaw,
    ];

    /// The action string the robot expects for this mode.
    pub fn wire_name(self) -> &'static str {
        match self {
            Mode::Dance1 => "dance1",
            Mode::Dance2 => "dance2",
            Mode::StraightHand1 => "straightHand1",
            Mode::Damping => "damping",
            Mode::StandUp => "standUp",
            Mode::StandDown => "standDown",
            Mode::RecoverStand => "recoverStand",
            Mode::Stand => "stand",
            Mode::Walk => "walk",
            Mode::Run => "run",
            Mode::Climb => "climb",
            Mode::JumpYaw => "jumpYaw",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Mode {
    type Err = Go1Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.wire_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Go1Error::Validation(format!("unknown mode `{s}`")))
    }
}

/// RGB colour for the head LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl LedColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a colour from untyped integer channels, each of which must be in
    /// `0..=255`.
    ///
    /// # Errors
    ///
    /// Returns [`Go1Error::Validation`] for the first channel out of range.
    pub fn from_channels(r: i32, g: i32, b: i32) -> Result<Self, Go1Error> {
        Ok(Self {
            r: channel("r", r)?,
            g: channel("g", g)?,
            b: channel("b", b)?,
        })
    }
}

fn channel(name: &str, value: i32) -> Result<u8, Go1Error> {
    u8::try_from(value).map_err(|_| {
        Go1Error::Validation(format!(
            "colour channel `{name}` must be in 0..=255, got {value}"
        ))
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Telemetry sub-records
// ────────────────────────────────────────────────────────────────────────────

/// Link and on-board service status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectionState {
    pub transport_connected: bool,
    pub manager_on: bool,
    pub controller_on: bool,
    /// `None` until the first update arrives.
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConnectionState {
    pub fn is_known(&self) -> bool {
        self.updated_at.is_some()
    }
}

/// Battery management system report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatteryState {
    /// State of charge, percent (0–100).
    pub soc: f32,
    /// Pack voltage (V).
    pub voltage: f32,
    /// Pack current (A); negative while discharging.
    pub current: f32,
    pub cycle: u32,
    /// Per-cell temperatures (°C), BMS order.
    pub cell_temps: Vec<f32>,
    /// Per-cell voltages (V), BMS order.
    pub cell_voltages: Vec<f32>,
    /// Firmware version string, merged from the firmware topic.
    pub version: String,
    pub status: u8,
    /// `None` until the first update arrives.
    pub updated_at: Option<DateTime<Utc>>,
}

impl BatteryState {
    pub fn is_known(&self) -> bool {
        self.updated_at.is_some()
    }
}

/// Distances (metres) to the nearest obstacle in each direction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistanceWarning {
    pub front: f32,
    pub back: f32,
    pub left: f32,
    pub right: f32,
}

/// Robot body status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotState {
    pub serial_number: String,
    pub hardware_version: String,
    pub software_version: String,
    /// Per-motor temperatures (°C), leg order.
    pub motor_temps: Vec<f32>,
    pub mode: u8,
    pub gait: u8,
    pub obstacles: Vec<u8>,
    /// Free-form state label reported by the robot.
    pub state: String,
    pub distance_warning: DistanceWarning,
    /// `None` until the first update arrives.
    pub updated_at: Option<DateTime<Utc>>,
}

impl RobotState {
    pub fn is_known(&self) -> bool {
        self.updated_at.is_some()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type shared by every go1link crate.
///
/// No variant is fatal: each failure is local to one operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Go1Error {
    #[error("Connection Error: {0}")]
    Connection(String),

    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Decode Error on {topic}: {reason}")]
    Decode { topic: String, reason: String },

    #[error("Publish Error on {topic}: {reason}")]
    Publish { topic: String, reason: String },

    #[error("Config Error: {0}")]
    Config(String),
}
