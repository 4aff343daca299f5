//! Beat-synchronised dance moves.
//!
//! A [`DanceMove`] is a short list of [`DanceStep`]s that share the move's
//! duration evenly.  Turning steps change the robot's heading, so their net
//! rotation is tracked in a [`TurnState`] and can be undone with
//! [`balance_turn`] to bring the robot back to its starting heading.

use std::time::Duration;

use go1_types::{AxisCommand, Go1Error};
use tracing::{debug, info};

use crate::motion::Motion;
use crate::session::Session;

/// Moves played by a default routine, in order.
pub const DEFAULT_SEQUENCE: [&str; 6] = [
    "head_bob",
    "side_sway",
    "twist",
    "bounce",
    "look_and_twist",
    "body_wave",
];

/// Turn speed used to undo accumulated rotation.
pub const DEFAULT_BALANCE_SPEED: f32 = 0.4;

/// Net rotations smaller than this are treated as none.
const BALANCE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDirection {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepAction {
    /// One named motion at a fixed speed.
    Axis { motion: Motion, speed: f32 },
    /// All four axes at once.
    Pose(AxisCommand),
    /// An in-place turn that changes the heading.
    Turn { direction: TurnDirection, speed: f32 },
    /// Hold still.
    Wait,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DanceStep {
    pub name: &'static str,
    pub action: StepAction,
}

impl DanceStep {
    pub const fn axis(name: &'static str, motion: Motion, speed: f32) -> Self {
        Self {
            name,
            action: StepAction::Axis { motion, speed },
        }
    }

    pub const fn pose(name: &'static str, lean: f32, twist: f32, look: f32, extend: f32) -> Self {
        Self {
            name,
            action: StepAction::Pose(AxisCommand {
                strafe: lean,
                turn: twist,
                tilt: look,
                forward: extend,
            }),
        }
    }

    pub const fn turn(name: &'static str, direction: TurnDirection, speed: f32) -> Self {
        Self {
            name,
            action: StepAction::Turn { direction, speed },
        }
    }

    pub const fn wait(name: &'static str) -> Self {
        Self {
            name,
            action: StepAction::Wait,
        }
    }

    /// Signed turn speed, right positive.  Zero for steps that keep the
    /// heading.
    pub fn turn_rate(&self) -> f32 {
        match self.action {
            StepAction::Turn {
                direction: TurnDirection::Right,
                speed,
            } => speed,
            StepAction::Turn {
                direction: TurnDirection::Left,
                speed,
            } => -speed,
            _ => 0.0,
        }
    }

    /// Execute the step for `duration`.  Returns `false` when the step was
    /// cut short by a cancelled stream or a closed session.
    async fn run(&self, session: &Session, duration: Duration) -> Result<bool, Go1Error> {
        let report = match self.action {
            StepAction::Axis { motion, speed } => session.perform(motion, speed, duration).await?,
            StepAction::Pose(cmd) => {
                session.set_command(cmd)?;
                session.stream(duration).await?
            }
            StepAction::Turn { direction, speed } => {
                let motion = match direction {
                    TurnDirection::Left => Motion::TurnLeft,
                    TurnDirection::Right => Motion::TurnRight,
                };
                session.perform(motion, speed, duration).await?
            }
            StepAction::Wait => return Ok(session.wait(duration).await),
        };
        Ok(!report.cancelled)
    }
}

/// Net heading change accumulated by turning steps, in speed·seconds with
/// right positive.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TurnState {
    pub balance: f32,
}

impl TurnState {
    pub fn record(&mut self, turn_rate: f32, duration: Duration) {
        self.balance += turn_rate * duration.as_secs_f32();
    }

    pub fn is_balanced(&self) -> bool {
        self.balance.abs() <= BALANCE_EPSILON
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DanceMove {
    pub name: &'static str,
    pub description: &'static str,
    pub steps: Vec<DanceStep>,
}

impl DanceMove {
    /// Play every step, each for `duration / steps.len()`.
    ///
    /// Turning steps add to `turn_state` as they complete.  An interrupted
    /// step (stream replaced, session closed) ends the move early with
    /// `Ok(false)`.
    pub async fn run(
        &self,
        session: &Session,
        duration: Duration,
        mut turn_state: Option<&mut TurnState>,
    ) -> Result<bool, Go1Error> {
        if duration.is_zero() || self.steps.is_empty() {
            return Ok(true);
        }
        let step_duration = duration / self.steps.len() as u32;
        debug!(
            dance_move = self.name,
            steps = self.steps.len(),
            step_ms = step_duration.as_millis() as u64,
            "move started"
        );
        for step in &self.steps {
            let completed = step.run(session, step_duration).await?;
            if !completed {
                debug!(dance_move = self.name, step = step.name, "move interrupted");
                return Ok(false);
            }
            if let Some(state) = turn_state.as_deref_mut() {
                state.record(step.turn_rate(), step_duration);
            }
        }
        Ok(true)
    }
}

/// Turn back by the accumulated balance at `speed` and zero it.
///
/// A non-positive speed or an already balanced state is a no-op.
///
/// # Errors
///
/// [`Go1Error::Validation`] when `speed` exceeds the axis range, or the
/// errors of the turn stream itself.
pub async fn balance_turn(
    session: &Session,
    turn_state: &mut TurnState,
    speed: f32,
) -> Result<(), Go1Error> {
    if speed.is_nan() || speed <= 0.0 || turn_state.is_balanced() {
        return Ok(());
    }
    let duration = Duration::try_from_secs_f32(turn_state.balance.abs() / speed)
        .map_err(|e| Go1Error::Validation(format!("cannot balance turn: {e}")))?;
    debug!(balance = turn_state.balance, duration_ms = duration.as_millis() as u64, "balancing turn");
    if turn_state.balance > 0.0 {
        session.turn_left(speed, duration).await?;
    } else {
        session.turn_right(speed, duration).await?;
    }
    turn_state.balance = 0.0;
    Ok(())
}

/// Play `dance_move`, then undo its net rotation when `balance_speed` is
/// given.
pub async fn run_move(
    session: &Session,
    dance_move: &DanceMove,
    duration: Duration,
    turn_state: &mut TurnState,
    balance_speed: Option<f32>,
) -> Result<bool, Go1Error> {
    let completed = dance_move.run(session, duration, Some(&mut *turn_state)).await?;
    if completed && let Some(speed) = balance_speed {
        balance_turn(session, turn_state, speed).await?;
    }
    Ok(completed)
}

/// Play the named moves in order, `move_duration` each.
///
/// # Errors
///
/// [`Go1Error::Validation`] for an unknown move name, checked before the
/// first move starts.
pub async fn perform_sequence(
    session: &Session,
    names: &[&str],
    move_duration: Duration,
    balance_speed: Option<f32>,
) -> Result<TurnState, Go1Error> {
    let moves = names
        .iter()
        .map(|name| {
            find_move(name).ok_or_else(|| Go1Error::Validation(format!("unknown dance move `{name}`")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut turn_state = TurnState::default();
    for (i, dance_move) in moves.iter().enumerate() {
        info!(index = i + 1, total = moves.len(), dance_move = dance_move.name, "dance move");
        if !run_move(session, dance_move, move_duration, &mut turn_state, balance_speed).await? {
            break;
        }
    }
    Ok(turn_state)
}

/// The built-in moves.
pub fn catalogue() -> Vec<DanceMove> {
    vec![
        DanceMove {
            name: "head_bob",
            description: "Simple down/up head bob.",
            steps: vec![
                DanceStep::axis("look_down", Motion::LookDown, 0.6),
                DanceStep::axis("look_up", Motion::LookUp, 0.6),
            ],
        },
        DanceMove {
            name: "side_sway",
            description: "Lean left, then right.",
            steps: vec![
                DanceStep::axis("lean_left", Motion::LeanLeft, 0.5),
                DanceStep::axis("lean_right", Motion::LeanRight, 0.5),
            ],
        },
        DanceMove {
            name: "twist",
            description: "Twist left, then right.",
            steps: vec![
                DanceStep::axis("twist_left", Motion::TwistLeft, 0.5),
                DanceStep::axis("twist_right", Motion::TwistRight, 0.5),
            ],
        },
        DanceMove {
            name: "bounce",
            description: "Extend up, then squat down.",
            steps: vec![
                DanceStep::axis("extend_up", Motion::ExtendUp, 0.5),
                DanceStep::axis("squat_down", Motion::SquatDown, 0.5),
            ],
        },
        DanceMove {
            name: "look_and_twist",
            description: "Mix head tilt and torso twist.",
            steps: vec![
                DanceStep::axis("look_down", Motion::LookDown, 0.5),
                DanceStep::axis("twist_left", Motion::TwistLeft, 0.4),
                DanceStep::axis("look_up", Motion::LookUp, 0.5),
                DanceStep::axis("twist_right", Motion::TwistRight, 0.4),
            ],
        },
        DanceMove {
            name: "body_wave",
            description: "Alternating lean, twist, look and extend poses.",
            steps: vec![
                DanceStep::pose("pose_left_up", -0.3, -0.2, 0.2, 0.2),
                DanceStep::pose("pose_right_down", 0.3, 0.2, -0.2, 0.2),
                DanceStep::pose("pose_left_down", -0.3, -0.2, -0.2, 0.2),
                DanceStep::pose("pose_right_up", 0.3, 0.2, 0.2, 0.2),
            ],
        },
        DanceMove {
            name: "pause",
            description: "Hold still for a beat.",
            steps: vec![DanceStep::wait("wait")],
        },
        DanceMove {
            name: "turn_left",
            description: "Turn left in place.",
            steps: vec![DanceStep::turn("turn_left", TurnDirection::Left, 0.4)],
        },
        DanceMove {
            name: "turn_right",
            description: "Turn right in place.",
            steps: vec![DanceStep::turn("turn_right", TurnDirection::Right, 0.4)],
        },
        DanceMove {
            name: "turn_left_right",
            description: "Turn left, then right to return to heading.",
            steps: vec![
                DanceStep::turn("turn_left", TurnDirection::Left, 0.4),
                DanceStep::turn("turn_right", TurnDirection::Right, 0.4),
            ],
        },
    ]
}

pub fn find_move(name: &str) -> Option<DanceMove> {
    catalogue().into_iter().find(|m| m.name == name)
}

/// Repeat `pattern` until `count` items, truncating the last repetition.
/// An empty pattern yields an empty sequence.
pub fn build_sequence<T: Clone>(pattern: &[T], count: usize) -> Vec<T> {
    pattern.iter().cycle().take(count).cloned().collect()
}

fn check_bpm(bpm: f32) -> Result<(), Go1Error> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(())
    } else {
        Err(Go1Error::Validation(format!("tempo must be a positive BPM, got {bpm}")))
    }
}

/// Length of one beat at `bpm`.
pub fn beat_duration(bpm: f32) -> Result<Duration, Go1Error> {
    check_bpm(bpm)?;
    Duration::try_from_secs_f32(60.0 / bpm)
        .map_err(|e| Go1Error::Validation(format!("tempo {bpm} BPM: {e}")))
}

/// Length of `beats` beats at `bpm`.
pub fn beats_duration(beats: u32, bpm: f32) -> Result<Duration, Go1Error> {
    beat_duration(bpm)?
        .checked_mul(beats)
        .ok_or_else(|| Go1Error::Validation(format!("{beats} beats at {bpm} BPM is out of range")))
}

/// Fold a detected tempo into `80..=200` BPM by doubling or halving.
pub fn normalize_bpm(bpm: f32) -> Result<f32, Go1Error> {
    check_bpm(bpm)?;
    let mut bpm = bpm;
    while bpm < 80.0 {
        bpm *= 2.0;
    }
    while bpm > 200.0 {
        bpm /= 2.0;
    }
    Ok(bpm)
}
