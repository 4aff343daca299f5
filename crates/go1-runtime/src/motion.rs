//! Named motions on top of the stick stream.
//!
//! Every helper replaces all four axes with the motion's command and streams
//! it for the requested duration.  The axes are left as set afterwards; the
//! robot stops on its own once the stream stops.
//!
//! The same axis means different things per mode: in walk mode `strafe`,
//! `turn` and `forward` move the robot, in stand mode they lean, twist and
//! raise the body in place.

use std::time::Duration;

use go1_types::{AxisCommand, Go1Error};

use crate::session::Session;
use crate::stream::StreamReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Motion {
    Forward,
    Backward,
    Left,
    Right,
    TurnLeft,
    TurnRight,
    LookUp,
    LookDown,
    LeanLeft,
    LeanRight,
    TwistLeft,
    TwistRight,
    ExtendUp,
    SquatDown,
}

impl Motion {
    pub const ALL: [Motion; 14] = [
        Motion::Forward,
        Motion::Backward,
        Motion::Left,
        Motion::Right,
        Motion::TurnLeft,
        Motion::TurnRight,
        Motion::LookUp,
        Motion::LookDown,
        Motion::LeanLeft,
        Motion::LeanRight,
        Motion::TwistLeft,
        Motion::TwistRight,
        Motion::ExtendUp,
        Motion::SquatDown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Motion::Forward => "go_forward",
            Motion::Backward => "go_backward",
            Motion::Left => "go_left",
            Motion::Right => "go_right",
            Motion::TurnLeft => "turn_left",
            Motion::TurnRight => "turn_right",
            Motion::LookUp => "look_up",
            Motion::LookDown => "look_down",
            Motion::LeanLeft => "lean_left",
            Motion::LeanRight => "lean_right",
            Motion::TwistLeft => "twist_left",
            Motion::TwistRight => "twist_right",
            Motion::ExtendUp => "extend_up",
            Motion::SquatDown => "squat_down",
        }
    }

    /// The command for this motion at `speed`, every other axis neutral.
    ///
    /// # Errors
    ///
    /// [`Go1Error::Validation`] when `speed` is not a valid axis value.
    pub fn axes(self, speed: f32) -> Result<AxisCommand, Go1Error> {
        let (strafe, turn, tilt, forward) = match self {
            Motion::Forward | Motion::ExtendUp => (0.0, 0.0, 0.0, speed),
            Motion::Backward | Motion::SquatDown => (0.0, 0.0, 0.0, -speed),
            Motion::Left | Motion::LeanLeft => (-speed, 0.0, 0.0, 0.0),
            Motion::Right | Motion::LeanRight => (speed, 0.0, 0.0, 0.0),
            Motion::TurnLeft | Motion::TwistLeft => (0.0, -speed, 0.0, 0.0),
            Motion::TurnRight | Motion::TwistRight => (0.0, speed, 0.0, 0.0),
            Motion::LookUp => (0.0, 0.0, speed, 0.0),
            Motion::LookDown => (0.0, 0.0, -speed, 0.0),
        };
        AxisCommand::new(strafe, turn, tilt, forward)
            .map_err(|e| Go1Error::Validation(format!("{}: {e}", self.name())))
    }
}

impl std::fmt::Display for Motion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Session {
    /// Stream `motion` at `speed` for `duration`.
    pub async fn perform(
        &self,
        motion: Motion,
        speed: f32,
        duration: Duration,
    ) -> Result<StreamReport, Go1Error> {
        self.set_command(motion.axes(speed)?)?;
        self.stream(duration).await
    }

    pub async fn go_forward(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::Forward, speed, duration).await
    }

    pub async fn go_backward(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::Backward, speed, duration).await
    }

    pub async fn go_left(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::Left, speed, duration).await
    }

    pub async fn go_right(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::Right, speed, duration).await
    }

    pub async fn turn_left(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::TurnLeft, speed, duration).await
    }

    pub async fn turn_right(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::TurnRight, speed, duration).await
    }

    pub async fn look_up(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::LookUp, speed, duration).await
    }

    pub async fn look_down(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::LookDown, speed, duration).await
    }

    pub async fn lean_left(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::LeanLeft, speed, duration).await
    }

    pub async fn lean_right(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::LeanRight, speed, duration).await
    }

    pub async fn twist_left(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::TwistLeft, speed, duration).await
    }

    pub async fn twist_right(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::TwistRight, speed, duration).await
    }

    pub async fn extend_up(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::ExtendUp, speed, duration).await
    }

    pub async fn squat_down(&self, speed: f32, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.perform(Motion::SquatDown, speed, duration).await
    }

    /// Hold a combined body pose: `lean` on strafe, `twist` on turn, `look`
    /// on tilt and `extend` on forward.
    pub async fn pose(
        &self,
        lean: f32,
        twist: f32,
        look: f32,
        extend: f32,
        duration: Duration,
    ) -> Result<StreamReport, Go1Error> {
        self.set_axes(lean, twist, look, extend)?;
        self.stream(duration).await
    }

    /// Stream neutral axes so the body settles back to its default posture.
    pub async fn reset_body(&self, duration: Duration) -> Result<StreamReport, Go1Error> {
        self.reset_axes();
        self.stream(duration).await
    }
}
