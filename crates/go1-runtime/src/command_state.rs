//! [`CommandState`] – the caller's current stick axes.
//!
//! The four axes are stored as one immutable [`AxisCommand`] behind an
//! [`ArcSwap`].  A write builds and validates a whole new value before
//! swapping it in, so a snapshot always holds the four axes of exactly one
//! write.

use std::sync::Arc;

use arc_swap::ArcSwap;
use go1_types::{AxisCommand, Go1Error};
use tracing::debug;

pub struct CommandState {
    current: ArcSwap<AxisCommand>,
}

impl CommandState {
    /// Start at [`AxisCommand::NEUTRAL`].
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(AxisCommand::NEUTRAL),
        }
    }

    /// Replace all four axes.
    ///
    /// # Errors
    ///
    /// [`Go1Error::Validation`] when any value is non-finite or outside
    /// `[-1.0, 1.0]`.  The previous command is kept.
    pub fn set_axes(&self, strafe: f32, turn: f32, tilt: f32, forward: f32) -> Result<(), Go1Error> {
        self.set(AxisCommand {
            strafe,
            turn,
            tilt,
            forward,
        })
    }

    /// Whole-struct form of [`set_axes`][Self::set_axes].
    pub fn set(&self, cmd: AxisCommand) -> Result<(), Go1Error> {
        cmd.validate()?;
        debug!(
            strafe = cmd.strafe,
            turn = cmd.turn,
            tilt = cmd.tilt,
            forward = cmd.forward,
            "axes updated"
        );
        self.current.store(Arc::new(cmd));
        Ok(())
    }

    pub fn reset(&self) {
        self.current.store(Arc::new(AxisCommand::NEUTRAL));
    }

    pub fn snapshot(&self) -> AxisCommand {
        **self.current.load()
    }
}

impl Default for CommandState {
    fn default() -> Self {
        Self::new()
    }
}
