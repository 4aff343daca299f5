//! [`CommandStreamPublisher`] – the timed stick publish loop.
//!
//! A stream of duration `D` at interval `P` publishes `ceil(D / P)` ticks.
//! Tick `i` fires at `start + i·P`, and the loop returns at `start + D`
//! unless it is cancelled first.  Ticks are scheduled against absolute
//! deadlines, so a slow publish shortens the following wait instead of
//! drifting the cadence.

use std::sync::Arc;
use std::time::Duration;

use go1_middleware::{Transport, codec, topics};
use go1_types::Go1Error;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command_state::CommandState;

/// Cadence used when the caller does not pick one.
pub const DEFAULT_STREAM_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of one [`CommandStreamPublisher::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamReport {
    /// Ticks the duration called for.
    pub planned: u32,
    pub published: u32,
    /// Ticks whose publish the transport rejected.
    pub failed: u32,
    /// `true` when the loop stopped early on its cancellation token.
    pub cancelled: bool,
}

/// Number of ticks in a stream: `ceil(duration / interval)`, saturating at
/// `u32::MAX`.  A zero interval yields zero.
pub fn tick_count(duration: Duration, interval: Duration) -> u32 {
    let interval = interval.as_nanos();
    if interval == 0 {
        return 0;
    }
    let ticks = duration.as_nanos().div_ceil(interval);
    u32::try_from(ticks).unwrap_or(u32::MAX)
}

pub struct CommandStreamPublisher {
    transport: Arc<dyn Transport>,
    command: Arc<CommandState>,
}

impl CommandStreamPublisher {
    pub fn new(transport: Arc<dyn Transport>, command: Arc<CommandState>) -> Self {
        Self { transport, command }
    }

    /// Publish the current axes every `interval` for `duration`.
    ///
    /// Each tick takes a fresh [`CommandState`] snapshot, so axis changes
    /// made mid-stream show up on the next tick.  A rejected publish is
    /// counted and the loop moves on.  Once `cancel` fires no further
    /// publish is attempted, a publish still in flight is dropped, and the
    /// call returns `Ok` with [`StreamReport::cancelled`] set.
    ///
    /// # Errors
    ///
    /// [`Go1Error::Validation`] for a zero interval or a duration too large
    /// to schedule.
    pub async fn run(
        &self,
        duration: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<StreamReport, Go1Error> {
        if interval.is_zero() {
            return Err(Go1Error::Validation(
                "stream interval must be greater than zero".to_string(),
            ));
        }
        let planned = tick_count(duration, interval);
        let mut report = StreamReport {
            planned,
            ..StreamReport::default()
        };
        if planned == 0 {
            return Ok(report);
        }

        let start = Instant::now();
        let deadline = start.checked_add(duration).ok_or_else(|| {
            Go1Error::Validation(format!("stream duration {duration:?} is out of range"))
        })?;
        debug!(
            duration_ms = duration.as_millis() as u64,
            interval_ms = interval.as_millis() as u64,
            ticks = planned,
            "stream started"
        );

        for tick in 0..planned {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let payload = codec::encode_stick(&self.command.snapshot());
            // A stalled publish must not outlive the token.
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                res = self.transport.publish(topics::STICK, payload) => Some(res),
            };
            match outcome {
                Some(Ok(())) => report.published += 1,
                Some(Err(e)) => {
                    report.failed += 1;
                    warn!(tick, error = %e, "stick publish failed; continuing");
                }
                None => {
                    warn!(tick, "stick publish abandoned on cancellation");
                    report.cancelled = true;
                    break;
                }
            }

            // The last tick waits for the full duration.
            let next = interval
                .checked_mul(tick + 1)
                .and_then(|offset| start.checked_add(offset))
                .map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                _ = sleep_until(next) => {}
            }
        }

        if report.cancelled {
            info!(
                published = report.published,
                planned = report.planned,
                "stream cancelled"
            );
        } else {
            debug!(
                published = report.published,
                failed = report.failed,
                "stream finished"
            );
        }
        Ok(report)
    }
}
