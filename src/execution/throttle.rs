//! Dispatch throttle - spacing between admin calls

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Policy for calls that never complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StallPolicy {
    /// Fail a call after this long; `None` waits forever
    pub item_timeout: Option<Duration>,
}

/// Minimum spacing between dispatches
///
/// Both delays are lower bounds: a scheduled action never runs early but
/// may run late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    subtask_interval: Duration,
    stage_settle_delay: Duration,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::uniform(Duration::from_millis(500))
    }
}

impl Throttle {
    pub fn new(subtask_interval: Duration, stage_settle_delay: Duration) -> Self {
        Self {
            subtask_interval,
            stage_settle_delay,
        }
    }

    /// Same spacing for fan-out calls and stage transitions
    pub fn uniform(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    pub fn subtask_interval(&self) -> Duration {
        self.subtask_interval
    }

    pub fn stage_settle_delay(&self) -> Duration {
        self.stage_settle_delay
    }

    /// Delay of fan-out item `sequence_index` from stage start
    pub fn fan_out_offset(&self, sequence_index: usize) -> Duration {
        self.subtask_interval
            .saturating_mul(u32::try_from(sequence_index).unwrap_or(u32::MAX))
    }

    /// Run `action` no earlier than `delay` from now, unless `token` is
    /// cancelled first
    ///
    /// Returns immediately; the action runs on its own task.
    pub fn schedule_after<F>(&self, delay: Duration, token: CancellationToken, action: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        action.await;
                    }
                }
            }
        })
    }
}
