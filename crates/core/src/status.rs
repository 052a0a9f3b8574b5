//! Instance, device, and job status machines.
//!
//! An instance's aggregate status is never written incrementally: each
//! per-device task produces a [`DeviceOutcome`], and the coordinator folds
//! the full set with [`aggregate_instance_status`] exactly once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Instance status
// ---------------------------------------------------------------------------

/// Lifecycle status of a workflow instance.
///
/// Transitions: `pending -> running -> {completed, failed, cancelled,
/// rolling_back}`; `rolling_back -> {rolled_back, failed}`. No transition
/// leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    RollingBack,
    RolledBack,
}

impl InstanceStatus {
    /// Whether this status is terminal. Terminal instances are immutable.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::RolledBack
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Cancelled),
            Self::Running => matches!(
                next,
                Self::Completed | Self::Failed | Self::Cancelled | Self::RollingBack
            ),
            Self::RollingBack => matches!(next, Self::RolledBack | Self::Failed | Self::Cancelled),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::RollingBack => "rolling_back",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "rolling_back" => Ok(Self::RollingBack),
            "rolled_back" => Ok(Self::RolledBack),
            other => Err(format!("Unknown instance status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Status of a single step (or rollback) execution on one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Never dispatched because an earlier step on the same device failed
    /// or the instance was cancelled.
    Skipped,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Per-device outcome
// ---------------------------------------------------------------------------

/// Final result of one device's run, produced by its execution task.
///
/// A tagged variant rather than a set of flags so that states like
/// "rolled back out of a completed run" cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOutcome {
    /// Every step completed.
    Completed,
    /// A step failed and no rollback was requested.
    Failed,
    /// A step failed and every attempted rollback action succeeded.
    RolledBack,
    /// A step failed and at least one rollback action also failed; partial
    /// rollback progress is preserved in the job records.
    RollbackFailed,
    /// Cancellation suppressed at least part of this device's run.
    Cancelled,
}

impl DeviceOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
            Self::RollbackFailed => "rollback_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Fold a full set of per-device outcomes into the instance's terminal
/// status.
///
/// Precedence: cancellation anywhere wins; then any un-rolled-back failure
/// (including a failed rollback pass) makes the instance `failed`; then a
/// successful rollback anywhere makes it `rolled_back`; otherwise
/// `completed`.
pub fn aggregate_instance_status(outcomes: &[DeviceOutcome]) -> InstanceStatus {
    if outcomes.iter().any(|o| *o == DeviceOutcome::Cancelled) {
        return InstanceStatus::Cancelled;
    }
    if outcomes
        .iter()
        .any(|o| matches!(o, DeviceOutcome::Failed | DeviceOutcome::RollbackFailed))
    {
        return InstanceStatus::Failed;
    }
    if outcomes.iter().any(|o| *o == DeviceOutcome::RolledBack) {
        return InstanceStatus::RolledBack;
    }
    InstanceStatus::Completed
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
