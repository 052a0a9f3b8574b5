//! Unified action execution interface and shared types.
//!
//! Defines [`ActionExecutor`], the trait the scheduler drives for every
//! step and rollback invocation, along with [`ActionRequest`],
//! [`ActionOutcome`], and [`ExecutorError`]. The trait is object-safe so
//! deployments can swap executor backends behind an `Arc<dyn ActionExecutor>`.

use serde_json::Value;

use crate::directory::DeviceRecord;

/// Input for a single action invocation against a single device.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    /// Executor family declared by the step (e.g. `"ansible"`).
    pub executor_type: String,
    /// Name of the action to run (e.g. a playbook name).
    pub action_name: String,
    /// Resolved addressing info for the target device.
    pub device: DeviceRecord,
    /// Instance-level vars overlaid with the step's own `extra_vars`.
    pub extra_vars: Option<Value>,
    /// Secret reference resolved by the executor at invocation time.
    /// Implementations must keep it out of log output.
    pub vault_secret_id: Option<String>,
}

/// Result of an action invocation that ran to completion.
///
/// An unsuccessful outcome (`success == false`) is an action-level failure
/// (the playbook ran and reported an error); transport-level problems are
/// reported as [`ExecutorError`] instead. The scheduler records both the
/// same way.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub success: bool,
    /// Captured output, stored on the job record.
    pub log_output: String,
}

/// Errors raised before or instead of an action outcome.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The executor does not handle the requested executor family.
    #[error("Unsupported executor type: {0}")]
    Unsupported(String),

    /// The action name failed the executor's safety rules.
    #[error("Invalid action name: {0}")]
    InvalidAction(String),

    /// The action process could not be spawned.
    #[error("Failed to spawn action process: {0}")]
    Spawn(#[from] std::io::Error),

    /// The action exceeded the executor's configured timeout and was
    /// killed. This is how the scheduler's bounded-return assumption is
    /// enforced.
    #[error("Action timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

/// Trait implemented by action execution backends.
///
/// Implementations must be idempotent-safe to retry at the caller's
/// discretion; the scheduler itself never retries a failed step.
#[async_trait::async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Run `request.action_name` against `request.device`, returning the
    /// outcome or a transport-level error.
    async fn execute(&self, request: &ActionRequest) -> Result<ActionOutcome, ExecutorError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
