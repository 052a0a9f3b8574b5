//! Step job models: one record per step (or rollback) execution on a device.

use serde::{Deserialize, Serialize};

use homelab_core::status::JobStatus;
use homelab_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// The record of one step's execution (or rollback execution) against one
/// device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepJob {
    pub id: DbId,
    pub instance_id: DbId,
    pub device_id: String,
    pub step_order: u32,
    pub action_name: String,
    pub executor_type: String,
    /// True for compensating executions recorded during a rollback pass.
    pub is_rollback: bool,
    pub status: JobStatus,
    /// Captured executor output; empty until the job finishes.
    pub log_output: String,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Input for inserting a job record.
#[derive(Debug, Clone)]
pub struct NewStepJob {
    pub instance_id: DbId,
    pub device_id: String,
    pub step_order: u32,
    pub action_name: String,
    pub executor_type: String,
    pub is_rollback: bool,
    /// Initial status: `Running` for dispatched work, `Skipped` for steps
    /// suppressed by an earlier failure or cancellation.
    pub status: JobStatus,
}
