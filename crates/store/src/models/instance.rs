//! Workflow instance models and DTOs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use homelab_core::status::{DeviceOutcome, InstanceStatus};
use homelab_core::template::WorkflowStep;
use homelab_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// One execution run of a template against a set of devices.
///
/// The template's steps are snapshotted at start time, so template edits and
/// deletions never affect an in-flight or historical instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: DbId,
    pub template_id: DbId,
    /// Denormalized label; survives template deletion.
    pub template_name: String,
    /// Step snapshot taken at start, sorted by ascending `order`.
    pub steps: Vec<WorkflowStep>,
    pub device_ids: Vec<String>,
    pub rollback_on_failure: bool,
    /// Instance-level vars overlaid with each step's own `extra_vars`.
    pub extra_vars: Option<serde_json::Value>,
    /// Secret reference handed to the executor per invocation. Never
    /// serialized out of the service and never written to job logs.
    #[serde(skip_serializing)]
    #[serde(default)]
    pub vault_secret_id: Option<String>,
    pub status: InstanceStatus,
    /// Final outcome per device, filled in as each device's task finishes.
    pub device_statuses: BTreeMap<String, DeviceOutcome>,
    /// Set by a cancel request; consulted before every step dispatch.
    pub cancel_requested: bool,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Input for persisting a new instance (built by the scheduler after
/// validation and template snapshotting).
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub template_id: DbId,
    pub template_name: String,
    pub steps: Vec<WorkflowStep>,
    pub device_ids: Vec<String>,
    pub rollback_on_failure: bool,
    pub extra_vars: Option<serde_json::Value>,
    pub vault_secret_id: Option<String>,
}

/// AND-combined filters for instance listing.
#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    pub template_id: Option<DbId>,
    pub status: Option<InstanceStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
