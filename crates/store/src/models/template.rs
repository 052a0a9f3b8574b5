//! Workflow template models and DTOs.

use serde::{Deserialize, Serialize};

use homelab_core::template::WorkflowStep;
use homelab_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A stored workflow template: a named, ordered, validated step graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    /// Steps sorted by ascending `order`.
    pub steps: Vec<WorkflowStep>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Input for creating a new template.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplate {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<WorkflowStep>,
}

/// Input for updating an existing template.
///
/// The step list is replaced wholesale; in-flight and historical instances
/// are unaffected because they hold their own snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTemplate {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<WorkflowStep>,
}
