//! Workflow step types and step-graph validation.
//!
//! A template's steps form an implicit DAG: each step may only depend on
//! steps with a strictly lower `order`, which rules out cycles by
//! construction. Validation runs at template write time and again,
//! defensively, when an instance is started.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Executor family used when a step does not specify one.
pub const DEFAULT_EXECUTOR_TYPE: &str = "ansible";

/// Maximum length of a template name.
const MAX_NAME_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A single step embedded in a workflow template.
///
/// Steps are identified by their `order` value, which is unique within the
/// owning template and doubles as the handle used by `depends_on` and by
/// job records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Execution position; unique within the template. The type rules out
    /// negative values.
    pub order: u32,
    /// Name of the action the executor runs (e.g. a playbook name).
    pub action_name: String,
    /// Executor family handling this step.
    #[serde(default = "default_executor_type")]
    pub executor_type: String,
    /// Orders of steps that must have completed on the same device before
    /// this step may start. Every entry must be strictly lower than `order`.
    #[serde(default)]
    pub depends_on: Vec<u32>,
    /// Compensating action run during a rollback pass if the workflow fails
    /// after this step completed on a device.
    #[serde(default)]
    pub rollback_action: Option<String>,
    /// Free-form payload forwarded to the executor for this step.
    #[serde(default)]
    pub extra_vars: Option<serde_json::Value>,
}

fn default_executor_type() -> String {
    DEFAULT_EXECUTOR_TYPE.to_string()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a template name.
///
/// Rules:
/// - Must not be empty (after trimming).
/// - Must not exceed `MAX_NAME_LEN` characters.
pub fn validate_template_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Template name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Template name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate a template's step graph.
///
/// Rules:
/// - At least one step.
/// - Every step has a non-empty `action_name` and `executor_type`.
/// - No duplicate `order` values.
/// - Every `depends_on` entry references an existing `order` strictly
///   lower than the step's own (forward-only references).
///
/// The first failing check is reported.
pub fn validate_steps(steps: &[WorkflowStep]) -> Result<(), CoreError> {
    if steps.is_empty() {
        return Err(CoreError::Validation(
            "A template must contain at least one step".to_string(),
        ));
    }

    let mut seen_orders = std::collections::HashSet::with_capacity(steps.len());
    for step in steps {
        if step.action_name.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Step {} is missing an action name",
                step.order
            )));
        }
        if step.executor_type.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Step {} has an empty executor type",
                step.order
            )));
        }
        if !seen_orders.insert(step.order) {
            return Err(CoreError::Validation(format!(
                "Duplicate step order: {}",
                step.order
            )));
        }
    }

    for step in steps {
        for dep in &step.depends_on {
            if *dep >= step.order {
                return Err(CoreError::Validation(format!(
                    "Step {} depends on step {}, but dependencies must \
                     reference strictly lower orders",
                    step.order, dep
                )));
            }
            if !seen_orders.contains(dep) {
                return Err(CoreError::Validation(format!(
                    "Step {} depends on step {}, which does not exist",
                    step.order, dep
                )));
            }
        }
    }

    Ok(())
}

/// Return the steps sorted by ascending `order`.
///
/// Execution and snapshotting both want a canonical ordering regardless of
/// how the caller arranged the input list.
pub fn sorted_by_order(mut steps: Vec<WorkflowStep>) -> Vec<WorkflowStep> {
    steps.sort_by_key(|s| s.order);
    steps
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
