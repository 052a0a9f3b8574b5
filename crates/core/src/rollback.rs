//! Rollback pass planning.
//!
//! When a step fails on a device, the steps that already completed on that
//! device are unwound in reverse execution order, invoking each step's
//! declared `rollback_action`. Steps without a rollback action are simply
//! not part of the plan.

use std::collections::HashSet;

use crate::template::WorkflowStep;

/// One entry in a device's rollback plan.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackEntry {
    /// Order of the step being compensated.
    pub step_order: u32,
    /// The compensating action to run.
    pub action_name: String,
    /// Executor family of the original step; the rollback action runs
    /// through the same family.
    pub executor_type: String,
    /// The original step's extra vars, forwarded to the rollback action.
    pub extra_vars: Option<serde_json::Value>,
}

/// Compute the rollback plan for a device after `failed_order` failed.
///
/// Selects every step with order strictly below `failed_order` that both
/// completed on the device and declares a `rollback_action`, in descending
/// order. `steps` may be in any order; `completed` holds the orders that
/// finished successfully on this device.
pub fn rollback_plan(
    steps: &[WorkflowStep],
    completed: &HashSet<u32>,
    failed_order: u32,
) -> Vec<RollbackEntry> {
    let mut plan: Vec<RollbackEntry> = steps
        .iter()
        .filter(|s| s.order < failed_order && completed.contains(&s.order))
        .filter_map(|s| {
            s.rollback_action.as_ref().map(|action| RollbackEntry {
                step_order: s.order,
                action_name: action.clone(),
                executor_type: s.executor_type.clone(),
                extra_vars: s.extra_vars.clone(),
            })
        })
        .collect();
    plan.sort_by(|a, b| b.step_order.cmp(&a.step_order));
    plan
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
