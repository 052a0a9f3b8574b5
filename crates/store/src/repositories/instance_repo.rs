//! Repository for workflow instances.
//!
//! Status writes go through guarded transitions under the store's write
//! lock, so concurrent per-device tasks cannot produce an illegal state or
//! a lost update. Terminal instances are immutable.

use chrono::Utc;

use homelab_core::error::{CoreError, CoreResult};
use homelab_core::status::{DeviceOutcome, InstanceStatus};
use homelab_core::types::DbId;

use crate::models::instance::{InstanceFilter, NewInstance, WorkflowInstance};
use crate::{clamp_limit, clamp_offset, Store};

/// Provides persistence and guarded status transitions for instances.
pub struct InstanceRepo;

impl InstanceRepo {
    /// Insert a new instance in `pending` status.
    pub async fn create(store: &Store, input: NewInstance) -> WorkflowInstance {
        let instance = WorkflowInstance {
            id: store.next_instance_id(),
            template_id: input.template_id,
            template_name: input.template_name,
            steps: input.steps,
            device_ids: input.device_ids,
            rollback_on_failure: input.rollback_on_failure,
            extra_vars: input.extra_vars,
            vault_secret_id: input.vault_secret_id,
            status: InstanceStatus::Pending,
            device_statuses: Default::default(),
            cancel_requested: false,
            started_at: Utc::now(),
            completed_at: None,
        };

        let mut instances = store.instances().write().await;
        instances.insert(instance.id, instance.clone());
        instance
    }

    /// Find an instance by its primary key.
    pub async fn find_by_id(store: &Store, id: DbId) -> Option<WorkflowInstance> {
        store.instances().read().await.get(&id).cloned()
    }

    /// List instances ordered by id descending (newest first; ids are
    /// monotonic, so this matches start-time ordering and is stable).
    /// Filters are AND-combined.
    pub async fn list(store: &Store, filter: &InstanceFilter) -> Vec<WorkflowInstance> {
        let limit = clamp_limit(filter.limit) as usize;
        let offset = clamp_offset(filter.offset) as usize;
        store
            .instances()
            .read()
            .await
            .values()
            .rev()
            .filter(|i| filter.template_id.is_none_or(|t| i.template_id == t))
            .filter(|i| filter.status.is_none_or(|s| i.status == s))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Transition `pending -> running`, stamping nothing else. Returns
    /// `false` if the instance is not `pending` (e.g. cancelled first).
    pub async fn mark_running(store: &Store, id: DbId) -> bool {
        let mut instances = store.instances().write().await;
        match instances.get_mut(&id) {
            Some(i) if i.status == InstanceStatus::Pending => {
                i.status = InstanceStatus::Running;
                true
            }
            _ => false,
        }
    }

    /// Transition `running -> rolling_back`. Returns `false` if the
    /// instance is in any other state (including already `rolling_back`,
    /// when another device's rollback pass got there first).
    pub async fn mark_rolling_back(store: &Store, id: DbId) -> bool {
        let mut instances = store.instances().write().await;
        match instances.get_mut(&id) {
            Some(i) if i.status == InstanceStatus::Running => {
                i.status = InstanceStatus::RollingBack;
                true
            }
            _ => false,
        }
    }

    /// Record one device's final outcome. Each device task writes only its
    /// own entry.
    pub async fn set_device_status(
        store: &Store,
        id: DbId,
        device_id: &str,
        outcome: DeviceOutcome,
    ) {
        let mut instances = store.instances().write().await;
        if let Some(i) = instances.get_mut(&id) {
            i.device_statuses.insert(device_id.to_string(), outcome);
        }
    }

    /// Write the terminal status and `completed_at`. The single writer is
    /// the coordinator task, after every device outcome has been collected.
    pub async fn finalize(
        store: &Store,
        id: DbId,
        status: InstanceStatus,
    ) -> CoreResult<WorkflowInstance> {
        debug_assert!(status.is_terminal());

        let mut instances = store.instances().write().await;
        let instance = instances.get_mut(&id).ok_or(CoreError::NotFound {
            entity: "WorkflowInstance",
            id,
        })?;

        if !instance.status.can_transition_to(status) {
            return Err(CoreError::Internal(format!(
                "Illegal instance transition: {} -> {}",
                instance.status, status
            )));
        }

        instance.status = status;
        instance.completed_at = Some(Utc::now());
        Ok(instance.clone())
    }

    /// Accept a cancellation request. Fails with `Conflict` if the
    /// instance is already terminal.
    pub async fn request_cancel(store: &Store, id: DbId) -> CoreResult<WorkflowInstance> {
        let mut instances = store.instances().write().await;
        let instance = instances.get_mut(&id).ok_or(CoreError::NotFound {
            entity: "WorkflowInstance",
            id,
        })?;

        if instance.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Instance {id} is already {} and cannot be cancelled",
                instance.status
            )));
        }

        instance.cancel_requested = true;
        Ok(instance.clone())
    }

    /// Whether any non-terminal instance references the given template.
    /// Used by the template-deletion policy.
    pub async fn has_active_for_template(store: &Store, template_id: DbId) -> bool {
        store
            .instances()
            .read()
            .await
            .values()
            .any(|i| i.template_id == template_id && !i.status.is_terminal())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
