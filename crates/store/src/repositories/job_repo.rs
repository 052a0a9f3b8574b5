//! Repository for step job records.

use chrono::Utc;

use homelab_core::status::JobStatus;
use homelab_core::types::DbId;

use crate::models::job::{NewStepJob, StepJob};
use crate::Store;

/// Provides persistence for per-device, per-step execution records.
pub struct JobRepo;

impl JobRepo {
    /// Insert a job record. `Running` jobs get `started_at` stamped;
    /// `Skipped` jobs carry no timestamps or log output.
    pub async fn insert(store: &Store, input: NewStepJob) -> StepJob {
        let job = StepJob {
            id: store.next_job_id(),
            instance_id: input.instance_id,
            device_id: input.device_id,
            step_order: input.step_order,
            action_name: input.action_name,
            executor_type: input.executor_type,
            is_rollback: input.is_rollback,
            status: input.status,
            log_output: String::new(),
            started_at: (input.status == JobStatus::Running).then(Utc::now),
            finished_at: None,
        };

        let mut jobs = store.jobs().write().await;
        jobs.insert(job.id, job.clone());
        job
    }

    /// Record a dispatched job's final status and captured log output.
    pub async fn finish(store: &Store, id: DbId, status: JobStatus, log_output: String) {
        let mut jobs = store.jobs().write().await;
        if let Some(job) = jobs.get_mut(&id) {
            job.status = status;
            job.log_output = log_output;
            job.finished_at = Some(Utc::now());
        }
    }

    /// All job records for an instance, ordered by id ascending (dispatch
    /// order within each device).
    pub async fn list_by_instance(store: &Store, instance_id: DbId) -> Vec<StepJob> {
        store
            .jobs()
            .read()
            .await
            .values()
            .filter(|j| j.instance_id == instance_id)
            .cloned()
            .collect()
    }

    /// Count job records for an instance.
    pub async fn count_for_instance(store: &Store, instance_id: DbId) -> i64 {
        store
            .jobs()
            .read()
            .await
            .values()
            .filter(|j| j.instance_id == instance_id)
            .count() as i64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
