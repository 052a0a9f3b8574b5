//! Workflow scheduler: drives one instance from `pending` to a terminal
//! state.
//!
//! Each target device runs as an independent task executing the step
//! snapshot strictly in ascending order; a device's failure or rollback
//! never touches another device's records. Device tasks report a single
//! [`DeviceOutcome`] over an mpsc channel, and the coordinator folds the
//! full set into the instance's terminal status in one write.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use homelab_core::error::{CoreError, CoreResult};
use homelab_core::rollback::rollback_plan;
use homelab_core::status::{aggregate_instance_status, DeviceOutcome, InstanceStatus, JobStatus};
use homelab_core::template::{validate_steps, WorkflowStep};
use homelab_core::types::DbId;

use homelab_store::models::instance::{NewInstance, WorkflowInstance};
use homelab_store::models::job::NewStepJob;
use homelab_store::repositories::{InstanceRepo, JobRepo, TemplateRepo};
use homelab_store::Store;

use crate::directory::{DeviceDirectory, DeviceRecord};
use crate::executor::{ActionExecutor, ActionRequest};

// ---------------------------------------------------------------------------
// Start input
// ---------------------------------------------------------------------------

/// Input for starting a workflow instance.
#[derive(Debug, Clone)]
pub struct StartWorkflow {
    pub template_id: DbId,
    pub device_ids: Vec<String>,
    pub rollback_on_failure: bool,
    pub extra_vars: Option<serde_json::Value>,
    pub vault_secret_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Owns instance execution: the only component that mutates instances and
/// jobs while a workflow runs.
pub struct WorkflowScheduler {
    store: Store,
    executor: Arc<dyn ActionExecutor>,
    directory: Arc<dyn DeviceDirectory>,
    /// Cancellation token per non-terminal instance.
    cancellations: Mutex<HashMap<DbId, CancellationToken>>,
}

impl WorkflowScheduler {
    pub fn new(
        store: Store,
        executor: Arc<dyn ActionExecutor>,
        directory: Arc<dyn DeviceDirectory>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            executor,
            directory,
            cancellations: Mutex::new(HashMap::new()),
        })
    }

    /// Validate, persist a `pending` instance, and spawn its run. Returns
    /// the instance immediately; callers observe progress by querying.
    pub async fn start(self: &Arc<Self>, input: StartWorkflow) -> CoreResult<WorkflowInstance> {
        let (instance, cancel) = self.prepare(input).await?;
        let scheduler = Arc::clone(self);
        let instance_id = instance.id;
        tokio::spawn(async move {
            scheduler.run(instance_id, cancel).await;
        });
        Ok(instance)
    }

    /// Validation and instance creation, split out from [`Self::start`] so
    /// callers that manage their own tasks (and tests) can interleave
    /// cancellation deterministically before [`Self::run`].
    pub async fn prepare(
        &self,
        input: StartWorkflow,
    ) -> CoreResult<(WorkflowInstance, CancellationToken)> {
        if input.device_ids.is_empty() {
            return Err(CoreError::Validation(
                "device_ids must not be empty".to_string(),
            ));
        }

        // Ordered set: drop duplicates, keep first occurrence.
        let mut seen = HashSet::new();
        let device_ids: Vec<String> = input
            .device_ids
            .into_iter()
            .filter(|d| seen.insert(d.clone()))
            .collect();

        for device_id in &device_ids {
            if self.directory.resolve(device_id).await.is_none() {
                return Err(CoreError::Validation(format!(
                    "Unknown device: {device_id}"
                )));
            }
        }

        let template = TemplateRepo::find_by_id(&self.store, input.template_id)
            .await
            .ok_or(CoreError::NotFound {
                entity: "Template",
                id: input.template_id,
            })?;

        // Defensive re-validation; templates are validated at write time,
        // but a corrupt step graph must never reach execution.
        validate_steps(&template.steps)?;

        let instance = InstanceRepo::create(
            &self.store,
            NewInstance {
                template_id: template.id,
                template_name: template.name.clone(),
                steps: template.steps,
                device_ids,
                rollback_on_failure: input.rollback_on_failure,
                extra_vars: input.extra_vars,
                vault_secret_id: input.vault_secret_id,
            },
        )
        .await;

        let cancel = CancellationToken::new();
        self.cancellations
            .lock()
            .await
            .insert(instance.id, cancel.clone());

        tracing::info!(
            instance_id = instance.id,
            template_id = template.id,
            template = %template.name,
            devices = instance.device_ids.len(),
            rollback_on_failure = instance.rollback_on_failure,
            "Workflow instance created",
        );

        Ok((instance, cancel))
    }

    /// Accept a cancellation request for a non-terminal instance.
    ///
    /// Cooperative: the flag is consulted before each subsequent step
    /// dispatch; in-flight executor calls run to completion.
    pub async fn cancel(&self, instance_id: DbId) -> CoreResult<WorkflowInstance> {
        let instance = InstanceRepo::request_cancel(&self.store, instance_id).await?;
        if let Some(token) = self.cancellations.lock().await.get(&instance_id) {
            token.cancel();
        }
        tracing::info!(instance_id, "Workflow cancellation requested");
        Ok(instance)
    }

    /// Drive an instance to a terminal state. Normally spawned by
    /// [`Self::start`].
    pub async fn run(self: Arc<Self>, instance_id: DbId, cancel: CancellationToken) {
        let Some(instance) = InstanceRepo::find_by_id(&self.store, instance_id).await else {
            tracing::error!(instance_id, "Instance disappeared before execution");
            return;
        };

        // Cancelled before anything was dispatched: terminal with zero
        // job records.
        if cancel.is_cancelled() || instance.cancel_requested {
            self.finish(instance_id, InstanceStatus::Cancelled).await;
            return;
        }

        InstanceRepo::mark_running(&self.store, instance_id).await;

        let device_count = instance.device_ids.len();
        let (tx, mut rx) = mpsc::channel::<(String, DeviceOutcome)>(device_count);

        for device_id in instance.device_ids.clone() {
            let scheduler = Arc::clone(&self);
            let tx = tx.clone();
            let cancel = cancel.clone();
            let ctx = DeviceRun {
                instance_id,
                device_id,
                steps: instance.steps.clone(),
                rollback_on_failure: instance.rollback_on_failure,
                extra_vars: instance.extra_vars.clone(),
                vault_secret_id: instance.vault_secret_id.clone(),
            };
            tokio::spawn(async move {
                let outcome = scheduler.run_device(&ctx, &cancel).await;
                InstanceRepo::set_device_status(
                    &scheduler.store,
                    ctx.instance_id,
                    &ctx.device_id,
                    outcome,
                )
                .await;
                // The coordinator never drops the receiver before draining
                // all device outcomes.
                let _ = tx.send((ctx.device_id, outcome)).await;
            });
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(device_count);
        while let Some((device_id, outcome)) = rx.recv().await {
            tracing::debug!(
                instance_id,
                device_id = %device_id,
                outcome = outcome.as_str(),
                "Device run finished",
            );
            outcomes.push(outcome);
        }

        self.finish(instance_id, aggregate_instance_status(&outcomes))
            .await;
    }

    /// Write the terminal status and drop the cancellation token.
    async fn finish(&self, instance_id: DbId, status: InstanceStatus) {
        match InstanceRepo::finalize(&self.store, instance_id, status).await {
            Ok(_) => {
                tracing::info!(instance_id, status = %status, "Workflow instance finished")
            }
            Err(e) => {
                tracing::error!(instance_id, error = %e, "Failed to finalize instance")
            }
        }
        self.cancellations.lock().await.remove(&instance_id);
    }

    /// Execute one device's steps strictly in ascending order, entering
    /// the rollback pass on failure when requested.
    async fn run_device(&self, ctx: &DeviceRun, cancel: &CancellationToken) -> DeviceOutcome {
        let Some(device) = self.directory.resolve(&ctx.device_id).await else {
            // Resolved at prepare time; the inventory changed underneath us.
            tracing::error!(
                instance_id = ctx.instance_id,
                device_id = %ctx.device_id,
                "Device vanished from the directory; skipping its steps",
            );
            self.record_skipped(ctx, &ctx.steps).await;
            return DeviceOutcome::Failed;
        };

        let mut completed: HashSet<u32> = HashSet::new();
        let mut failed_order: Option<u32> = None;

        for (idx, step) in ctx.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                self.record_skipped(ctx, &ctx.steps[idx..]).await;
                return DeviceOutcome::Cancelled;
            }

            // With sequential execution and fail-fast skipping this always
            // holds; it guards the invariant if the execution strategy
            // ever changes.
            if !step.depends_on.iter().all(|d| completed.contains(d)) {
                tracing::error!(
                    instance_id = ctx.instance_id,
                    device_id = %ctx.device_id,
                    step_order = step.order,
                    "Step has unmet dependencies; skipping remainder",
                );
                self.record_skipped(ctx, &ctx.steps[idx..]).await;
                failed_order = Some(step.order);
                break;
            }

            let job = JobRepo::insert(
                &self.store,
                NewStepJob {
                    instance_id: ctx.instance_id,
                    device_id: ctx.device_id.clone(),
                    step_order: step.order,
                    action_name: step.action_name.clone(),
                    executor_type: step.executor_type.clone(),
                    is_rollback: false,
                    status: JobStatus::Running,
                },
            )
            .await;

            let request = ActionRequest {
                executor_type: step.executor_type.clone(),
                action_name: step.action_name.clone(),
                device: device.clone(),
                extra_vars: merge_extra_vars(ctx.extra_vars.as_ref(), step.extra_vars.as_ref()),
                vault_secret_id: ctx.vault_secret_id.clone(),
            };

            if self.invoke(ctx, job.id, &request).await {
                completed.insert(step.order);
            } else {
                failed_order = Some(step.order);
                self.record_skipped(ctx, &ctx.steps[idx + 1..]).await;
                break;
            }
        }

        let Some(failed_order) = failed_order else {
            return DeviceOutcome::Completed;
        };

        if !ctx.rollback_on_failure {
            return DeviceOutcome::Failed;
        }

        self.run_rollback(ctx, &device, &completed, failed_order)
            .await
    }

    /// Dispatch one executor invocation and record the job result.
    /// Returns whether the invocation succeeded. Transport errors are
    /// recorded exactly like unsuccessful outcomes.
    async fn invoke(&self, ctx: &DeviceRun, job_id: DbId, request: &ActionRequest) -> bool {
        let (success, log_output) = match self.executor.execute(request).await {
            Ok(outcome) => (outcome.success, outcome.log_output),
            Err(e) => (false, e.to_string()),
        };

        let status = if success {
            JobStatus::Completed
        } else {
            tracing::warn!(
                instance_id = ctx.instance_id,
                device_id = %ctx.device_id,
                action = %request.action_name,
                "Action failed",
            );
            JobStatus::Failed
        };
        JobRepo::finish(&self.store, job_id, status, log_output).await;
        success
    }

    /// Best-effort reverse-order unwind of the device's completed steps.
    /// A rollback action failure is recorded and the pass continues.
    async fn run_rollback(
        &self,
        ctx: &DeviceRun,
        device: &DeviceRecord,
        completed: &HashSet<u32>,
        failed_order: u32,
    ) -> DeviceOutcome {
        InstanceRepo::mark_rolling_back(&self.store, ctx.instance_id).await;
        tracing::info!(
            instance_id = ctx.instance_id,
            device_id = %ctx.device_id,
            failed_order,
            "Entering rollback pass",
        );

        let mut all_succeeded = true;
        for entry in rollback_plan(&ctx.steps, completed, failed_order) {
            let job = JobRepo::insert(
                &self.store,
                NewStepJob {
                    instance_id: ctx.instance_id,
                    device_id: ctx.device_id.clone(),
                    step_order: entry.step_order,
                    action_name: entry.action_name.clone(),
                    executor_type: entry.executor_type.clone(),
                    is_rollback: true,
                    status: JobStatus::Running,
                },
            )
            .await;

            let request = ActionRequest {
                executor_type: entry.executor_type.clone(),
                action_name: entry.action_name.clone(),
                device: device.clone(),
                extra_vars: merge_extra_vars(ctx.extra_vars.as_ref(), entry.extra_vars.as_ref()),
                vault_secret_id: ctx.vault_secret_id.clone(),
            };

            if !self.invoke(ctx, job.id, &request).await {
                all_succeeded = false;
            }
        }

        if all_succeeded {
            DeviceOutcome::RolledBack
        } else {
            DeviceOutcome::RollbackFailed
        }
    }

    /// Record `skipped` job records for steps suppressed by a failure or
    /// cancellation.
    async fn record_skipped(&self, ctx: &DeviceRun, steps: &[WorkflowStep]) {
        for step in steps {
            JobRepo::insert(
                &self.store,
                NewStepJob {
                    instance_id: ctx.instance_id,
                    device_id: ctx.device_id.clone(),
                    step_order: step.order,
                    action_name: step.action_name.clone(),
                    executor_type: step.executor_type.clone(),
                    is_rollback: false,
                    status: JobStatus::Skipped,
                },
            )
            .await;
        }
    }
}

/// Per-device execution context, cloned into each device task.
#[derive(Debug, Clone)]
struct DeviceRun {
    instance_id: DbId,
    device_id: String,
    steps: Vec<WorkflowStep>,
    rollback_on_failure: bool,
    extra_vars: Option<serde_json::Value>,
    vault_secret_id: Option<String>,
}

/// Shallow-merge instance-level and step-level extra vars; step keys win.
/// Non-object values pass through, step value taking precedence.
fn merge_extra_vars(
    instance: Option<&serde_json::Value>,
    step: Option<&serde_json::Value>,
) -> Option<serde_json::Value> {
    match (instance, step) {
        (None, None) => None,
        (Some(v), None) | (None, Some(v)) => Some(v.clone()),
        (Some(serde_json::Value::Object(base)), Some(serde_json::Value::Object(overlay))) => {
            let mut merged = base.clone();
            for (k, v) in overlay {
                merged.insert(k.clone(), v.clone());
            }
            Some(serde_json::Value::Object(merged))
        }
        (Some(_), Some(step)) => Some(step.clone()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::executor::{ActionOutcome, ExecutorError};
    use assert_matches::assert_matches;
    use homelab_core::template::DEFAULT_EXECUTOR_TYPE;
    use homelab_store::models::instance::InstanceFilter;
    use homelab_store::models::job::StepJob;
    use homelab_store::models::template::CreateTemplate;

    /// Scripted executor: every action succeeds unless registered as a
    /// failure for a given (device, action) pair. Records all requests.
    #[derive(Default)]
    struct FakeExecutor {
        failures: std::sync::Mutex<HashSet<(String, String)>>,
        requests: std::sync::Mutex<Vec<ActionRequest>>,
    }

    impl FakeExecutor {
        fn fail(&self, device_id: &str, action: &str) {
            self.failures
                .lock()
                .unwrap()
                .insert((device_id.to_string(), action.to_string()));
        }

        fn requests(&self) -> Vec<ActionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ActionExecutor for FakeExecutor {
        async fn execute(&self, request: &ActionRequest) -> Result<ActionOutcome, ExecutorError> {
            self.requests.lock().unwrap().push(request.clone());
            let key = (request.device.id.clone(), request.action_name.clone());
            let success = !self.failures.lock().unwrap().contains(&key);
            Ok(ActionOutcome {
                success,
                log_output: format!("{} on {}", request.action_name, request.device.id),
            })
        }
    }

    fn directory() -> Arc<StaticDirectory> {
        Arc::new(StaticDirectory::new(vec![
            DeviceRecord {
                id: "nas".to_string(),
                name: None,
                address: "192.168.1.10".to_string(),
                ssh_user: None,
            },
            DeviceRecord {
                id: "pi".to_string(),
                name: None,
                address: "192.168.1.53".to_string(),
                ssh_user: None,
            },
        ]))
    }

    fn step(order: u32, action: &str, depends_on: Vec<u32>, rollback: Option<&str>) -> WorkflowStep {
        WorkflowStep {
            order,
            action_name: action.to_string(),
            executor_type: DEFAULT_EXECUTOR_TYPE.to_string(),
            depends_on,
            rollback_action: rollback.map(str::to_string),
            extra_vars: None,
        }
    }

    /// A linear chain of orders 0, 1, 2, with step 0 declaring a cleanup
    /// rollback action.
    fn chain_steps() -> Vec<WorkflowStep> {
        vec![
            step(0, "install", vec![], Some("cleanup")),
            step(1, "configure", vec![0], None),
            step(2, "restart", vec![1], None),
        ]
    }

    struct Harness {
        store: Store,
        executor: Arc<FakeExecutor>,
        scheduler: Arc<WorkflowScheduler>,
        template_id: DbId,
    }

    async fn harness(steps: Vec<WorkflowStep>) -> Harness {
        let store = Store::new();
        let executor = Arc::new(FakeExecutor::default());
        let scheduler =
            WorkflowScheduler::new(store.clone(), executor.clone(), directory());
        let template = TemplateRepo::create(
            &store,
            CreateTemplate {
                name: "deploy".to_string(),
                description: None,
                steps,
            },
        )
        .await
        .expect("create template");
        Harness {
            store,
            executor,
            scheduler,
            template_id: template.id,
        }
    }

    fn start_input(template_id: DbId, devices: &[&str], rollback: bool) -> StartWorkflow {
        StartWorkflow {
            template_id,
            device_ids: devices.iter().map(|d| d.to_string()).collect(),
            rollback_on_failure: rollback,
            extra_vars: None,
            vault_secret_id: None,
        }
    }

    /// Run an instance to its terminal state inline (no spawned driver).
    async fn run_to_end(h: &Harness, input: StartWorkflow) -> WorkflowInstance {
        let (instance, cancel) = h.scheduler.prepare(input).await.expect("prepare");
        Arc::clone(&h.scheduler).run(instance.id, cancel).await;
        InstanceRepo::find_by_id(&h.store, instance.id)
            .await
            .expect("instance")
    }

    fn job_for<'a>(jobs: &'a [StepJob], device: &str, order: u32, is_rollback: bool) -> &'a StepJob {
        jobs.iter()
            .find(|j| j.device_id == device && j.step_order == order && j.is_rollback == is_rollback)
            .unwrap_or_else(|| panic!("no job for {device}/{order} rollback={is_rollback}"))
    }

    // -- validation ----------------------------------------------------------

    #[tokio::test]
    async fn empty_device_list_rejected_without_creating_an_instance() {
        let h = harness(chain_steps()).await;
        let err = h
            .scheduler
            .prepare(start_input(h.template_id, &[], false))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));

        let instances = InstanceRepo::list(&h.store, &InstanceFilter::default()).await;
        assert!(instances.is_empty());
    }

    #[tokio::test]
    async fn unknown_template_is_not_found() {
        let h = harness(chain_steps()).await;
        let err = h
            .scheduler
            .prepare(start_input(999, &["nas"], false))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { .. });
    }

    #[tokio::test]
    async fn unknown_device_is_rejected() {
        let h = harness(chain_steps()).await;
        let err = h
            .scheduler
            .prepare(start_input(h.template_id, &["toaster"], false))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[tokio::test]
    async fn duplicate_device_ids_are_deduplicated() {
        let h = harness(chain_steps()).await;
        let instance = run_to_end(&h, start_input(h.template_id, &["nas", "nas"], false)).await;
        assert_eq!(instance.device_ids, vec!["nas".to_string()]);
        assert_eq!(JobRepo::count_for_instance(&h.store, instance.id).await, 3);
    }

    // -- failure handling ----------------------------------------------------

    #[tokio::test]
    async fn all_steps_succeed_completes_the_instance() {
        let h = harness(chain_steps()).await;
        let instance = run_to_end(&h, start_input(h.template_id, &["nas"], false)).await;

        assert_eq!(instance.status, InstanceStatus::Completed);
        assert_eq!(
            instance.device_statuses.get("nas"),
            Some(&DeviceOutcome::Completed)
        );
        assert!(instance.completed_at.is_some());

        let jobs = JobRepo::list_by_instance(&h.store, instance.id).await;
        assert_eq!(jobs.len(), 3);
        assert!(jobs.iter().all(|j| j.status == JobStatus::Completed));
    }

    #[tokio::test]
    async fn step_failure_skips_remaining_steps_without_rollback() {
        let h = harness(chain_steps()).await;
        h.executor.fail("nas", "configure");

        let instance = run_to_end(&h, start_input(h.template_id, &["nas"], false)).await;
        assert_eq!(instance.status, InstanceStatus::Failed);
        assert_eq!(
            instance.device_statuses.get("nas"),
            Some(&DeviceOutcome::Failed)
        );

        let jobs = JobRepo::list_by_instance(&h.store, instance.id).await;
        assert_eq!(job_for(&jobs, "nas", 0, false).status, JobStatus::Completed);
        assert_eq!(job_for(&jobs, "nas", 1, false).status, JobStatus::Failed);
        assert_eq!(job_for(&jobs, "nas", 2, false).status, JobStatus::Skipped);
        // No rollback jobs were recorded.
        assert!(jobs.iter().all(|j| !j.is_rollback));
    }

    #[tokio::test]
    async fn step_failure_with_rollback_unwinds_completed_steps() {
        let h = harness(chain_steps()).await;
        h.executor.fail("nas", "configure");

        let instance = run_to_end(&h, start_input(h.template_id, &["nas"], true)).await;
        assert_eq!(instance.status, InstanceStatus::RolledBack);
        assert_eq!(
            instance.device_statuses.get("nas"),
            Some(&DeviceOutcome::RolledBack)
        );

        let jobs = JobRepo::list_by_instance(&h.store, instance.id).await;
        let rollback = job_for(&jobs, "nas", 0, true);
        assert_eq!(rollback.action_name, "cleanup");
        assert_eq!(rollback.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn rollback_pass_continues_past_a_failed_rollback_action() {
        let steps = vec![
            step(0, "provision", vec![], Some("undo-provision")),
            step(1, "configure", vec![0], Some("undo-configure")),
            step(2, "activate", vec![1], None),
        ];
        let h = harness(steps).await;
        h.executor.fail("nas", "activate");
        h.executor.fail("nas", "undo-configure");

        let instance = run_to_end(&h, start_input(h.template_id, &["nas"], true)).await;
        // An un-rolled-back failure remains, so the instance failed.
        assert_eq!(instance.status, InstanceStatus::Failed);
        assert_eq!(
            instance.device_statuses.get("nas"),
            Some(&DeviceOutcome::RollbackFailed)
        );

        // Partial rollback progress is preserved: the earlier step's
        // rollback still ran and succeeded.
        let jobs = JobRepo::list_by_instance(&h.store, instance.id).await;
        assert_eq!(
            job_for(&jobs, "nas", 1, true).status,
            JobStatus::Failed
        );
        assert_eq!(
            job_for(&jobs, "nas", 0, true).status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn devices_progress_independently() {
        let h = harness(chain_steps()).await;
        h.executor.fail("pi", "configure");

        let instance = run_to_end(&h, start_input(h.template_id, &["nas", "pi"], false)).await;
        assert_eq!(instance.status, InstanceStatus::Failed);
        assert_eq!(
            instance.device_statuses.get("nas"),
            Some(&DeviceOutcome::Completed)
        );
        assert_eq!(
            instance.device_statuses.get("pi"),
            Some(&DeviceOutcome::Failed)
        );

        let jobs = JobRepo::list_by_instance(&h.store, instance.id).await;
        // The failing device never truncated the healthy device's records.
        for order in 0..3 {
            assert_eq!(
                job_for(&jobs, "nas", order, false).status,
                JobStatus::Completed
            );
        }
        assert_eq!(job_for(&jobs, "pi", 1, false).status, JobStatus::Failed);
        assert_eq!(job_for(&jobs, "pi", 2, false).status, JobStatus::Skipped);
    }

    // -- cancellation --------------------------------------------------------

    #[tokio::test]
    async fn cancel_before_dispatch_is_terminal_with_zero_jobs() {
        let h = harness(chain_steps()).await;
        let (instance, cancel) = h
            .scheduler
            .prepare(start_input(h.template_id, &["nas"], false))
            .await
            .expect("prepare");

        h.scheduler.cancel(instance.id).await.expect("cancel");
        Arc::clone(&h.scheduler).run(instance.id, cancel).await;

        let instance = InstanceRepo::find_by_id(&h.store, instance.id)
            .await
            .expect("instance");
        assert_eq!(instance.status, InstanceStatus::Cancelled);
        assert_eq!(JobRepo::count_for_instance(&h.store, instance.id).await, 0);
    }

    #[tokio::test]
    async fn second_cancel_conflicts_once_terminal() {
        let h = harness(chain_steps()).await;
        let (instance, cancel) = h
            .scheduler
            .prepare(start_input(h.template_id, &["nas"], false))
            .await
            .expect("prepare");

        h.scheduler.cancel(instance.id).await.expect("first cancel");
        Arc::clone(&h.scheduler).run(instance.id, cancel).await;

        let err = h.scheduler.cancel(instance.id).await.unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn start_spawns_and_reaches_a_terminal_state() {
        let h = harness(chain_steps()).await;
        let instance = h
            .scheduler
            .start(start_input(h.template_id, &["nas"], false))
            .await
            .expect("start");
        assert_eq!(instance.status, InstanceStatus::Pending);

        let mut finished = None;
        for _ in 0..500 {
            let current = InstanceRepo::find_by_id(&h.store, instance.id)
                .await
                .expect("instance");
            if current.status.is_terminal() {
                finished = Some(current);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let finished = finished.expect("instance should reach a terminal state");
        assert_eq!(finished.status, InstanceStatus::Completed);
    }

    // -- executor inputs -----------------------------------------------------

    #[tokio::test]
    async fn extra_vars_and_vault_secret_reach_the_executor() {
        let mut steps = chain_steps();
        steps[0].extra_vars = Some(serde_json::json!({"port": 8080}));
        let h = harness(steps).await;

        let mut input = start_input(h.template_id, &["nas"], false);
        input.extra_vars = Some(serde_json::json!({"env": "prod", "port": 22}));
        input.vault_secret_id = Some("homelab-vault".to_string());
        run_to_end(&h, input).await;

        let requests = h.executor.requests();
        assert_eq!(requests.len(), 3);
        // Step-level vars win over instance-level vars.
        assert_eq!(
            requests[0].extra_vars,
            Some(serde_json::json!({"env": "prod", "port": 8080}))
        );
        // Steps without their own vars get the instance vars.
        assert_eq!(
            requests[1].extra_vars,
            Some(serde_json::json!({"env": "prod", "port": 22}))
        );
        assert!(requests
            .iter()
            .all(|r| r.vault_secret_id.as_deref() == Some("homelab-vault")));
    }

    // -- merge_extra_vars ----------------------------------------------------

    #[test]
    fn merge_prefers_step_values() {
        let merged = merge_extra_vars(
            Some(&serde_json::json!({"a": 1, "b": 2})),
            Some(&serde_json::json!({"b": 3})),
        );
        assert_eq!(merged, Some(serde_json::json!({"a": 1, "b": 3})));
    }

    #[test]
    fn merge_passes_through_single_side() {
        let vars = serde_json::json!({"a": 1});
        assert_eq!(merge_extra_vars(Some(&vars), None), Some(vars.clone()));
        assert_eq!(merge_extra_vars(None, Some(&vars)), Some(vars));
        assert_eq!(merge_extra_vars(None, None), None);
    }
}
