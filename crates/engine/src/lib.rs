//! Workflow execution engine.
//!
//! Defines the action-executor and device-directory boundaries, the
//! production `ansible-playbook` executor, and the [`WorkflowScheduler`]
//! that drives instances from `pending` to a terminal state.

pub mod ansible;
pub mod directory;
pub mod executor;
pub mod scheduler;

pub use ansible::AnsibleExecutor;
pub use directory::{DeviceDirectory, DeviceRecord, StaticDirectory};
pub use executor::{ActionExecutor, ActionOutcome, ActionRequest, ExecutorError};
pub use scheduler::{StartWorkflow, WorkflowScheduler};
