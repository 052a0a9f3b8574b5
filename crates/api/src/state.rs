use std::sync::Arc;

use homelab_engine::WorkflowScheduler;
use homelab_store::Store;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already
/// `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Template, instance, and job store.
    pub store: Store,
    /// Workflow scheduler; the only component that mutates instances
    /// during execution.
    pub scheduler: Arc<WorkflowScheduler>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
