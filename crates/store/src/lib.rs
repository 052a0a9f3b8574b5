//! Entity models and repositories for templates, instances, and jobs.
//!
//! Persistence technology is deliberately out of scope for this service, so
//! the backing store is an in-process, thread-safe set of ordered maps with
//! monotonically increasing ids. The repository API is shaped exactly as it
//! would be over a connection pool (stateless repo structs whose methods
//! take a store handle), keeping the seam for a database-backed swap.

pub mod models;
pub mod repositories;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use homelab_core::types::DbId;

use crate::models::instance::WorkflowInstance;
use crate::models::job::StepJob;
use crate::models::template::WorkflowTemplate;

/// Default page size for list queries.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Maximum page size for list queries.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Shared handle to the in-process store. Cheaply cloneable.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    // BTreeMaps keep entities ordered by id, which makes list ordering
    // stable without a separate sort.
    templates: RwLock<BTreeMap<DbId, WorkflowTemplate>>,
    instances: RwLock<BTreeMap<DbId, WorkflowInstance>>,
    jobs: RwLock<BTreeMap<DbId, StepJob>>,
    template_seq: AtomicI64,
    instance_seq: AtomicI64,
    job_seq: AtomicI64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn templates(&self) -> &RwLock<BTreeMap<DbId, WorkflowTemplate>> {
        &self.inner.templates
    }

    pub(crate) fn instances(&self) -> &RwLock<BTreeMap<DbId, WorkflowInstance>> {
        &self.inner.instances
    }

    pub(crate) fn jobs(&self) -> &RwLock<BTreeMap<DbId, StepJob>> {
        &self.inner.jobs
    }

    pub(crate) fn next_template_id(&self) -> DbId {
        self.inner.template_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn next_instance_id(&self) -> DbId {
        self.inner.instance_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn next_job_id(&self) -> DbId {
        self.inner.job_seq.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Clamp an optional limit into `1..=MAX_PAGE_SIZE`, defaulting to
/// [`DEFAULT_PAGE_SIZE`].
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Clamp an optional offset to a non-negative value.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
