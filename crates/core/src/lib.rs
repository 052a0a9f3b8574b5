//! Pure domain logic for the homelab workflow orchestrator.
//!
//! No I/O lives here: step-graph validation, status state machines,
//! rollback planning, and outcome aggregation are all plain functions and
//! types shared by the store, engine, and API crates.

pub mod error;
pub mod rollback;
pub mod status;
pub mod template;
pub mod types;
