pub mod templates;
pub mod workflows;
