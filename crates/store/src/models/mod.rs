pub mod instance;
pub mod job;
pub mod template;
