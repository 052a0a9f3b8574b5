pub mod instance_repo;
pub mod job_repo;
pub mod template_repo;

pub use instance_repo::InstanceRepo;
pub use job_repo::JobRepo;
pub use template_repo::TemplateRepo;
