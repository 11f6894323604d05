//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod record_service;
pub mod rule_service;
pub mod template_service;

pub use record_service::{Mutation, RecordService};
pub use rule_service::RuleService;
pub use template_service::TemplateService;
