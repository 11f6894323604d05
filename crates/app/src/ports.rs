//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod mail_transport;
pub mod record_repo;
pub mod rule_repo;
pub mod template_repo;

pub use mail_transport::MailTransport;
pub use record_repo::RecordRepository;
pub use rule_repo::RuleRepository;
pub use template_repo::TemplateRepository;
