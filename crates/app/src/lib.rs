//! # hrmail-app
//!
//! Application layer — use-cases, **port definitions** (traits) and the
//! automation engine.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `RuleRepository` — CRUD for automation rules
//!   - `TemplateRepository` — CRUD for mail templates
//!   - `RecordRepository` — storage for records of registered models
//!   - `MailTransport` — hands a rendered mail to the outside world
//! - Define **driving ports** as use-case structs:
//!   - `RuleService`, `TemplateService`, `RecordService`
//!   - `AutomationEngine` — binds rules to mutations and evaluates them
//! - Provide **in-process infrastructure** that doesn't need IO: the mail
//!   dispatcher worker pool and the outbox transport
//!
//! ## Dependency rule
//! Depends on `hrmail-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod automation_engine;
pub mod context;
pub mod dispatcher;
pub mod handlers;
pub mod outbox;
pub mod ports;
pub mod render;
pub mod resolver;
pub mod services;

#[cfg(test)]
mod testing;
