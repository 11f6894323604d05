//! # hrmail-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `hrmail-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! Identifiers are stored as text; structured columns (condition, path
//! lists, record fields) as JSON or querystring text.
//!
//! ## Dependency rule
//! Depends on `hrmail-app` (for port traits) and `hrmail-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod pool;
pub mod record_repo;
pub mod rule_repo;
pub mod template_repo;

pub use pool::{Config, Database};
pub use record_repo::SqliteRecordRepository;
pub use rule_repo::SqliteRuleRepository;
pub use template_repo::SqliteTemplateRepository;
