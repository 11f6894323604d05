//! # hrmail-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a **JSON API** for programmatic access
//!   (`/api/rules`, `/api/templates`, `/api/records/{model}`, …)
//! - Map HTTP requests into application service calls (driving adapter)
//! - Map application results and errors into JSON responses
//!
//! Record mutations wait for the mails they queued before answering, so the
//! response carries the notices raised while dispatching.
//!
//! ## Dependency rule
//! Depends on `hrmail-app` (for port traits and services) and `hrmail-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;

#[cfg(test)]
mod test_support;
