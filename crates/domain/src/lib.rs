//! # hrmail-domain
//!
//! Pure domain model for the hrmail automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Describe **entity types** (`ModelSchema`) and their relations
//! - Describe **records** (generic entity instances with typed field values)
//! - Compile **dotted attribute paths** against schemas
//! - Define **automation rules** (trigger → condition → mail) and the
//!   condition expression format administrators author
//! - Define **mail templates** and the outgoing mail they render into
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod mail;
pub mod path;
pub mod record;
pub mod registry;
pub mod schema;
pub mod template;
