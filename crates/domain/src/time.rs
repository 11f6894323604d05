//! Timestamps.

use chrono::{DateTime, Utc};

/// UTC timestamp used for rule creation times and dispatch reports.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}
