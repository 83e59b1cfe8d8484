//! Clock helper used for stamping commands and connection records.

use chrono::{DateTime, Utc};

/// Returns the current wall-clock instant in UTC.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
