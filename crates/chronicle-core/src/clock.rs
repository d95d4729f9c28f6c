use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::types::statement::truncate_micros;

/// Source of the server-assigned `stored` timestamp.
///
/// Strictly monotonic within the process: when the wall clock has not
/// advanced past the previous grant, the next grant is bumped by one
/// microsecond so the `(stored, id)` sort key stays a total order even
/// inside a single ingestion batch. Values are truncated to microsecond
/// precision, the resolution every storage engine round-trips.
#[derive(Debug)]
pub struct StoredClock {
    last: Mutex<DateTime<Utc>>,
}

impl StoredClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// Grant the next `stored` timestamp.
    pub fn next(&self) -> DateTime<Utc> {
        let now = truncate_micros(Utc::now());
        let mut last = self.last.lock();
        let granted = if now > *last {
            now
        } else {
            *last + Duration::microseconds(1)
        };
        *last = granted;
        granted
    }
}

impl Default for StoredClock {
    fn default() -> Self {
        Self::new()
    }
}
