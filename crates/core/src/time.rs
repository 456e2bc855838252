//! Wall-clock helpers for persisted timestamps

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current time as unix seconds
pub fn unix_now() -> u64 {
    to_unix(SystemTime::now())
}

/// Convert a `SystemTime` into unix seconds (times before the epoch become 0)
pub fn to_unix(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

/// Convert unix seconds back into a `SystemTime`
pub fn from_unix(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}
