use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the unix epoch, the resolution used by request timestamps.
pub fn create_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|since_the_epoch| since_the_epoch.as_secs())
        .unwrap_or(0)
}
