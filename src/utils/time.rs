use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// return millisecond
pub(crate) fn get_now_as_u128() -> u128 {
    let now = SystemTime::now();
    // 0 when the clock reads before the epoch
    now.duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or_default()
}

/// Millisecond timestamp rendered the way signed requests expect it
pub(crate) fn timestamp_millis() -> String {
    get_now_as_u128().to_string()
}
