//! Time helpers.

use chrono::{DateTime, Utc};

/// Current Unix timestamp in milliseconds (UTC).
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format a Unix millisecond timestamp as a clock string (`HH:MM:SS`, UTC).
///
/// Out-of-range values fall back to the Unix epoch.
pub fn timestamp_to_clock(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format("%H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_to_clock() {
        // テスト項目: 時刻部分だけが取り出される
        assert_eq!(timestamp_to_clock(1_700_000_000_123), "22:13:20");
    }

    #[test]
    fn test_now_millis_is_monotonic_enough() {
        // テスト項目: 連続呼び出しで時刻が逆行しない
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
    }
}
