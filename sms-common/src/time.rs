//! Timestamp utilities

use chrono::{DateTime, Local, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Wall-clock time of day shown as "last synced" (e.g. `14:05:09`)
pub fn human_time_of_day(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Convert seconds to duration
pub fn secs_to_duration(secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let time2 = now();
        assert!(time2 > time1);
    }

    #[test]
    fn test_human_time_of_day_format() {
        let text = human_time_of_day(now());
        assert_eq!(text.len(), 8);
        assert_eq!(text.matches(':').count(), 2);
    }

    #[test]
    fn test_secs_to_duration() {
        assert_eq!(secs_to_duration(300), Duration::from_secs(300));
        assert_eq!(secs_to_duration(0), Duration::ZERO);
    }
}
