use chrono::{DateTime, TimeZone, Utc};

const MB: f64 = 1024.0 * 1024.0;

/// Scale a raw byte count to megabytes. Pure arithmetic on the raw value, so
/// repeated calls over the same input always agree.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / MB
}

/// Round to two decimals. Applied only when a value crosses the
/// serialization boundary; aggregation math stays at full precision.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `2026-08-29 14:03:05` style UTC timestamp used in persisted rows.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format seconds-since-epoch (process start times) as a readable UTC string.
pub fn format_unix_secs(secs: u64) -> String {
    match Utc.timestamp_opt(secs as i64, 0).single() {
        Some(ts) => format_timestamp(ts),
        None => String::new(),
    }
}
