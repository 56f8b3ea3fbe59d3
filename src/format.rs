use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

use crate::api::LastSync;

/// Current time as unix seconds.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// The backend writes 0 for "no timestamp".
fn known(timestamp: Option<f64>) -> Option<f64> {
    timestamp.filter(|ts| *ts > 0.0)
}

/// Absolute local time, or "Never" for a missing or zero timestamp.
pub fn format_time(timestamp: Option<f64>) -> String {
    let Some(ts) = known(timestamp) else {
        return "Never".to_string();
    };
    match DateTime::from_timestamp_millis((ts * 1000.0) as i64) {
        Some(dt) => dt
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "Invalid time".to_string(),
    }
}

/// Coarse relative time: "Just now", "5 minutes ago", "3 hours ago", "2 days ago".
pub fn time_ago(timestamp: Option<f64>, now: f64) -> String {
    let Some(ts) = known(timestamp) else {
        return "Never".to_string();
    };
    let diff = now - ts;
    if diff < 60.0 {
        "Just now".to_string()
    } else if diff < 3600.0 {
        format!("{} minutes ago", (diff / 60.0).floor() as i64)
    } else if diff < 86400.0 {
        format!("{} hours ago", (diff / 3600.0).floor() as i64)
    } else {
        format!("{} days ago", (diff / 86400.0).floor() as i64)
    }
}

/// Unix seconds of the backend's last sync marker.
///
/// ISO strings without an offset are the backend's local time, e.g.
/// `2025-03-01T10:00:00.123456`.
pub fn last_sync_timestamp(sync: &LastSync) -> Option<f64> {
    match sync {
        LastSync::Unix(ts) => Some(*ts),
        LastSync::Iso(raw) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
                return Some(dt.timestamp_millis() as f64 / 1000.0);
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .and_then(|naive| Local.from_local_datetime(&naive).earliest())
                .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
        }
    }
}
