//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub check_interval_secs: u32,
    pub timeout_secs: u32,
    /// Expected HTTP status; when unset, any 2xx counts as expected.
    pub expected_status: Option<u16>,
    pub is_running: bool,
    pub consecutive_failures: u32,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            url: String::new(),
            check_interval_secs: 60,
            timeout_secs: 30,
            expected_status: None,
            is_running: true,
            consecutive_failures: 0,
        }
    }
}

/// A single check result for one monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub monitor_id: i64,
    pub timestamp: DateTime<Utc>,
    /// HTTP status of the response; `None` when the check never got one
    /// (timeout, DNS failure, connection refused).
    pub status: Option<u16>,
    pub is_expected_status: bool,
    pub response_time_ms: Option<u32>,
}

/// Aggregate check statistics over a window, for the summary cards.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MonitorStats {
    pub check_count: i64,
    pub uptime_percentage: f64,
    pub avg_response_time_ms: f64,
}
