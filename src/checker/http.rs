//! HTTP check execution.

use chrono::Utc;
use std::time::{Duration, Instant};

use super::CheckError;
use crate::db::{CheckRecord, Monitor};

/// Run a single HTTP check against the monitor's URL.
///
/// Timeouts and transport failures are not errors: they produce a record
/// with no status code, which the series engine classifies as no-data.
pub async fn run_check(monitor: &Monitor) -> Result<CheckRecord, CheckError> {
    let url = if monitor.url.starts_with("http://") || monitor.url.starts_with("https://") {
        monitor.url.clone()
    } else {
        format!("https://{}", monitor.url)
    };

    let timeout = Duration::from_secs(monitor.timeout_secs.max(1) as u64);
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CheckError::Config(e.to_string()))?;

    let timestamp = Utc::now();
    let start = Instant::now();

    match client.get(&url).send().await {
        Ok(response) => {
            let response_time_ms = start.elapsed().as_millis() as u32;
            let status = response.status();

            let is_expected_status = match monitor.expected_status {
                Some(code) => status.as_u16() == code,
                None => status.is_success(),
            };

            Ok(CheckRecord {
                monitor_id: monitor.id,
                timestamp,
                status: Some(status.as_u16()),
                is_expected_status,
                response_time_ms: Some(response_time_ms),
            })
        }
        Err(e) => {
            tracing::debug!("Check transport failure for {}: {}", monitor.name, e);
            Ok(CheckRecord {
                monitor_id: monitor.id,
                timestamp,
                status: None,
                is_expected_status: false,
                response_time_ms: None,
            })
        }
    }
}
