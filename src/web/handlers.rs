//! HTTP request handlers.

use super::AppState;
use crate::db::{DbError, Monitor};
use crate::uptime::{
    bounds, build_series, window_start, AggregatedBucket, ChartDomains, StatusClass, TimeRange,
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

fn db_error_response(e: DbError) -> axum::response::Response {
    match e {
        DbError::NotFound => (StatusCode::NOT_FOUND, "Monitor not found").into_response(),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
    }
}

// ============================================================================
// API: Monitors
// ============================================================================

pub async fn handle_list_monitors(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_monitors() {
        Ok(monitors) => Json(monitors).into_response(),
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_get_monitor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.get_monitor(id) {
        Ok(monitor) => Json(monitor).into_response(),
        Err(e) => db_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct MonitorRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub check_interval_secs: u32,
    #[serde(default)]
    pub timeout_secs: u32,
    #[serde(default)]
    pub expected_status: Option<u16>,
}

pub async fn handle_create_monitor(
    State(state): State<AppState>,
    Json(req): Json<MonitorRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() || req.url.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "name and url are required").into_response();
    }

    let mut monitor = Monitor {
        id: 0,
        name: req.name,
        url: req.url,
        check_interval_secs: if req.check_interval_secs == 0 {
            60
        } else {
            req.check_interval_secs
        },
        timeout_secs: if req.timeout_secs == 0 { 30 } else { req.timeout_secs },
        expected_status: req.expected_status,
        is_running: true,
        consecutive_failures: 0,
    };

    match state.store.add_monitor(&mut monitor) {
        Ok(_) => {
            state.scheduler.watch(monitor.clone()).await;
            Json(monitor).into_response()
        }
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_update_monitor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<MonitorRequest>,
) -> impl IntoResponse {
    let existing = match state.store.get_monitor(id) {
        Ok(m) => m,
        Err(e) => return db_error_response(e),
    };

    let updated = Monitor {
        id,
        name: req.name,
        url: req.url,
        check_interval_secs: if req.check_interval_secs == 0 {
            existing.check_interval_secs
        } else {
            req.check_interval_secs
        },
        timeout_secs: if req.timeout_secs == 0 {
            existing.timeout_secs
        } else {
            req.timeout_secs
        },
        expected_status: req.expected_status,
        is_running: existing.is_running,
        consecutive_failures: existing.consecutive_failures,
    };

    // Restart the loop so the new interval and URL take effect
    state.scheduler.unwatch(id).await;

    match state.store.update_monitor(&updated) {
        Ok(_) => {
            if updated.is_running {
                state.scheduler.watch(updated.clone()).await;
            }
            Json(updated).into_response()
        }
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_delete_monitor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    state.scheduler.unwatch(id).await;

    match state.store.delete_monitor(id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_pause_monitor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.scheduler.pause(id).await {
        Ok(()) => Json(serde_json::json!({ "message": "Monitor paused" })).into_response(),
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_resume_monitor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.scheduler.resume(id).await {
        Ok(()) => Json(serde_json::json!({ "message": "Monitor resumed" })).into_response(),
        Err(e) => db_error_response(e),
    }
}

// ============================================================================
// API: Checks
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChecksQuery {
    #[serde(default = "default_checks_limit")]
    pub limit: u32,
}

fn default_checks_limit() -> u32 {
    30
}

pub async fn handle_get_checks(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ChecksQuery>,
) -> impl IntoResponse {
    if let Err(e) = state.store.get_monitor(id) {
        return db_error_response(e);
    }

    match state.store.get_recent_checks(id, query.limit) {
        Ok(checks) => Json(checks).into_response(),
        Err(e) => db_error_response(e),
    }
}

// ============================================================================
// API: Uptime series
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub range: String,
}

#[derive(Debug, Serialize)]
pub struct LegendEntry {
    pub class: StatusClass,
    pub label: &'static str,
    pub color: &'static str,
}

/// Legend in stacking order; the renderer relies on this sequence.
fn legend() -> Vec<LegendEntry> {
    StatusClass::STACK_ORDER
        .iter()
        .map(|&class| LegendEntry {
            class,
            label: class.label(),
            color: class.color(),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct UptimeResponse {
    pub range: TimeRange,
    pub series: Vec<AggregatedBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domains: Option<ChartDomains>,
    pub legend: Vec<LegendEntry>,
}

pub async fn handle_get_uptime(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    let range: TimeRange = match query.range.parse() {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    if let Err(e) = state.store.get_monitor(id) {
        return db_error_response(e);
    }

    // Snapshot first, then a single "now" for the whole computation so
    // the series and domains agree.
    let now = Utc::now();
    let checks = match state.store.get_checks_since(id, window_start(now, range)) {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    let series = build_series(&checks, range, now);
    let domains = bounds(&series, range, now);

    Json(UptimeResponse {
        range,
        series,
        domains,
        legend: legend(),
    })
    .into_response()
}

// ============================================================================
// API: Stats
// ============================================================================

pub async fn handle_get_stats(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    let range: TimeRange = match query.range.parse() {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    if let Err(e) = state.store.get_monitor(id) {
        return db_error_response(e);
    }

    let now = Utc::now();
    match state
        .store
        .get_monitor_stats(id, now - range.spec().lookback(), now)
    {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => db_error_response(e),
    }
}
