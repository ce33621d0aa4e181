//! SQLite database store implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::*;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;

        Ok(())
    }

    // --- Monitor CRUD ---

    /// Add a new monitor and return its ID.
    pub fn add_monitor(&self, monitor: &mut Monitor) -> Result<i64, DbError> {
        if monitor.check_interval_secs == 0 {
            monitor.check_interval_secs = 60;
        }
        if monitor.timeout_secs == 0 {
            monitor.timeout_secs = 30;
        }

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO monitors (name, url, check_interval_secs, timeout_secs, expected_status, is_running, consecutive_failures)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                monitor.name,
                monitor.url,
                monitor.check_interval_secs,
                monitor.timeout_secs,
                monitor.expected_status,
                monitor.is_running,
                monitor.consecutive_failures,
            ],
        )?;
        let id = conn.last_insert_rowid();
        monitor.id = id;
        Ok(id)
    }

    /// Update an existing monitor.
    pub fn update_monitor(&self, monitor: &Monitor) -> Result<(), DbError> {
        let check_interval = if monitor.check_interval_secs == 0 {
            60
        } else {
            monitor.check_interval_secs
        };
        let timeout = if monitor.timeout_secs == 0 {
            30
        } else {
            monitor.timeout_secs
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE monitors SET name=?1, url=?2, check_interval_secs=?3, timeout_secs=?4, expected_status=?5, is_running=?6 WHERE id=?7",
            params![
                monitor.name,
                monitor.url,
                check_interval,
                timeout,
                monitor.expected_status,
                monitor.is_running,
                monitor.id,
            ],
        )?;
        Ok(())
    }

    /// Get all monitors.
    pub fn get_monitors(&self) -> Result<Vec<Monitor>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, url, check_interval_secs, timeout_secs, expected_status, is_running, consecutive_failures
             FROM monitors ORDER BY id",
        )?;

        let monitors = stmt
            .query_map([], map_monitor_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(monitors)
    }

    /// Get a monitor by ID.
    pub fn get_monitor(&self, id: i64) -> Result<Monitor, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, url, check_interval_secs, timeout_secs, expected_status, is_running, consecutive_failures
             FROM monitors WHERE id = ?1",
            params![id],
            map_monitor_row,
        )
        .optional()?
        .ok_or(DbError::NotFound)
    }

    /// Delete a monitor and its checks.
    pub fn delete_monitor(&self, id: i64) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM checks WHERE monitor_id = ?1", params![id])?;
        conn.execute("DELETE FROM monitors WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Persist the paused/running flag.
    pub fn set_running(&self, id: i64, is_running: bool) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE monitors SET is_running = ?2 WHERE id = ?1",
            params![id, is_running],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Reset or advance the consecutive failure counter after a check.
    pub fn record_check_outcome(&self, monitor_id: i64, expected: bool) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        if expected {
            conn.execute(
                "UPDATE monitors SET consecutive_failures = 0 WHERE id = ?1",
                params![monitor_id],
            )?;
        } else {
            conn.execute(
                "UPDATE monitors SET consecutive_failures = consecutive_failures + 1 WHERE id = ?1",
                params![monitor_id],
            )?;
        }
        Ok(())
    }

    // --- Checks ---

    /// Add checks in batch.
    pub fn add_checks(&self, checks: &[CheckRecord]) -> Result<(), DbError> {
        if checks.is_empty() {
            return Ok(());
        }

        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO checks (monitor_id, timestamp_ms, status, is_expected_status, response_time_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for c in checks {
                stmt.execute(params![
                    c.monitor_id,
                    c.timestamp.timestamp_millis(),
                    c.status,
                    c.is_expected_status,
                    c.response_time_ms,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Get checks for a monitor within a half-open time range, ascending.
    pub fn get_checks(
        &self,
        monitor_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CheckRecord>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT monitor_id, timestamp_ms, status, is_expected_status, response_time_ms
             FROM checks
             WHERE monitor_id = ?1 AND timestamp_ms >= ?2 AND timestamp_ms < ?3
             ORDER BY timestamp_ms ASC",
        )?;

        let checks = stmt
            .query_map(
                params![monitor_id, start.timestamp_millis(), end.timestamp_millis()],
                map_check_row,
            )?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(checks)
    }

    /// Get all checks for a monitor from `start` onward, ascending.
    ///
    /// No upper bound: late-arriving checks stamped ahead of our clock
    /// still belong to the snapshot handed to the series engine.
    pub fn get_checks_since(
        &self,
        monitor_id: i64,
        start: DateTime<Utc>,
    ) -> Result<Vec<CheckRecord>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT monitor_id, timestamp_ms, status, is_expected_status, response_time_ms
             FROM checks
             WHERE monitor_id = ?1 AND timestamp_ms >= ?2
             ORDER BY timestamp_ms ASC",
        )?;

        let checks = stmt
            .query_map(params![monitor_id, start.timestamp_millis()], map_check_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(checks)
    }

    /// Get the latest `limit` checks that carry a response time, in
    /// chronological order.
    pub fn get_recent_checks(
        &self,
        monitor_id: i64,
        limit: u32,
    ) -> Result<Vec<CheckRecord>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT monitor_id, timestamp_ms, status, is_expected_status, response_time_ms
             FROM checks
             WHERE monitor_id = ?1 AND response_time_ms IS NOT NULL
             ORDER BY timestamp_ms DESC LIMIT ?2",
        )?;

        let mut checks = stmt
            .query_map(params![monitor_id, limit], map_check_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        // Newest-first query for the limit, oldest-first for the caller.
        checks.reverse();
        Ok(checks)
    }

    /// Delete checks before a cutoff time.
    pub fn delete_checks_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM checks WHERE timestamp_ms < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        Ok(deleted)
    }

    /// Summary statistics for a monitor over a half-open time range.
    pub fn get_monitor_stats(
        &self,
        monitor_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<MonitorStats, DbError> {
        let conn = self.conn.lock().unwrap();
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(AVG(CASE WHEN is_expected_status THEN 100.0 ELSE 0.0 END), 0.0),
                    COALESCE(AVG(response_time_ms), 0.0)
             FROM checks
             WHERE monitor_id = ?1 AND timestamp_ms >= ?2 AND timestamp_ms < ?3",
            params![monitor_id, start.timestamp_millis(), end.timestamp_millis()],
            |row| {
                Ok(MonitorStats {
                    check_count: row.get(0)?,
                    uptime_percentage: row.get(1)?,
                    avg_response_time_ms: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }
}

fn map_monitor_row(row: &rusqlite::Row<'_>) -> SqlResult<Monitor> {
    Ok(Monitor {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        check_interval_secs: row.get(3)?,
        timeout_secs: row.get(4)?,
        expected_status: row.get(5)?,
        is_running: row.get(6)?,
        consecutive_failures: row.get(7)?,
    })
}

fn map_check_row(row: &rusqlite::Row<'_>) -> SqlResult<CheckRecord> {
    let timestamp_ms: i64 = row.get(1)?;
    Ok(CheckRecord {
        monitor_id: row.get(0)?,
        timestamp: DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now),
        status: row.get(2)?,
        is_expected_status: row.get(3)?,
        response_time_ms: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::NamedTempFile;

    fn check(monitor_id: i64, timestamp: DateTime<Utc>, status: Option<u16>) -> CheckRecord {
        CheckRecord {
            monitor_id,
            timestamp,
            status,
            is_expected_status: matches!(status, Some(s) if (200..300).contains(&s)),
            response_time_ms: status.map(|_| 42),
        }
    }

    #[test]
    fn test_monitor_crud() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        // Create
        let mut monitor = Monitor {
            name: "Example".to_string(),
            url: "https://example.com".to_string(),
            ..Default::default()
        };
        let id = store.add_monitor(&mut monitor).unwrap();
        assert!(id > 0);

        // Read
        let fetched = store.get_monitor(id).unwrap();
        assert_eq!(fetched.name, "Example");
        assert_eq!(fetched.check_interval_secs, 60);
        assert!(fetched.is_running);

        // Update
        let mut updated = fetched;
        updated.name = "Renamed".to_string();
        updated.expected_status = Some(204);
        store.update_monitor(&updated).unwrap();

        let fetched2 = store.get_monitor(id).unwrap();
        assert_eq!(fetched2.name, "Renamed");
        assert_eq!(fetched2.expected_status, Some(204));

        // Delete
        store.delete_monitor(id).unwrap();
        assert!(matches!(store.get_monitor(id), Err(DbError::NotFound)));
    }

    #[test]
    fn test_check_range_queries() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        let mut monitor = Monitor {
            name: "Example".to_string(),
            url: "https://example.com".to_string(),
            ..Default::default()
        };
        let id = store.add_monitor(&mut monitor).unwrap();

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        store
            .add_checks(&[
                check(id, base, Some(200)),
                check(id, base + Duration::minutes(1), Some(500)),
                check(id, base + Duration::minutes(2), None),
            ])
            .unwrap();

        let all = store.get_checks_since(id, base).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].timestamp, base);
        assert_eq!(all[2].status, None);

        let windowed = store
            .get_checks(id, base, base + Duration::minutes(2))
            .unwrap();
        assert_eq!(windowed.len(), 2);

        // Only checks with a response time, chronological despite the
        // newest-first limit query.
        let recent = store.get_recent_checks(id, 10).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].timestamp < recent[1].timestamp);
    }

    #[test]
    fn test_retention_delete() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        let mut monitor = Monitor {
            name: "Example".to_string(),
            url: "https://example.com".to_string(),
            ..Default::default()
        };
        let id = store.add_monitor(&mut monitor).unwrap();

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        store
            .add_checks(&[
                check(id, base - Duration::days(8), Some(200)),
                check(id, base, Some(200)),
            ])
            .unwrap();

        let deleted = store.delete_checks_before(base - Duration::days(7)).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.get_checks_since(id, base - Duration::days(30)).unwrap().len(), 1);
    }

    #[test]
    fn test_failure_counter() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        let mut monitor = Monitor {
            name: "Example".to_string(),
            url: "https://example.com".to_string(),
            ..Default::default()
        };
        let id = store.add_monitor(&mut monitor).unwrap();

        store.record_check_outcome(id, false).unwrap();
        store.record_check_outcome(id, false).unwrap();
        assert_eq!(store.get_monitor(id).unwrap().consecutive_failures, 2);

        store.record_check_outcome(id, true).unwrap();
        assert_eq!(store.get_monitor(id).unwrap().consecutive_failures, 0);
    }

    #[test]
    fn test_monitor_stats() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        let mut monitor = Monitor {
            name: "Example".to_string(),
            url: "https://example.com".to_string(),
            ..Default::default()
        };
        let id = store.add_monitor(&mut monitor).unwrap();

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        store
            .add_checks(&[
                check(id, base, Some(200)),
                check(id, base + Duration::minutes(1), Some(200)),
                check(id, base + Duration::minutes(2), Some(500)),
                check(id, base + Duration::minutes(3), None),
            ])
            .unwrap();

        let stats = store
            .get_monitor_stats(id, base, base + Duration::hours(1))
            .unwrap();
        assert_eq!(stats.check_count, 4);
        assert!((stats.uptime_percentage - 50.0).abs() < f64::EPSILON);
        assert!((stats.avg_response_time_ms - 42.0).abs() < f64::EPSILON);

        let empty = store
            .get_monitor_stats(id, base - Duration::hours(2), base - Duration::hours(1))
            .unwrap();
        assert_eq!(empty.check_count, 0);
        assert_eq!(empty.uptime_percentage, 0.0);
    }
}
