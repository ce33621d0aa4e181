//! Check scheduler: runs per-monitor check loops and persists results.

mod http;

pub use http::*;

use crate::db::{CheckRecord, DbError, Monitor, Store};

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

/// Check error types.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("invalid check configuration: {0}")]
    Config(String),
}

/// Orchestrates check execution for all watched monitors.
pub struct CheckScheduler {
    store: Arc<Store>,
    stop_chans: Arc<RwLock<HashMap<i64, tokio::sync::broadcast::Sender<()>>>>,
    check_tx: mpsc::Sender<CheckRecord>,
    retention: ChronoDuration,
}

impl CheckScheduler {
    /// Create a new scheduler with the given store.
    pub fn new(store: Arc<Store>, retention_days: i64) -> Self {
        let (tx, rx) = mpsc::channel(1000);

        // Batch writer owns the only write path for checks
        let store_clone = store.clone();
        tokio::spawn(run_batch_writer(rx, store_clone));

        Self {
            store,
            stop_chans: Arc::new(RwLock::new(HashMap::new())),
            check_tx: tx,
            retention: ChronoDuration::days(retention_days),
        }
    }

    /// Start loops for every monitor that is not paused, plus the
    /// retention sweep.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let monitors = self.store.get_monitors()?;

        tracing::info!("Starting check scheduler with {} monitors", monitors.len());

        for monitor in monitors {
            if monitor.is_running {
                self.watch(monitor).await;
            }
        }

        self.start_retention();

        Ok(())
    }

    /// Begin checking a monitor.
    pub async fn watch(&self, monitor: Monitor) {
        let mut stop_chans = self.stop_chans.write().await;

        if stop_chans.contains_key(&monitor.id) {
            return; // Already running
        }

        let (stop_tx, _) = tokio::sync::broadcast::channel(1);
        stop_chans.insert(monitor.id, stop_tx.clone());
        drop(stop_chans);

        tracing::info!("Scheduler: watching {}", monitor.name);

        let check_tx = self.check_tx.clone();
        let store = self.store.clone();
        let monitor_id = monitor.id;
        let stop_chans = self.stop_chans.clone();

        tokio::spawn(async move {
            run_check_loop(monitor, store, check_tx, stop_tx.subscribe()).await;

            // Clean up when done
            let mut chans = stop_chans.write().await;
            chans.remove(&monitor_id);
        });
    }

    /// Stop checking a monitor.
    pub async fn unwatch(&self, id: i64) {
        let mut stop_chans = self.stop_chans.write().await;

        if let Some(stop_tx) = stop_chans.remove(&id) {
            let _ = stop_tx.send(());
            tracing::info!("Scheduler: stopped watching monitor {}", id);
        }
    }

    /// Pause a monitor: stop its loop and persist the flag.
    pub async fn pause(&self, id: i64) -> Result<(), DbError> {
        self.store.set_running(id, false)?;
        self.unwatch(id).await;
        Ok(())
    }

    /// Resume a paused monitor.
    pub async fn resume(&self, id: i64) -> Result<(), DbError> {
        self.store.set_running(id, true)?;
        let monitor = self.store.get_monitor(id)?;
        self.watch(monitor).await;
        Ok(())
    }

    fn start_retention(&self) {
        let store = self.store.clone();
        let retention = self.retention;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));

            loop {
                interval.tick().await;
                let cutoff = Utc::now() - retention;
                match store.delete_checks_before(cutoff) {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Retention: deleted {} old checks", n),
                    Err(e) => tracing::error!("Retention: failed to delete old checks: {}", e),
                }
            }
        });
    }
}

/// Run the check loop for a single monitor.
async fn run_check_loop(
    monitor: Monitor,
    store: Arc<Store>,
    tx: mpsc::Sender<CheckRecord>,
    mut stop_rx: tokio::sync::broadcast::Receiver<()>,
) {
    let interval_secs = monitor.check_interval_secs.max(1);

    // Semaphore to limit concurrent in-flight checks (max 3)
    let semaphore = Arc::new(tokio::sync::Semaphore::new(3));

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs as u64));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = interval.tick() => {
                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(p) => p,
                    Err(_) => {
                        tracing::warn!("Skipping check for {} due to overlap limit", monitor.name);
                        continue;
                    }
                };

                let monitor = monitor.clone();
                let tx = tx.clone();
                let store = store.clone();

                tokio::spawn(async move {
                    let _permit = permit; // Hold permit until done

                    // Jitter to avoid thundering herd across monitors
                    let jitter = rand::random::<u64>() % 100;
                    tokio::time::sleep(Duration::from_millis(jitter)).await;

                    match run_check(&monitor).await {
                        Ok(check) => {
                            if let Err(e) =
                                store.record_check_outcome(monitor.id, check.is_expected_status)
                            {
                                tracing::error!(
                                    "Failed to update failure counter for {}: {}",
                                    monitor.name,
                                    e
                                );
                            }

                            if tx.send(check).await.is_err() {
                                tracing::error!("Failed to queue check for {}", monitor.name);
                            }
                        }
                        Err(e) => {
                            tracing::error!("Check failed for {}: {}", monitor.name, e);
                        }
                    }
                });
            }
        }
    }
}

/// Run the batch writer that accumulates and flushes checks.
async fn run_batch_writer(mut rx: mpsc::Receiver<CheckRecord>, store: Arc<Store>) {
    let mut buffer: Vec<CheckRecord> = Vec::with_capacity(100);
    let mut interval = tokio::time::interval(Duration::from_secs(2));

    loop {
        tokio::select! {
            check = rx.recv() => {
                match check {
                    Some(c) => {
                        buffer.push(c);
                        if buffer.len() >= 500 {
                            flush_buffer(&store, &mut buffer);
                        }
                    }
                    None => {
                        // Channel closed, flush remaining and exit
                        flush_buffer(&store, &mut buffer);
                        break;
                    }
                }
            }
            _ = interval.tick() => {
                flush_buffer(&store, &mut buffer);
            }
        }
    }
}

fn flush_buffer(store: &Store, buffer: &mut Vec<CheckRecord>) {
    if buffer.is_empty() {
        return;
    }

    if let Err(e) = store.add_checks(buffer) {
        tracing::error!("Failed to flush checks: {}", e);
    }

    buffer.clear();
}
