// src/worker.rs

use std::time::Duration;
use tokio::task::JoinHandle;

use crate::AppState;
use crate::services::{registry_sync, webhooks};

/// Starts the reconciliation loop. Returns `None` when the interval is 0.
pub fn spawn(state: AppState) -> Option<JoinHandle<()>> {
    let interval = state.config.reconcile_interval_secs;
    if interval == 0 {
        log::warn!("RECONCILE_INTERVAL_SECS=0, reconciliation worker disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(interval)).await;
            run_once(&state).await;
        }
    }))
}

/// One reconciliation pass: stuck webhook events first, then failed registry notices.
pub async fn run_once(state: &AppState) {
    let batch_size = state.config.reconcile_batch_size;

    match webhooks::reprocess_pending(state, batch_size).await {
        Ok(s) if s.attempted > 0 => log::info!(
            "worker: webhook events attempted={} processed={} unmatched={} failed={}",
            s.attempted,
            s.processed,
            s.unmatched,
            s.failed
        ),
        Ok(_) => {}
        Err(e) => log::error!("worker: webhook reprocess error: {e}"),
    }

    match registry_sync::retry_failed(state, batch_size).await {
        Ok(s) if s.attempted > 0 => log::info!(
            "worker: registry retries attempted={} sent={} failed={}",
            s.attempted,
            s.sent,
            s.failed
        ),
        Ok(_) => {}
        Err(e) => log::error!("worker: registry retry error: {e}"),
    }
}
