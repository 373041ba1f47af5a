//! RetentionLoop - 定期的な retention 実行
//!
//! # フロー
//! 1. interval ごとに RetentionManager::evict を実行
//! 2. 結果をログに出す（失敗してもループは止めない）
//! 3. shutdown シグナルで終了

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::domain::RetentionPolicy;

use super::retention::RetentionManager;

/// Handle to a running retention loop.
/// - `request_shutdown` stops it after the current pass
/// - `shutdown_and_join` waits for it to finish
pub struct RetentionLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<usize>,
}

impl RetentionLoop {
    /// Spawn on the current runtime. The first pass runs immediately.
    pub fn spawn(manager: RetentionManager, policy: RetentionPolicy, period: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(run_loop(manager, policy, period, shutdown_rx));
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop and wait. Returns the number of passes that ran.
    pub async fn shutdown_and_join(self) -> usize {
        self.request_shutdown();
        self.join.await.unwrap_or_default()
    }
}

async fn run_loop(
    manager: RetentionManager,
    policy: RetentionPolicy,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> usize {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut passes = 0;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender dropped counts as shutdown
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        passes += 1;
        match manager.evict(&policy).await {
            Ok(report) if report.is_complete() => {
                if report.evicted_count() > 0 {
                    info!(pass = passes, evicted = report.evicted_count(), "retention pass");
                }
            }
            Ok(report) => warn!(
                pass = passes,
                evicted = report.evicted_count(),
                failed = report.failures.len(),
                "retention pass incomplete"
            ),
            Err(e) => warn!(pass = passes, error = %e, "retention pass failed"),
        }
    }

    passes
}
