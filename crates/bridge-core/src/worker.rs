//! Background document retry
//!
//! Periodically asks the orchestrator for leads whose document is missing
//! and due, until the shutdown signal flips to `true`.

use crate::orchestrator::{IntakeOrchestrator, RetrySummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Drives [`IntakeOrchestrator::retry_due_documents`] on an interval
#[derive(Debug, Clone)]
pub struct DocumentRetryWorker {
    orchestrator: Arc<IntakeOrchestrator>,
    interval: Duration,
}

impl DocumentRetryWorker {
    /// Uses the orchestrator's configured scan interval
    #[must_use]
    pub fn new(orchestrator: Arc<IntakeOrchestrator>) -> Self {
        let interval = orchestrator.document_retry().scan_interval();
        Self {
            orchestrator,
            interval,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// A single scan; errors are logged, not returned
    pub async fn run_once(&self) -> RetrySummary {
        match self.orchestrator.retry_due_documents().await {
            Ok(summary) => {
                if summary.scanned > 0 {
                    tracing::info!(
                        scanned = summary.scanned,
                        stored = summary.stored,
                        failed = summary.failed,
                        skipped = summary.skipped,
                        "document retry pass"
                    );
                }
                summary
            }
            Err(e) => {
                tracing::warn!(error = %e, "document retry scan failed");
                RetrySummary::default()
            }
        }
    }

    /// Run until `shutdown` becomes `true` or its sender is dropped
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if *shutdown.borrow() {
                return;
            }
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_ms = ?self.interval.as_millis(), "document retry worker started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("document retry worker stopped");
        })
    }
}
