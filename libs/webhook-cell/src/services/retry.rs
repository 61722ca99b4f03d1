// libs/webhook-cell/src/services/retry.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::error::WebhookError;
use crate::models::{ProcessOutcome, SweepReport};
use crate::services::processor::EventProcessor;

/// Re-runs FAILED events that have attempts left, and PENDING events whose
/// first run never finished.
pub struct RetrySweeper {
    processor: Arc<EventProcessor>,
}

impl RetrySweeper {
    pub fn new(processor: Arc<EventProcessor>) -> Self {
        Self { processor }
    }

    #[instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepReport, WebhookError> {
        let events = self.processor.events();
        let stalled = events.list_stalled(self.processor.stalled_cutoff()).await?;
        let retryable = events.list_retryable(self.processor.max_retries()).await?;

        let mut report = SweepReport::default();
        if !stalled.is_empty() {
            warn!("Recovering {} webhook events stuck in PENDING", stalled.len());
        }
        report.recovered = stalled.len();

        for event in stalled.into_iter().chain(retryable) {
            report.attempted += 1;
            match self.processor.process(event.id).await {
                Ok(ProcessOutcome::Processed) => report.processed += 1,
                Ok(ProcessOutcome::Ignored(_)) => report.ignored += 1,
                Ok(ProcessOutcome::Failed(_)) => report.failed += 1,
                Ok(ProcessOutcome::Skipped) => {}
                Err(e) => {
                    warn!("Retry of webhook event {} aborted: {}", event.id, e);
                    report.failed += 1;
                }
            }
        }

        if report.attempted > 0 {
            info!(
                "Webhook retry sweep: {} attempted ({} stalled), {} processed, {} ignored, {} failed",
                report.attempted, report.recovered, report.processed, report.ignored, report.failed
            );
        }
        Ok(report)
    }

    /// Runs [`sweep`](Self::sweep) every `period` until the task is aborted.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep().await {
                    error!("Webhook retry sweep failed: {}", e);
                }
            }
        })
    }
}
