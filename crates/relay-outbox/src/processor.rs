use std::sync::Arc;

use chrono::Utc;
use relay_delivery::MessageSender;
use tracing::{debug, info, warn};

use crate::{error::CycleError, repository::MessageRepository};

/// Outcome of one delivery cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Unsent messages picked up by the cycle.
    pub fetched: usize,
    /// Messages delivered and marked sent.
    pub sent: usize,
    /// Messages whose delivery failed; they stay unsent.
    pub failed: usize,
}

/// Runs fetch → deliver → mark-sent cycles over a message repository.
pub struct BatchProcessor {
    repo: Arc<dyn MessageRepository>,
    sender: Arc<dyn MessageSender>,
}

impl BatchProcessor {
    pub fn new(repo: Arc<dyn MessageRepository>, sender: Arc<dyn MessageSender>) -> Self {
        Self { repo, sender }
    }

    /// Deliver up to `limit` of the oldest unsent messages.
    ///
    /// Only messages whose delivery succeeded are marked sent, all in one
    /// transaction. When nothing was delivered the transaction is rolled back
    /// and storage is left exactly as it was.
    pub async fn run(&self, limit: usize) -> Result<CycleReport, CycleError> {
        let messages = self
            .repo
            .fetch_unsent(limit)
            .await
            .map_err(CycleError::Fetch)?;

        if messages.is_empty() {
            debug!("no unsent messages to process");
            return Ok(CycleReport::default());
        }

        // Dropping `tx` on any early return below rolls it back.
        let mut tx = self.repo.begin().await.map_err(CycleError::Begin)?;

        let mut delivered = Vec::with_capacity(messages.len());
        for msg in &messages {
            match self.sender.send(msg).await {
                Ok(()) => {
                    debug!(message_id = msg.id, sender = self.sender.name(), "message delivered");
                    delivered.push(msg.id);
                }
                Err(e) => {
                    warn!(
                        message_id = msg.id,
                        sender = self.sender.name(),
                        error = %e,
                        "failed to send message"
                    );
                }
            }
        }

        let report = CycleReport {
            fetched: messages.len(),
            sent: delivered.len(),
            failed: messages.len() - delivered.len(),
        };

        if delivered.is_empty() {
            if let Err(e) = tx.rollback().await {
                warn!(error = %e, "rollback after fully failed cycle returned an error");
            }
            info!(fetched = report.fetched, "no message was delivered this cycle");
            return Ok(report);
        }

        tx.mark_sent(&delivered, Utc::now())
            .await
            .map_err(CycleError::MarkSent)?;
        tx.commit().await.map_err(CycleError::Commit)?;

        info!(
            fetched = report.fetched,
            sent = report.sent,
            failed = report.failed,
            "processed message batch"
        );
        Ok(report)
    }
}
