use async_trait::async_trait;
use relay_outbox::BatchProcessor;
use relay_scheduler::{JobContext, Task};
use tracing::debug;

/// Scheduler task that runs one outbox delivery cycle per tick.
pub struct DeliverMessagesJob {
    processor: BatchProcessor,
    limit: usize,
}

impl DeliverMessagesJob {
    pub fn new(processor: BatchProcessor, limit: usize) -> Self {
        Self { processor, limit }
    }
}

#[async_trait]
impl Task for DeliverMessagesJob {
    async fn run(&self, ctx: &JobContext) -> anyhow::Result<()> {
        let report = self.processor.run(self.limit).await?;
        debug!(
            job = %ctx.job_name,
            fetched = report.fetched,
            sent = report.sent,
            failed = report.failed,
            "delivery cycle finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use relay_core::NewMessage;
    use relay_delivery::LogSender;
    use relay_outbox::SqliteMessageRepository;

    fn ctx() -> JobContext {
        JobContext {
            job_name: "fetch-messages".to_string(),
            cancellation_token: Default::default(),
        }
    }

    #[tokio::test]
    async fn each_run_delivers_one_batch() {
        let repo = Arc::new(
            SqliteMessageRepository::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap(),
        );
        for i in 0..3 {
            repo.insert(&NewMessage {
                content: format!("msg {i}"),
                author: "alice".to_string(),
            })
            .await
            .unwrap();
        }
        let job = DeliverMessagesJob::new(
            BatchProcessor::new(repo.clone(), Arc::new(LogSender::new())),
            2,
        );

        job.run(&ctx()).await.unwrap();
        assert_eq!(repo.fetch_sent().await.unwrap().len(), 2);
        job.run(&ctx()).await.unwrap();
        assert_eq!(repo.fetch_sent().await.unwrap().len(), 3);
    }
}
