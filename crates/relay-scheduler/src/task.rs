use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Handed to every task invocation.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_name: String,
    /// Cancelled when the current run of the job is stopped. Long tasks may
    /// poll it; the loop itself only observes it between invocations.
    pub cancellation_token: CancellationToken,
}

/// Work performed on every tick of a job.
///
/// An `Err` is logged by the job loop and the job keeps ticking.
#[async_trait]
pub trait Task: Send + Sync {
    async fn run(&self, ctx: &JobContext) -> anyhow::Result<()>;
}

/// Adapts an async closure into a [`Task`].
pub struct FnTask<F>(pub F);

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, ctx: &JobContext) -> anyhow::Result<()> {
        (self.0)(ctx.clone()).await
    }
}
