use async_trait::async_trait;
use relay_core::Message;

use crate::error::DeliveryError;

/// Common interface implemented by every delivery backend.
///
/// Implementations must be `Send + Sync`: one sender instance is shared by
/// every job that delivers messages and may be called from several Tokio
/// tasks at once.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Stable lowercase identifier used in logs (e.g. `"webhook"`).
    fn name(&self) -> &str;

    /// Deliver a single message.
    ///
    /// An `Err` only affects this message; callers keep going with the rest
    /// of their batch.
    async fn send(&self, msg: &Message) -> Result<(), DeliveryError>;
}
