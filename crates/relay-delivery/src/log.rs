use async_trait::async_trait;
use relay_core::Message;
use tracing::info;

use crate::{error::DeliveryError, sender::MessageSender};

/// Sender that only records the message in the log and always succeeds.
#[derive(Debug, Default)]
pub struct LogSender;

impl LogSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageSender for LogSender {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, msg: &Message) -> Result<(), DeliveryError> {
        info!(
            message_id = msg.id,
            author = %msg.author,
            content = %msg.content,
            "sending message"
        );
        Ok(())
    }
}
