use std::time::Duration;

use async_trait::async_trait;
use relay_core::Message;
use serde_json::json;
use tracing::{debug, warn};

use crate::{error::DeliveryError, sender::MessageSender};

/// Delivers each message as a JSON `POST` to a fixed endpoint.
///
/// Any 2xx answer counts as delivered. Everything else, including a timeout,
/// leaves the message unsent for the next cycle.
pub struct WebhookSender {
    client: reqwest::Client,
    url: String,
    timeout_ms: u64,
}

impl WebhookSender {
    pub fn new(url: &str, timeout_ms: u64) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| DeliveryError::ConfigError(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
            timeout_ms,
        })
    }
}

#[async_trait]
impl MessageSender for WebhookSender {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, msg: &Message) -> Result<(), DeliveryError> {
        let body = json!({
            "id": msg.id,
            "content": msg.content,
            "author": msg.author,
            "created_at": msg.created_at.to_rfc3339(),
        });

        debug!(message_id = msg.id, url = %self.url, "posting message to webhook");

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout { ms: self.timeout_ms }
                } else {
                    DeliveryError::SendFailed(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(message_id = msg.id, status = status.as_u16(), "webhook rejected message");
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
