pub mod error;
pub mod log;
pub mod sender;
pub mod webhook;

use std::sync::Arc;

use relay_core::config::{DeliveryConfig, DeliveryMode};

pub use error::DeliveryError;
pub use log::LogSender;
pub use sender::MessageSender;
pub use webhook::WebhookSender;

/// Build the sender selected by `[delivery]` in the config.
pub fn from_config(config: &DeliveryConfig) -> Result<Arc<dyn MessageSender>, DeliveryError> {
    match config.mode {
        DeliveryMode::Log => Ok(Arc::new(LogSender::new())),
        DeliveryMode::Webhook => {
            let url = config.webhook_url.as_deref().ok_or_else(|| {
                DeliveryError::ConfigError("delivery.webhook_url is not set".to_string())
            })?;
            Ok(Arc::new(WebhookSender::new(url, config.timeout_ms)?))
        }
    }
}
