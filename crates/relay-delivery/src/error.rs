use thiserror::Error;

/// Errors a single delivery attempt can end with.
///
/// These never abort a processing cycle: the message is skipped and stays
/// unsent until a later cycle picks it up again.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The transport failed before a response was received.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The remote endpoint answered with a non-success status.
    #[error("Delivery rejected with HTTP {status}")]
    Rejected { status: u16 },

    /// The remote endpoint did not answer in time.
    #[error("Delivery timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The sender configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
