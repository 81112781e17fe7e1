use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The config file or environment could not be parsed, or a value is
    /// out of range.
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
