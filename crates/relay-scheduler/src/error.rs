use thiserror::Error;

/// Errors returned by [`crate::Scheduler`] control operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// No job is registered under this name.
    #[error("job not found: {name}")]
    NotFound { name: String },

    #[error("job already exists: {name}")]
    AlreadyExists { name: String },

    #[error("job is already running: {name}")]
    AlreadyRunning { name: String },

    #[error("job is not running: {name}")]
    NotRunning { name: String },

    /// Intervals below one millisecond are rejected.
    #[error("invalid interval for job {name}: {interval_ms}ms")]
    InvalidInterval { name: String, interval_ms: u128 },
}

impl SchedulerError {
    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "JOB_NOT_FOUND",
            Self::AlreadyExists { .. } => "JOB_ALREADY_EXISTS",
            Self::AlreadyRunning { .. } => "JOB_ALREADY_RUNNING",
            Self::NotRunning { .. } => "JOB_NOT_RUNNING",
            Self::InvalidInterval { .. } => "INVALID_INTERVAL",
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
