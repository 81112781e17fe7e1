use thiserror::Error;

/// Errors raised by message storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A message could not be stored as given.
    #[error("invalid message: {0}")]
    Validation(String),
}

/// Errors that abort a whole delivery cycle.
///
/// Any partial progress made before the failure is rolled back. Per-message
/// delivery failures are not represented here: they are absorbed by the cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to fetch unsent messages: {0}")]
    Fetch(#[source] StoreError),

    #[error("failed to begin transaction: {0}")]
    Begin(#[source] StoreError),

    #[error("failed to mark messages as sent: {0}")]
    MarkSent(#[source] StoreError),

    #[error("failed to commit transaction: {0}")]
    Commit(#[source] StoreError),
}
