//! `relay-outbox`: durable outbound messages and the cycle that delivers them.
//!
//! # Overview
//!
//! Messages live in a SQLite `messages` table. A [`processor::BatchProcessor`]
//! cycle picks up the oldest unsent rows, hands each one to a
//! [`relay_delivery::MessageSender`] and, inside a single transaction, marks
//! exactly the delivered ones as sent. Rows whose delivery failed are left
//! untouched and are picked up again by a later cycle.

pub mod db;
pub mod error;
pub mod processor;
pub mod repository;
pub mod store;

pub use error::{CycleError, StoreError};
pub use processor::{BatchProcessor, CycleReport};
pub use repository::{MessageRepository, OutboxTx};
pub use store::SqliteMessageRepository;
