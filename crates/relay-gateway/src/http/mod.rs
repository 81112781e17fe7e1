pub mod error;
pub mod health;
pub mod messages;
pub mod scheduler;
