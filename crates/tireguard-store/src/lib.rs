//! Durable local store for writes awaiting the backing store

pub mod outbox;

pub use outbox::{Outbox, OutboxCommand, OutboxEntry};
