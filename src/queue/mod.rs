//! Outbound message queues.
//!
//! The dispatcher only ever appends to a queue; the workers that drain them
//! live elsewhere. Two queues exist:
//!
//! - the router queue, which receives [`RouterMessage`] build requests
//! - the open-pr queue, which receives [`OpenPrMessage`] pull-request requests
//!
//! # Backends
//!
//! - [`MemoryQueue`]: records messages in memory (tests, `--in-memory`)
//! - [`SpoolQueue`]: one durable file per message under a directory

use std::io;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod message;
pub mod spool;

pub use memory::MemoryQueue;
pub use message::{OpenPrMessage, RouterMessage};
pub use spool::SpoolQueue;

/// Errors that can occur while writing to a queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue backend refused or could not be reached.
    #[error("queue {queue} unavailable: {reason}")]
    Unavailable { queue: String, reason: String },

    /// IO error writing a spooled message.
    #[error("queue IO error: {0}")]
    Io(#[from] io::Error),

    /// The message could not be serialized.
    #[error("queue message encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A write-only message sink.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// The logical queue name (e.g., `router`).
    fn name(&self) -> &str;

    /// Appends one message body to the queue.
    async fn add_message(&self, body: String) -> Result<(), QueueError>;
}
