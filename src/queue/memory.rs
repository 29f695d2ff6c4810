//! In-memory queue that records every message it receives.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use super::{MessageQueue, QueueError};

/// A queue that keeps message bodies in memory, in enqueue order.
#[derive(Debug)]
pub struct MemoryQueue {
    name: String,
    messages: Mutex<Vec<String>>,
    unavailable: AtomicBool,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryQueue {
            name: name.into(),
            messages: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Returns the number of messages received so far.
    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Decodes every message body as `T`.
    pub async fn decode<T: DeserializeOwned>(&self) -> Result<Vec<T>, QueueError> {
        self.messages
            .lock()
            .await
            .iter()
            .map(|body| serde_json::from_str(body).map_err(QueueError::from))
            .collect()
    }

    /// Makes every subsequent write fail with [`QueueError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add_message(&self, body: String) -> Result<(), QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable {
                queue: self.name.clone(),
                reason: "simulated outage".to_string(),
            });
        }
        self.messages.lock().await.push(body);
        Ok(())
    }
}
