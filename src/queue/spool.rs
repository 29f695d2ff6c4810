//! File-backed queue.
//!
//! Each message is written atomically to its own file:
//!
//! ```text
//! <queue_dir>/<timestamp>-<seq>.json
//! ```
//!
//! The timestamp is UTC with microsecond precision and the sequence number is
//! per-process, so lexical file order is enqueue order for a single
//! dispatcher. Consumers claim a message by renaming or deleting its file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{MessageQueue, QueueError};
use crate::persistence::write_atomic;

/// A queue that spools each message into a directory.
#[derive(Debug)]
pub struct SpoolQueue {
    name: String,
    dir: PathBuf,
    next_seq: AtomicU64,
}

impl SpoolQueue {
    /// Creates a spool queue named `name` under `root`.
    ///
    /// Messages land in `<root>/<name>/`. The directory is created on first
    /// write.
    pub fn new(root: &Path, name: impl Into<String>) -> Self {
        let name = name.into();
        SpoolQueue {
            dir: root.join(&name),
            name,
            next_seq: AtomicU64::new(0),
        }
    }

    /// Returns the directory messages are spooled into.
    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the paths of all spooled messages in enqueue order.
    #[cfg(test)]
    pub fn message_paths(&self) -> Result<Vec<PathBuf>, QueueError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn next_path(&self) -> PathBuf {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
        self.dir.join(format!("{}-{:010}.json", stamp, seq))
    }
}

#[async_trait]
impl MessageQueue for SpoolQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add_message(&self, body: String) -> Result<(), QueueError> {
        let path = self.next_path();
        write_atomic(&path, body.as_bytes())?;
        debug!(queue = %self.name, path = %path.display(), "Spooled queue message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn spools_one_file_per_message() {
        let root = tempdir().unwrap();
        let queue = SpoolQueue::new(root.path(), "router");

        queue.add_message("{\"n\":1}".to_string()).await.unwrap();
        queue.add_message("{\"n\":2}".to_string()).await.unwrap();

        let paths = queue.message_paths().unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.starts_with(root.path().join("router"))));
        assert_eq!(std::fs::read_to_string(&paths[0]).unwrap(), "{\"n\":1}");
        assert_eq!(std::fs::read_to_string(&paths[1]).unwrap(), "{\"n\":2}");
    }

    #[tokio::test]
    async fn empty_queue_has_no_messages() {
        let root = tempdir().unwrap();
        let queue = SpoolQueue::new(root.path(), "open-pr");

        assert!(queue.message_paths().unwrap().is_empty());
        assert_eq!(queue.dir(), root.path().join("open-pr"));
    }

    #[tokio::test]
    async fn file_names_sort_in_enqueue_order() {
        let root = tempdir().unwrap();
        let queue = SpoolQueue::new(root.path(), "router");

        for n in 0..20 {
            queue.add_message(n.to_string()).await.unwrap();
        }

        let bodies: Vec<String> = queue
            .message_paths()
            .unwrap()
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();
        let expected: Vec<String> = (0..20).map(|n: i32| n.to_string()).collect();
        assert_eq!(bodies, expected);
    }
}
