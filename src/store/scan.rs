//! Lazy, paginated partition scans.

use super::{ContinuationToken, StoreError, Table, TableEntity};

enum Cursor {
    Start,
    Next(ContinuationToken),
    Exhausted,
}

/// Walks every record of one partition, one page at a time.
///
/// Only the current page is held in memory. The scan follows continuation
/// tokens until the table returns a page without one; a page may be empty
/// while still carrying a token, in which case the scan moves on to the next
/// page rather than stopping.
///
/// # Example
///
/// ```ignore
/// let mut scan = PartitionScan::new(&installations, "654321");
/// while let Some(batch) = scan.next_batch().await? {
///     for record in batch {
///         installations.delete(&record.key(), record.etag()).await?;
///     }
/// }
/// ```
pub struct PartitionScan<'a, E: TableEntity> {
    table: &'a dyn Table<E>,
    partition_key: String,
    cursor: Cursor,
    pages: usize,
}

impl<'a, E: TableEntity> PartitionScan<'a, E> {
    pub fn new(table: &'a dyn Table<E>, partition_key: impl Into<String>) -> Self {
        PartitionScan {
            table,
            partition_key: partition_key.into(),
            cursor: Cursor::Start,
            pages: 0,
        }
    }

    /// Fetches the next page, or `None` once the partition is exhausted.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<E>>, StoreError> {
        let continuation = match std::mem::replace(&mut self.cursor, Cursor::Exhausted) {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Exhausted => return Ok(None),
        };

        let segment = self
            .table
            .query_partition(&self.partition_key, continuation)
            .await?;
        self.pages += 1;

        if let Some(token) = segment.continuation {
            self.cursor = Cursor::Next(token);
        }
        Ok(Some(segment.entities))
    }

    /// Returns how many pages have been fetched.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }
}
