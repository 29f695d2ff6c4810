//! Table contents and the operations on them, shared by the memory and file
//! backends.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use super::{ContinuationToken, ETag, Segment, StoreError, TableEntity, TableKey};

/// All records of one table, grouped by partition and ordered by row key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TableState<E> {
    /// Version counter backing ETag generation. Never reused.
    next_version: u64,
    partitions: BTreeMap<String, BTreeMap<String, E>>,
}

impl<E> Default for TableState<E> {
    fn default() -> Self {
        TableState {
            next_version: 0,
            partitions: BTreeMap::new(),
        }
    }
}

impl<E: TableEntity> TableState<E> {
    pub(crate) fn retrieve(&self, key: &TableKey) -> Option<E> {
        self.partitions
            .get(&key.partition_key)
            .and_then(|rows| rows.get(&key.row_key))
            .cloned()
    }

    pub(crate) fn insert_or_merge(&mut self, mut entity: E) -> ETag {
        self.next_version += 1;
        let etag = ETag::new(format!("W/\"{}\"", self.next_version));
        entity.set_etag(etag.clone());

        let key = entity.key();
        self.partitions
            .entry(key.partition_key)
            .or_default()
            .insert(key.row_key, entity);
        etag
    }

    pub(crate) fn delete(
        &mut self,
        table: &str,
        key: &TableKey,
        etag: &ETag,
    ) -> Result<(), StoreError> {
        let Some(rows) = self.partitions.get_mut(&key.partition_key) else {
            return Ok(());
        };
        let Some(existing) = rows.get(&key.row_key) else {
            return Ok(());
        };

        if !etag.permits(existing.etag()) {
            return Err(StoreError::ConcurrencyConflict {
                table: table.to_string(),
                key: key.clone(),
                presented: etag.clone(),
            });
        }

        rows.remove(&key.row_key);
        if rows.is_empty() {
            self.partitions.remove(&key.partition_key);
        }
        Ok(())
    }

    /// Returns up to `page_size` records of `partition_key` starting at the
    /// row named by `continuation`.
    ///
    /// The continuation token is the row key of the first record of the next
    /// page, so deleting records already returned does not shift later pages.
    pub(crate) fn query(
        &self,
        partition_key: &str,
        continuation: Option<&ContinuationToken>,
        page_size: usize,
    ) -> Segment<E> {
        let Some(rows) = self.partitions.get(partition_key) else {
            return Segment {
                entities: Vec::new(),
                continuation: None,
            };
        };

        let start = continuation.map(|t| t.0.as_str()).unwrap_or("");
        let mut range = rows.range::<str, _>((Bound::Included(start), Bound::Unbounded));

        let entities = range
            .by_ref()
            .take(page_size.max(1))
            .map(|(_, entity)| entity.clone())
            .collect();
        let continuation = range
            .next()
            .map(|(row_key, _)| ContinuationToken(row_key.clone()));

        Segment {
            entities,
            continuation,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }
}
