//! In-memory table.
//!
//! Behaves like a real table (ETags, conflicts, pagination) and additionally
//! records every operation issued against it, so callers can assert exactly
//! which reads and writes a delivery caused.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::state::TableState;
use super::{
    ContinuationToken, DEFAULT_PAGE_SIZE, ETag, Segment, StoreError, Table, TableEntity, TableKey,
};

/// An operation issued against a [`MemoryTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOp<E> {
    Retrieve(TableKey),
    /// The record as presented to the table, before it assigned an ETag.
    InsertOrMerge(E),
    Delete { key: TableKey, etag: ETag },
    Query {
        partition_key: String,
        continuation: Option<ContinuationToken>,
    },
}

/// The kind of a [`TableOp`], for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableOpKind {
    Retrieve,
    InsertOrMerge,
    Delete,
    Query,
}

impl<E> TableOp<E> {
    pub fn kind(&self) -> TableOpKind {
        match self {
            TableOp::Retrieve(_) => TableOpKind::Retrieve,
            TableOp::InsertOrMerge(_) => TableOpKind::InsertOrMerge,
            TableOp::Delete { .. } => TableOpKind::Delete,
            TableOp::Query { .. } => TableOpKind::Query,
        }
    }
}

struct Inner<E> {
    state: TableState<E>,
    ops: Vec<TableOp<E>>,
}

/// A table held entirely in memory.
pub struct MemoryTable<E> {
    name: String,
    page_size: usize,
    inner: Mutex<Inner<E>>,
    unavailable: AtomicBool,
}

impl<E: TableEntity> MemoryTable<E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_page_size(name, DEFAULT_PAGE_SIZE)
    }

    /// Creates a table whose partition queries return at most `page_size`
    /// records per page.
    pub fn with_page_size(name: impl Into<String>, page_size: usize) -> Self {
        MemoryTable {
            name: name.into(),
            page_size,
            inner: Mutex::new(Inner {
                state: TableState::default(),
                ops: Vec::new(),
            }),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Stores a record without recording an operation. Returns its ETag.
    pub async fn seed(&self, entity: E) -> ETag {
        self.inner.lock().await.state.insert_or_merge(entity)
    }

    /// Returns every operation issued so far, in order.
    pub async fn ops(&self) -> Vec<TableOp<E>> {
        self.inner.lock().await.ops.clone()
    }

    /// Returns how many operations of `kind` were issued.
    pub async fn count(&self, kind: TableOpKind) -> usize {
        self.inner
            .lock()
            .await
            .ops
            .iter()
            .filter(|op| op.kind() == kind)
            .count()
    }

    /// Returns true if no operation has been issued.
    pub async fn untouched(&self) -> bool {
        self.inner.lock().await.ops.is_empty()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.state.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Makes every subsequent operation fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                table: self.name.clone(),
                reason: "simulated outage".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<E: TableEntity> Table<E> for MemoryTable<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn retrieve(&self, key: &TableKey) -> Result<Option<E>, StoreError> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        inner.ops.push(TableOp::Retrieve(key.clone()));
        Ok(inner.state.retrieve(key))
    }

    async fn insert_or_merge(&self, entity: E) -> Result<ETag, StoreError> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        inner.ops.push(TableOp::InsertOrMerge(entity.clone()));
        Ok(inner.state.insert_or_merge(entity))
    }

    async fn delete(&self, key: &TableKey, etag: &ETag) -> Result<(), StoreError> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        inner.ops.push(TableOp::Delete {
            key: key.clone(),
            etag: etag.clone(),
        });
        inner.state.delete(&self.name, key, etag)
    }

    async fn query_partition(
        &self,
        partition_key: &str,
        continuation: Option<ContinuationToken>,
    ) -> Result<Segment<E>, StoreError> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        inner.ops.push(TableOp::Query {
            partition_key: partition_key.to_string(),
            continuation: continuation.clone(),
        });
        Ok(inner
            .state
            .query(partition_key, continuation.as_ref(), self.page_size))
    }
}
