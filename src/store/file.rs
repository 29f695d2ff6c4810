//! File-backed table.
//!
//! Each table is a single JSON document at `<dir>/<name>.json`. Every write
//! loads the document, applies the change and replaces the file atomically
//! (see [`crate::persistence::atomic`]), all under an async mutex so writes
//! from concurrent deliveries in this process are serialized.
//!
//! A write costs a full read and rewrite of the document, so partition
//! deletes go through [`Table::delete_batch`], which rewrites once per page
//! rather than once per record.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::state::TableState;
use super::{
    ContinuationToken, DEFAULT_PAGE_SIZE, ETag, Segment, StoreError, Table, TableEntity, TableKey,
};
use crate::persistence::{read_if_exists, write_atomic};

/// A table persisted as one JSON file.
pub struct FileTable<E> {
    name: String,
    path: PathBuf,
    page_size: usize,
    lock: Mutex<()>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: TableEntity> FileTable<E> {
    /// Opens (lazily) the table `name` under `dir`.
    ///
    /// The file is created on first write; a missing file reads as an empty
    /// table.
    pub fn new(dir: &Path, name: impl Into<String>) -> Self {
        Self::with_page_size(dir, name, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(dir: &Path, name: impl Into<String>, page_size: usize) -> Self {
        let name = name.into();
        FileTable {
            path: dir.join(format!("{}.json", name)),
            name,
            page_size,
            lock: Mutex::new(()),
            _entity: PhantomData,
        }
    }

    /// Returns the path of the table document.
    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<TableState<E>, StoreError> {
        match read_if_exists(&self.path)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(TableState::default()),
        }
    }

    fn save(&self, state: &TableState<E>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path, &bytes)?;
        debug!(table = %self.name, records = state.len(), "Table saved");
        Ok(())
    }
}

#[async_trait]
impl<E: TableEntity> Table<E> for FileTable<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn retrieve(&self, key: &TableKey) -> Result<Option<E>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load()?.retrieve(key))
    }

    async fn insert_or_merge(&self, entity: E) -> Result<ETag, StoreError> {
        let _guard = self.lock.lock().await;
        let mut state = self.load()?;
        let etag = state.insert_or_merge(entity);
        self.save(&state)?;
        Ok(etag)
    }

    async fn delete(&self, key: &TableKey, etag: &ETag) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut state = self.load()?;
        let before = state.len();
        state.delete(&self.name, key, etag)?;
        if state.len() != before {
            self.save(&state)?;
        }
        Ok(())
    }

    async fn delete_batch(&self, batch: &[(TableKey, ETag)]) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut state = self.load()?;
        let before = state.len();
        let result = batch
            .iter()
            .try_for_each(|(key, etag)| state.delete(&self.name, key, etag));
        // Deletes applied before a conflict are kept, as with single deletes.
        if state.len() != before {
            self.save(&state)?;
        }
        result
    }

    async fn query_partition(
        &self,
        partition_key: &str,
        continuation: Option<ContinuationToken>,
    ) -> Result<Segment<E>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()?
            .query(partition_key, continuation.as_ref(), self.page_size))
    }
}
