//! Persistent record store.
//!
//! Records live in named tables and are addressed by a [`TableKey`]: a
//! partition key grouping related records plus a row key identifying one
//! record within the partition. Two tables exist:
//!
//! - `installations`: partition = installation ID, row = repository name
//! - `marketplace`: partition = account ID, row = account login
//!
//! # Optimistic Concurrency
//!
//! Every record read from a table carries the [`ETag`] the table assigned on
//! its last write. Deletes must present that ETag; if the record has been
//! rewritten since, the table rejects the delete with
//! [`StoreError::ConcurrencyConflict`] instead of silently removing the newer
//! version. [`ETag::any`] (`*`) opts out of the check.
//!
//! Deleting a record that no longer exists succeeds without effect.
//!
//! # Pagination
//!
//! [`Table::query_partition`] returns one [`Segment`] at a time together with
//! an opaque [`ContinuationToken`] for the next page. [`PartitionScan`] walks
//! those pages lazily until the table reports no further pages.

use std::fmt;
use std::io;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod file;
pub mod memory;
pub mod records;
pub mod scan;
mod state;

pub use file::FileTable;
pub use memory::{MemoryTable, TableOp, TableOpKind};
pub use records::{InstallationRecord, MarketplaceRecord};
pub use scan::PartitionScan;

/// Logical name of the installations table.
pub const INSTALLATIONS_TABLE: &str = "installations";

/// Logical name of the marketplace table.
pub const MARKETPLACE_TABLE: &str = "marketplace";

/// Default number of records returned per partition query page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Composite key locating a record in a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableKey {
    pub partition_key: String,
    pub row_key: String,
}

impl TableKey {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        TableKey {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.row_key)
    }
}

/// Opaque version marker assigned by a table on every write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    const WILDCARD: &'static str = "*";

    pub fn new(s: impl Into<String>) -> Self {
        ETag(s.into())
    }

    /// The wildcard ETag, which matches any stored version.
    pub fn any() -> Self {
        ETag(Self::WILDCARD.to_string())
    }

    pub fn is_any(&self) -> bool {
        self.0 == Self::WILDCARD
    }

    /// Returns true if a write presenting `self` may replace `current`.
    pub fn permits(&self, current: &ETag) -> bool {
        self.is_any() || self == current
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ETag {
    fn default() -> Self {
        ETag::any()
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque cursor pointing at the next page of a partition query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(pub(crate) String);

/// One page of a partition query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<E> {
    pub entities: Vec<E>,

    /// Present if the table has more records for this partition.
    pub continuation: Option<ContinuationToken>,
}

/// Errors that can occur talking to a table.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A delete or merge presented an ETag that no longer matches the record.
    #[error("concurrency conflict on {table} record {key}: ETag {presented} is stale")]
    ConcurrencyConflict {
        table: String,
        key: TableKey,
        presented: ETag,
    },

    /// The table backend refused or could not be reached.
    #[error("table {table} unavailable: {reason}")]
    Unavailable { table: String, reason: String },

    /// IO error reading or writing a table file.
    #[error("table IO error: {0}")]
    Io(#[from] io::Error),

    /// A table file could not be encoded or decoded.
    #[error("table encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for transport-level failures (as opposed to conflicts).
    pub fn is_unavailable(&self) -> bool {
        !self.is_conflict()
    }

    /// Returns true if a presented ETag was stale.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

/// A record that can live in a table.
pub trait TableEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the key this record is stored under.
    fn key(&self) -> TableKey;

    /// Returns the ETag the record was read with.
    fn etag(&self) -> &ETag;

    /// Replaces the record's ETag. Called by tables on every write and read.
    fn set_etag(&mut self, etag: ETag);
}

/// A table of records of type `E`.
#[async_trait]
pub trait Table<E: TableEntity>: Send + Sync {
    /// The logical table name (e.g., `installations`).
    fn name(&self) -> &str;

    /// Reads a single record, returning `None` if it does not exist.
    async fn retrieve(&self, key: &TableKey) -> Result<Option<E>, StoreError>;

    /// Creates the record if absent, otherwise overwrites its properties.
    ///
    /// Returns the record's new ETag.
    async fn insert_or_merge(&self, entity: E) -> Result<ETag, StoreError>;

    /// Deletes a record if `etag` still matches its stored version.
    ///
    /// Deleting a record that does not exist is a no-op.
    async fn delete(&self, key: &TableKey, etag: &ETag) -> Result<(), StoreError>;

    /// Deletes several records, each with the ETag it was read with.
    ///
    /// Deletes are applied in order and stop at the first conflict; those
    /// before it stay applied. Backends that rewrite a whole document per
    /// write override this to write once per batch.
    async fn delete_batch(&self, batch: &[(TableKey, ETag)]) -> Result<(), StoreError> {
        for (key, etag) in batch {
            self.delete(key, etag).await?;
        }
        Ok(())
    }

    /// Returns one page of the records in `partition_key`, in row key order.
    async fn query_partition(
        &self,
        partition_key: &str,
        continuation: Option<ContinuationToken>,
    ) -> Result<Segment<E>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_etag_permits_any_version() {
        assert!(ETag::any().permits(&ETag::new("W/\"3\"")));
        assert!(ETag::any().is_any());
    }

    #[test]
    fn concrete_etag_permits_only_itself() {
        let current = ETag::new("W/\"3\"");
        assert!(ETag::new("W/\"3\"").permits(&current));
        assert!(!ETag::new("W/\"2\"").permits(&current));
    }

    #[test]
    fn default_etag_is_wildcard() {
        assert_eq!(ETag::default(), ETag::any());
    }

    #[test]
    fn table_key_display() {
        assert_eq!(TableKey::new("654321", "repo1").to_string(), "654321/repo1");
    }

    #[test]
    fn conflict_is_not_unavailability() {
        let conflict = StoreError::ConcurrencyConflict {
            table: INSTALLATIONS_TABLE.to_string(),
            key: TableKey::new("1", "r"),
            presented: ETag::new("old"),
        };
        assert!(!conflict.is_unavailable());

        let outage = StoreError::Unavailable {
            table: MARKETPLACE_TABLE.to_string(),
            reason: "down".to_string(),
        };
        assert!(outage.is_unavailable());
    }
}
