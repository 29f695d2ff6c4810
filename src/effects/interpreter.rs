//! Executes a [`Decision`] against the queues and tables.
//!
//! The interpreter performs the actions in order and stops at the first
//! failure. Actions already performed stay performed; the sender's retry
//! re-runs the whole delivery, and every write here is either an enqueue
//! (duplicates are tolerated downstream) or idempotent on replay.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::{Action, Decision, Status};
use crate::queue::{MessageQueue, QueueError};
use crate::store::{
    ETag, InstallationRecord, MarketplaceRecord, PartitionScan, StoreError, Table, TableEntity,
    TableKey,
};

/// The queues and tables a delivery may touch.
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct Collaborators {
    /// Receives build requests.
    pub router_queue: Arc<dyn MessageQueue>,

    /// Receives pull-request requests for the bot's branch.
    pub open_pr_queue: Arc<dyn MessageQueue>,

    /// One record per installed repository.
    pub installations: Arc<dyn Table<InstallationRecord>>,

    /// One record per marketplace account.
    pub marketplace: Arc<dyn Table<MarketplaceRecord>>,
}

/// Errors from executing a decision.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// The result of executing a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    pub status: Status,

    /// Number of messages enqueued plus records written or deleted.
    pub writes: usize,
}

/// Performs every action of `decision`, in order.
pub async fn execute(
    decision: Decision,
    collaborators: &Collaborators,
) -> Result<Dispatched, DispatchError> {
    let mut writes = 0;
    for action in decision.actions {
        debug!(action = action.name(), "executing action");
        writes += execute_action(action, collaborators).await?;
    }
    Ok(Dispatched {
        status: decision.status,
        writes,
    })
}

async fn execute_action(
    action: Action,
    collaborators: &Collaborators,
) -> Result<usize, DispatchError> {
    match action {
        Action::NoOp(reason) => {
            debug!(%reason, "nothing to do");
            Ok(0)
        }

        Action::EnqueueBuild(message) => {
            enqueue(collaborators.router_queue.as_ref(), &message).await?;
            info!(
                installation_id = %message.installation_id,
                owner = %message.owner,
                repo = %message.repo_name,
                "queued build request"
            );
            Ok(1)
        }

        Action::EnqueueOpenPr(message) => {
            enqueue(collaborators.open_pr_queue.as_ref(), &message).await?;
            info!(
                installation_id = %message.installation_id,
                repo = %message.repo_name,
                "queued pull request"
            );
            Ok(1)
        }

        Action::UpsertMarketplace(record) => {
            let key = record.key();
            let etag = collaborators.marketplace.insert_or_merge(record).await?;
            info!(%key, %etag, "stored marketplace record");
            Ok(1)
        }

        Action::DeleteMarketplace { key, etag } => {
            delete(collaborators.marketplace.as_ref(), &key, &etag).await?;
            Ok(1)
        }

        Action::DeleteInstallationRepo { key, etag } => {
            delete(collaborators.installations.as_ref(), &key, &etag).await?;
            Ok(1)
        }

        Action::DeleteInstallationPartition { partition_key } => {
            let deleted =
                delete_partition(collaborators.installations.as_ref(), &partition_key).await?;
            Ok(deleted)
        }
    }
}

async fn enqueue<M: Serialize>(queue: &dyn MessageQueue, message: &M) -> Result<(), QueueError> {
    let body = serde_json::to_string(message)?;
    queue.add_message(body).await
}

async fn delete<E: TableEntity>(
    table: &dyn Table<E>,
    key: &TableKey,
    etag: &ETag,
) -> Result<(), StoreError> {
    table.delete(key, etag).await?;
    info!(table = table.name(), %key, "deleted record");
    Ok(())
}

/// Deletes every record in `partition_key`, one batch per page.
///
/// Each record is deleted with the ETag it was read with, so a record
/// rewritten mid-scan surfaces as a conflict instead of being lost.
async fn delete_partition<E: TableEntity>(
    table: &dyn Table<E>,
    partition_key: &str,
) -> Result<usize, StoreError> {
    let mut scan = PartitionScan::new(table, partition_key);
    let mut deleted = 0;
    while let Some(batch) = scan.next_batch().await? {
        let page: Vec<(TableKey, ETag)> = batch
            .iter()
            .map(|record| (record.key(), record.etag().clone()))
            .collect();
        table.delete_batch(&page).await?;
        deleted += page.len();
    }
    info!(
        table = table.name(),
        partition = partition_key,
        deleted,
        pages = scan.pages_fetched(),
        "deleted partition"
    );
    Ok(deleted)
}
