//! Effects-as-data for queue and table writes.
//!
//! The classifier never writes anything itself. It returns a [`Decision`]:
//! the status text the delivery reports plus the [`Action`]s that produce
//! it. The interpreter then performs exactly those writes. This keeps the
//! classification rules testable without any I/O and makes every delivery's
//! side effects inspectable before they happen.

use std::fmt;

pub mod interpreter;

pub use interpreter::{Collaborators, DispatchError, Dispatched, execute};

use crate::queue::{OpenPrMessage, RouterMessage};
use crate::store::{ETag, MarketplaceRecord, TableKey};

/// The status text a delivery reports in its response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Push to a branch other than the default branch.
    NonDefaultBranch,
    /// Push to the default branch that touched no images.
    NoImagesTouched,
    /// The bot pushed to its own branch; a pull request is requested.
    BotPush,
    /// Build requests were queued or installation records were dropped.
    Queued,
    /// A marketplace plan was recorded.
    Purchased,
    /// A marketplace plan was removed.
    Cancelled,
    /// A marketplace plan was switched.
    Changed,
    /// An installation action this dispatcher ignores.
    UnhandledInstallationAction,
    /// A marketplace action this dispatcher ignores.
    UnhandledMarketplaceAction,
}

impl Status {
    /// Returns the response text for this status.
    ///
    /// `Queued` reports the literal `"truth"`. Downstream tooling matches on
    /// it verbatim, so it must not be reworded.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NonDefaultBranch => "Commit to non default branch",
            Status::NoImagesTouched => "No image files touched",
            Status::BotPush => "imgbot push",
            Status::Queued => "truth",
            Status::Purchased => "purchased",
            Status::Cancelled => "cancelled",
            Status::Changed => "changed",
            Status::UnhandledInstallationAction => "Unhandled installation action",
            Status::UnhandledMarketplaceAction => "Unhandled marketplace action",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single side effect the interpreter knows how to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do, for the given reason.
    NoOp(Status),

    /// Write a build request to the router queue.
    EnqueueBuild(RouterMessage),

    /// Write a pull-request request to the open-pr queue.
    EnqueueOpenPr(OpenPrMessage),

    /// Insert or overwrite a marketplace record.
    UpsertMarketplace(MarketplaceRecord),

    /// Delete a marketplace record read during classification.
    DeleteMarketplace { key: TableKey, etag: ETag },

    /// Delete one repository's installation record read during
    /// classification.
    DeleteInstallationRepo { key: TableKey, etag: ETag },

    /// Delete every installation record in a partition.
    DeleteInstallationPartition { partition_key: String },
}

impl Action {
    /// Returns a short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Action::NoOp(_) => "no_op",
            Action::EnqueueBuild(_) => "enqueue_build",
            Action::EnqueueOpenPr(_) => "enqueue_open_pr",
            Action::UpsertMarketplace(_) => "upsert_marketplace",
            Action::DeleteMarketplace { .. } => "delete_marketplace",
            Action::DeleteInstallationRepo { .. } => "delete_installation_repo",
            Action::DeleteInstallationPartition { .. } => "delete_installation_partition",
        }
    }
}

/// What one delivery should do and report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// The status the delivery reports, whatever the actions do.
    pub status: Status,

    /// The side effects to perform, in order. May be empty (e.g., a
    /// cancellation for an account with no record).
    pub actions: Vec<Action>,
}

impl Decision {
    /// A decision that performs no writes.
    pub fn no_op(reason: Status) -> Self {
        Decision {
            status: reason,
            actions: vec![Action::NoOp(reason)],
        }
    }

    pub fn new(status: Status, actions: Vec<Action>) -> Self {
        Decision { status, actions }
    }
}
