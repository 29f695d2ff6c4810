//! GitHub webhook event types.
//!
//! Typed representations of the webhook events the dispatcher acts on. Each
//! variant carries only the fields the classifier needs, with required
//! fields non-optional so a payload missing them fails at parse time.
//!
//! # Event Types
//!
//! - `push` - commits pushed to a branch of an installed repository
//! - `installation` - the app was installed on or removed from an account
//! - `installation_repositories` - repositories were added to or removed from
//!   an existing installation
//! - `marketplace_purchase` - a marketplace plan was bought, changed or
//!   cancelled

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, InstallationId};

/// A parsed GitHub webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEvent {
    /// Commits were pushed to a branch.
    Push(PushEvent),

    /// The app installation itself was created, deleted, suspended, etc.
    Installation(InstallationEvent),

    /// Repositories were added to or removed from an installation.
    InstallationRepositories(InstallationRepositoriesEvent),

    /// A marketplace plan changed hands.
    MarketplacePurchase(MarketplacePurchaseEvent),
}

impl WebhookEvent {
    /// Returns the installation this event belongs to, if it has one.
    ///
    /// Marketplace events are account-scoped and carry no installation.
    pub fn installation_id(&self) -> Option<InstallationId> {
        match self {
            WebhookEvent::Push(e) => Some(e.installation_id),
            WebhookEvent::Installation(e) => Some(e.installation_id),
            WebhookEvent::InstallationRepositories(e) => Some(e.installation_id),
            WebhookEvent::MarketplacePurchase(_) => None,
        }
    }
}

/// A push to a branch of an installed repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// The full ref that was pushed (e.g., `refs/heads/main`).
    pub git_ref: String,

    /// The repository's default branch name (e.g., `main`).
    pub default_branch: String,

    /// The installation that delivered this push.
    pub installation_id: InstallationId,

    /// The repository owner's login.
    pub owner: String,

    /// The repository name.
    pub repo_name: String,

    /// The repository URL the build worker clones from.
    pub clone_url: String,

    /// Login of the account that pushed.
    pub sender_login: String,

    /// Every path added, modified or removed across all commits, in commit
    /// order. May contain duplicates.
    pub touched_files: Vec<String>,
}

impl PushEvent {
    /// Returns the branch name if the pushed ref is a branch.
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix("refs/heads/")
    }

    /// Returns true if the push targets the named branch.
    pub fn is_to_branch(&self, branch: &str) -> bool {
        self.branch() == Some(branch)
    }

    /// Returns true if the push targets the repository's default branch.
    pub fn is_to_default_branch(&self) -> bool {
        self.is_to_branch(&self.default_branch)
    }
}

/// A repository named in an installation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledRepo {
    /// GitHub's numeric repository ID.
    pub repo_id: u64,

    /// The repository name (without owner).
    pub repo_name: String,

    /// The repository URL the build worker clones from.
    pub clone_url: String,
}

/// Action on an `installation` event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallationAction {
    /// The app was installed on an account.
    Created,
    /// The app was uninstalled from an account.
    Deleted,
    /// An action this dispatcher does not act on (e.g., `suspend`), kept
    /// verbatim.
    Other(String),
}

/// Action on an `installation_repositories` event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoriesAction {
    /// Repositories were granted to the installation.
    Added,
    /// Repositories were revoked from the installation.
    Removed,
    /// An action this dispatcher does not act on, kept verbatim.
    Other(String),
}

/// Action on a `marketplace_purchase` event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketplaceAction {
    /// An account bought a plan.
    Purchased,
    /// An account cancelled its plan.
    Cancelled,
    /// An account switched to a different plan.
    Changed,
    /// An action this dispatcher does not act on (e.g., `pending_change`),
    /// kept verbatim.
    Other(String),
}

/// An `installation` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationEvent {
    pub action: InstallationAction,
    pub installation_id: InstallationId,

    /// Login of the account the app is installed on.
    pub owner_login: String,

    /// Repositories the installation covers. GitHub omits this list on
    /// `deleted`, so it may be empty.
    pub repositories: Vec<InstalledRepo>,
}

/// An `installation_repositories` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationRepositoriesEvent {
    pub action: RepositoriesAction,
    pub installation_id: InstallationId,

    /// Login of the account the app is installed on.
    pub owner_login: String,

    /// The repositories affected by `action`: `repositories_added` for
    /// `added`, `repositories_removed` for `removed`.
    pub repositories: Vec<InstalledRepo>,
}

/// A `marketplace_purchase` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplacePurchaseEvent {
    pub action: MarketplaceAction,

    /// The purchasing account.
    pub account_id: AccountId,
    pub account_login: String,
    pub account_type: String,
    pub organization_billing_email: Option<String>,

    /// The plan the account holds after this event.
    pub plan_id: u64,
    pub plan_name: String,
    pub billing_cycle: Option<String>,
    pub unit_count: Option<u64>,
    pub on_free_trial: bool,
    pub free_trial_ends_on: Option<String>,
    pub next_billing_date: Option<String>,

    /// The user who performed the purchase.
    pub sender_id: u64,
    pub sender_login: String,
}
