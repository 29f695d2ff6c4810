//! GitHub webhook payload parser.
//!
//! This module parses raw webhook JSON payloads into typed [`WebhookEvent`]
//! values.
//!
//! # Parsing Strategy
//!
//! 1. The event type is determined from the `X-GitHub-Event` header
//! 2. The payload is parsed according to the event type
//! 3. Unknown event types are rejected with [`ParseError::UnrecognizedEventType`]
//! 4. Payloads missing required fields are rejected with
//!    [`ParseError::MalformedPayload`]
//!
//! Parsing never touches a queue or table, so a rejected delivery cannot
//! leave partial writes behind.

use serde::Deserialize;
use thiserror::Error;

use crate::types::{AccountId, InstallationId};

use super::events::{
    InstallationAction, InstallationEvent, InstallationRepositoriesEvent, InstalledRepo,
    MarketplaceAction, MarketplacePurchaseEvent, PushEvent, RepositoriesAction, WebhookEvent,
};

/// Base URL used to build clone URLs for repositories that only carry a
/// `full_name` in installation payloads.
const GITHUB_BASE_URL: &str = "https://github.com";

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The `X-GitHub-Event` value is not one this dispatcher handles.
    #[error("unrecognized event type: {0}")]
    UnrecognizedEventType(String),

    /// The payload does not match the schema for its event type.
    #[error("malformed {event_type} payload: {source}")]
    MalformedPayload {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Parses a webhook payload into a typed event.
///
/// # Arguments
///
/// * `event_type` - The value of the `X-GitHub-Event` header
/// * `payload` - The raw JSON payload bytes
///
/// # Examples
///
/// ```
/// use imgbot_webhook::webhooks::{WebhookEvent, parse_webhook};
///
/// let payload = br#"{
///     "action": "cancelled",
///     "sender": { "id": 1, "login": "octocat" },
///     "marketplace_purchase": {
///         "account": { "id": 2, "login": "octo-org", "type": "Organization" },
///         "plan": { "id": 3, "name": "Free" }
///     }
/// }"#;
///
/// let event = parse_webhook("marketplace_purchase", payload).unwrap();
/// assert!(matches!(event, WebhookEvent::MarketplacePurchase(_)));
/// ```
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<WebhookEvent, ParseError> {
    match event_type {
        "push" => parse_push(payload).map(WebhookEvent::Push),
        "installation" => parse_installation(payload).map(WebhookEvent::Installation),
        "installation_repositories" => {
            parse_installation_repositories(payload).map(WebhookEvent::InstallationRepositories)
        }
        "marketplace_purchase" => {
            parse_marketplace_purchase(payload).map(WebhookEvent::MarketplacePurchase)
        }
        other => Err(ParseError::UnrecognizedEventType(other.to_string())),
    }
}

/// Deserializes `payload`, tagging failures with the event type.
fn from_payload<'a, T: Deserialize<'a>>(
    event_type: &'static str,
    payload: &'a [u8],
) -> Result<T, ParseError> {
    serde_json::from_slice(payload)
        .map_err(|source| ParseError::MalformedPayload { event_type, source })
}

// ============================================================================
// Raw payload structures for deserialization
//
// These mirror GitHub's webhook JSON. Fields GitHub omits in some deliveries
// are defaulted; everything the classifier needs is required.
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawUser {
    id: u64,
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawInstallationRef {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawInstallation {
    id: u64,
    account: RawAccount,
}

#[derive(Debug, Deserialize)]
struct RawRepo {
    id: u64,
    name: String,
    full_name: String,
}

impl From<RawRepo> for InstalledRepo {
    fn from(raw: RawRepo) -> Self {
        InstalledRepo {
            repo_id: raw.id,
            clone_url: format!("{}/{}", GITHUB_BASE_URL, raw.full_name),
            repo_name: raw.name,
        }
    }
}

// ============================================================================
// push event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPushPayload {
    #[serde(rename = "ref")]
    git_ref: String,
    #[serde(default)]
    commits: Vec<RawCommit>,
    repository: RawPushRepository,
    sender: RawSender,
    installation: RawInstallationRef,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    #[serde(default)]
    added: Vec<String>,
    #[serde(default)]
    modified: Vec<String>,
    #[serde(default)]
    removed: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawPushRepository {
    name: String,
    url: String,
    default_branch: String,
    owner: RawPushOwner,
}

/// Push payloads describe the owner git-style: `name` is always present,
/// `login` only on newer deliveries.
#[derive(Debug, Deserialize)]
struct RawPushOwner {
    login: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSender {
    login: String,
}

fn parse_push(payload: &[u8]) -> Result<PushEvent, ParseError> {
    let raw: RawPushPayload = from_payload("push", payload)?;

    let owner = raw
        .repository
        .owner
        .login
        .or(raw.repository.owner.name)
        .ok_or_else(|| ParseError::MalformedPayload {
            event_type: "push",
            source: serde::de::Error::missing_field("repository.owner.login"),
        })?;

    let touched_files = raw
        .commits
        .into_iter()
        .flat_map(|c| c.added.into_iter().chain(c.modified).chain(c.removed))
        .collect();

    Ok(PushEvent {
        git_ref: raw.git_ref,
        default_branch: raw.repository.default_branch,
        installation_id: InstallationId(raw.installation.id),
        owner,
        repo_name: raw.repository.name,
        clone_url: raw.repository.url,
        sender_login: raw.sender.login,
        touched_files,
    })
}

// ============================================================================
// installation event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawInstallationPayload {
    action: String,
    installation: RawInstallation,
    #[serde(default)]
    repositories: Vec<RawRepo>,
}

fn parse_installation(payload: &[u8]) -> Result<InstallationEvent, ParseError> {
    let raw: RawInstallationPayload = from_payload("installation", payload)?;

    let action = match raw.action.as_str() {
        "created" => InstallationAction::Created,
        "deleted" => InstallationAction::Deleted,
        other => InstallationAction::Other(other.to_string()),
    };

    Ok(InstallationEvent {
        action,
        installation_id: InstallationId(raw.installation.id),
        owner_login: raw.installation.account.login,
        repositories: raw.repositories.into_iter().map(Into::into).collect(),
    })
}

// ============================================================================
// installation_repositories event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawInstallationRepositoriesPayload {
    action: String,
    installation: RawInstallation,
    #[serde(default)]
    repositories_added: Vec<RawRepo>,
    #[serde(default)]
    repositories_removed: Vec<RawRepo>,
}

fn parse_installation_repositories(
    payload: &[u8],
) -> Result<InstallationRepositoriesEvent, ParseError> {
    let raw: RawInstallationRepositoriesPayload =
        from_payload("installation_repositories", payload)?;

    let (action, repositories) = match raw.action.as_str() {
        "added" => (RepositoriesAction::Added, raw.repositories_added),
        "removed" => (RepositoriesAction::Removed, raw.repositories_removed),
        other => (RepositoriesAction::Other(other.to_string()), Vec::new()),
    };

    Ok(InstallationRepositoriesEvent {
        action,
        installation_id: InstallationId(raw.installation.id),
        owner_login: raw.installation.account.login,
        repositories: repositories.into_iter().map(Into::into).collect(),
    })
}

// ============================================================================
// marketplace_purchase event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawMarketplacePayload {
    action: String,
    sender: RawUser,
    marketplace_purchase: RawMarketplacePurchase,
}

#[derive(Debug, Deserialize)]
struct RawMarketplacePurchase {
    account: RawMarketplaceAccount,
    plan: RawPlan,
    billing_cycle: Option<String>,
    unit_count: Option<u64>,
    #[serde(default)]
    on_free_trial: bool,
    free_trial_ends_on: Option<String>,
    next_billing_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMarketplaceAccount {
    id: u64,
    login: String,
    #[serde(rename = "type")]
    account_type: String,
    organization_billing_email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    id: u64,
    name: String,
}

fn parse_marketplace_purchase(payload: &[u8]) -> Result<MarketplacePurchaseEvent, ParseError> {
    let raw: RawMarketplacePayload = from_payload("marketplace_purchase", payload)?;
    let purchase = raw.marketplace_purchase;

    let action = match raw.action.as_str() {
        "purchased" => MarketplaceAction::Purchased,
        "cancelled" => MarketplaceAction::Cancelled,
        "changed" => MarketplaceAction::Changed,
        other => MarketplaceAction::Other(other.to_string()),
    };

    Ok(MarketplacePurchaseEvent {
        action,
        account_id: AccountId(purchase.account.id),
        account_login: purchase.account.login,
        account_type: purchase.account.account_type,
        organization_billing_email: purchase.account.organization_billing_email,
        plan_id: purchase.plan.id,
        plan_name: purchase.plan.name,
        billing_cycle: purchase.billing_cycle,
        unit_count: purchase.unit_count,
        on_free_trial: purchase.on_free_trial,
        free_trial_ends_on: purchase.free_trial_ends_on,
        next_billing_date: purchase.next_billing_date,
        sender_id: raw.sender.id,
        sender_login: raw.sender.login,
    })
}
