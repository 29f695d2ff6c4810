//! Classifies webhook events into decisions.
//!
//! Handlers map a parsed event to a [`Decision`]: the status the delivery
//! reports and the queue and table writes that achieve it. They never write.
//! The push and installation handlers are pure; the repository-removal and
//! cancellation handlers read the store, because a delete must present the
//! ETag of the record it removes.
//!
//! # Event Types
//!
//! | Event | Handler |
//! |-------|---------|
//! | `push` | `handle_push` - build request or pull-request request |
//! | `installation` | `handle_installation` - build requests, uninstall cleanup |
//! | `installation_repositories` | `handle_installation_repositories` - added, removed |
//! | `marketplace_purchase` | `handle_marketplace` - purchased, changed, cancelled |

mod installation;
mod marketplace;
mod push;

use std::collections::HashSet;

use crate::effects::{Action, Collaborators, Decision, Status};
use crate::queue::RouterMessage;
use crate::store::StoreError;
use crate::types::InstallationId;
use crate::webhooks::{InstalledRepo, WebhookEvent};

pub use installation::{handle_installation, handle_installation_repositories};
pub use marketplace::handle_marketplace;
pub use push::{IMAGE_EXTENSIONS, handle_push, is_image_path};

/// Login of the bot account that pushes optimized images.
pub const DEFAULT_BOT_LOGIN: &str = "imgbot[bot]";

/// Branch the bot pushes optimized images to.
pub const DEFAULT_BOT_BRANCH: &str = "imgbot";

/// Who the bot is, as seen in push events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    /// The sender login of the bot's own pushes.
    pub login: String,

    /// The branch the bot pushes to.
    pub branch: String,
}

impl BotIdentity {
    pub fn new(login: impl Into<String>, branch: impl Into<String>) -> Self {
        BotIdentity {
            login: login.into(),
            branch: branch.into(),
        }
    }

    /// Returns true if `login` is the bot. GitHub logins are
    /// case-insensitive.
    pub fn is_bot(&self, login: &str) -> bool {
        self.login.eq_ignore_ascii_case(login)
    }
}

impl Default for BotIdentity {
    fn default() -> Self {
        BotIdentity::new(DEFAULT_BOT_LOGIN, DEFAULT_BOT_BRANCH)
    }
}

/// Classifies a webhook event.
///
/// Only table reads may happen here; queue writes and table writes are left
/// to the interpreter.
///
/// # Errors
///
/// Returns a [`StoreError`] if a read needed to classify the event fails.
pub async fn handle_event(
    event: &WebhookEvent,
    bot: &BotIdentity,
    collaborators: &Collaborators,
) -> Result<Decision, StoreError> {
    match event {
        WebhookEvent::Push(e) => Ok(handle_push(e, bot)),
        WebhookEvent::Installation(e) => Ok(handle_installation(e)),
        WebhookEvent::InstallationRepositories(e) => {
            handle_installation_repositories(e, collaborators.installations.as_ref()).await
        }
        WebhookEvent::MarketplacePurchase(e) => {
            handle_marketplace(e, collaborators.marketplace.as_ref()).await
        }
    }
}

/// Builds one build request per distinct repository.
///
/// GitHub occasionally lists a repository twice; it gets one request. An
/// empty list still reports the queued status.
fn enqueue_builds(
    installation_id: InstallationId,
    owner: &str,
    repositories: &[InstalledRepo],
) -> Decision {
    let actions = distinct(repositories)
        .map(|repo| {
            Action::EnqueueBuild(RouterMessage {
                installation_id,
                owner: owner.to_string(),
                repo_name: repo.repo_name.clone(),
                clone_url: repo.clone_url.clone(),
            })
        })
        .collect();
    Decision::new(Status::Queued, actions)
}

/// Yields repositories in order, skipping repeated names.
fn distinct(repositories: &[InstalledRepo]) -> impl Iterator<Item = &InstalledRepo> {
    let mut seen = HashSet::new();
    repositories
        .iter()
        .filter(move |repo| seen.insert(repo.repo_name.as_str()))
}
