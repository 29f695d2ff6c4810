//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Typed event representations ([`events`])
//! - Payload parsing keyed on the `X-GitHub-Event` header ([`parser`])
//! - Classification of events into decisions ([`handlers`])

pub mod events;
pub mod handlers;
pub mod parser;

pub use events::{
    InstallationAction, InstallationEvent, InstallationRepositoriesEvent, InstalledRepo,
    MarketplaceAction, MarketplacePurchaseEvent, PushEvent, RepositoriesAction, WebhookEvent,
};
pub use handlers::{BotIdentity, handle_event};
pub use parser::{ParseError, parse_webhook};
