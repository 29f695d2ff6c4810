//! Handler for `push` webhook events.

use std::path::Path;

use crate::effects::{Action, Decision, Status};
use crate::queue::{OpenPrMessage, RouterMessage};
use crate::webhooks::PushEvent;

use super::BotIdentity;

/// File extensions that make a push worth optimizing. Compared
/// case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp"];

/// Returns true if `path` names an image file.
pub fn is_image_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|image| image.eq_ignore_ascii_case(ext))
        })
}

/// Handles a push event.
///
/// Rules are checked in order; the first match wins:
///
/// | Push | Decision |
/// |------|----------|
/// | By the bot to the bot's branch | Enqueue a pull request |
/// | To any non-default branch | Nothing |
/// | To the default branch, no image touched | Nothing |
/// | To the default branch, an image touched | Enqueue a build |
pub fn handle_push(event: &PushEvent, bot: &BotIdentity) -> Decision {
    if event.is_to_branch(&bot.branch) && bot.is_bot(&event.sender_login) {
        return Decision::new(
            Status::BotPush,
            vec![Action::EnqueueOpenPr(OpenPrMessage {
                installation_id: event.installation_id,
                repo_name: event.repo_name.clone(),
                clone_url: event.clone_url.clone(),
            })],
        );
    }

    if !event.is_to_default_branch() {
        return Decision::no_op(Status::NonDefaultBranch);
    }

    if !event.touched_files.iter().any(|path| is_image_path(path)) {
        return Decision::no_op(Status::NoImagesTouched);
    }

    Decision::new(
        Status::Queued,
        vec![Action::EnqueueBuild(RouterMessage {
            installation_id: event.installation_id,
            owner: event.owner.clone(),
            repo_name: event.repo_name.clone(),
            clone_url: event.clone_url.clone(),
        })],
    )
}
