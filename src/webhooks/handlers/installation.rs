//! Handlers for `installation` and `installation_repositories` events.

use tracing::debug;

use crate::effects::{Action, Decision, Status};
use crate::store::{InstallationRecord, StoreError, Table};
use crate::webhooks::{
    InstallationAction, InstallationEvent, InstallationRepositoriesEvent, RepositoriesAction,
};

use super::{distinct, enqueue_builds};

/// Handles an `installation` event.
///
/// | Action | Decision |
/// |--------|----------|
/// | `created` | One build request per repository |
/// | `deleted` | Drop the installation's whole partition |
/// | other | Nothing |
///
/// Records for new installations are written by the build workers, so
/// `created` writes no table entries here.
pub fn handle_installation(event: &InstallationEvent) -> Decision {
    match &event.action {
        InstallationAction::Created => enqueue_builds(
            event.installation_id,
            &event.owner_login,
            &event.repositories,
        ),
        InstallationAction::Deleted => Decision::new(
            Status::Queued,
            vec![Action::DeleteInstallationPartition {
                partition_key: InstallationRecord::partition_for(event.installation_id),
            }],
        ),
        InstallationAction::Other(action) => {
            debug!(%action, "ignoring installation action");
            Decision::no_op(Status::UnhandledInstallationAction)
        }
    }
}

/// Handles an `installation_repositories` event.
///
/// `added` requests a build for each added repository. `removed` reads each
/// removed repository's record and deletes it with the ETag just read;
/// repositories with no record are skipped.
///
/// # Errors
///
/// Returns a [`StoreError`] if a read fails.
pub async fn handle_installation_repositories(
    event: &InstallationRepositoriesEvent,
    installations: &dyn Table<InstallationRecord>,
) -> Result<Decision, StoreError> {
    match &event.action {
        RepositoriesAction::Added => Ok(enqueue_builds(
            event.installation_id,
            &event.owner_login,
            &event.repositories,
        )),
        RepositoriesAction::Removed => {
            let mut actions = Vec::new();
            for repo in distinct(&event.repositories) {
                let key = InstallationRecord::key_for(event.installation_id, &repo.repo_name);
                match installations.retrieve(&key).await? {
                    Some(record) => actions.push(Action::DeleteInstallationRepo {
                        key,
                        etag: record.etag,
                    }),
                    None => debug!(%key, "no record for removed repository"),
                }
            }
            Ok(Decision::new(Status::Queued, actions))
        }
        RepositoriesAction::Other(action) => {
            debug!(%action, "ignoring installation_repositories action");
            Ok(Decision::no_op(Status::UnhandledInstallationAction))
        }
    }
}
