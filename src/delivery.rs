//! The webhook entry point.
//!
//! [`Hook::handle`] takes one delivery (the `X-GitHub-Event` value and the
//! raw body), classifies it and performs the resulting writes. Deliveries
//! are independent; concurrent calls share only the queues and tables.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::effects::{self, Collaborators, DispatchError};
use crate::queue::QueueError;
use crate::store::StoreError;
use crate::types::DeliveryId;
use crate::webhooks::{BotIdentity, ParseError, handle_event, parse_webhook};

/// The body returned for every delivery that was understood.
///
/// Serializes as `{"Result": "<status>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HookResponse {
    pub result: String,
}

impl HookResponse {
    pub fn new(result: impl Into<String>) -> Self {
        HookResponse {
            result: result.into(),
        }
    }
}

/// Errors from handling a delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The event type is unknown or the payload lacks required fields.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A table read or write failed, including ETag conflicts.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A queue write failed.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl From<DispatchError> for DeliveryError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Store(e) => DeliveryError::Store(e),
            DispatchError::Queue(e) => DeliveryError::Queue(e),
        }
    }
}

impl DeliveryError {
    /// Returns true if the sender should retry the delivery later.
    ///
    /// A conflict is retryable too: the retry re-reads the record and
    /// presents its fresh ETag.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DeliveryError::Parse(_))
    }
}

/// Handles webhook deliveries against a fixed set of collaborators.
#[derive(Clone)]
pub struct Hook {
    bot: BotIdentity,
    collaborators: Collaborators,
}

impl Hook {
    pub fn new(bot: BotIdentity, collaborators: Collaborators) -> Self {
        Hook { bot, collaborators }
    }

    pub fn bot(&self) -> &BotIdentity {
        &self.bot
    }

    /// Handles one delivery.
    ///
    /// `delivery_id` is used only for logging.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Parse`] for an unknown event type or a
    /// payload missing required fields. Store and queue failures propagate
    /// after any writes already performed; the delivery is safe to retry.
    pub async fn handle(
        &self,
        delivery_id: Option<&DeliveryId>,
        event_type: &str,
        payload: &[u8],
    ) -> Result<HookResponse, DeliveryError> {
        let delivery = delivery_id.map(DeliveryId::as_str).unwrap_or("-");

        let event = parse_webhook(event_type, payload).inspect_err(|e| {
            warn!(delivery_id = delivery, event_type, error = %e, "rejected webhook");
        })?;

        let decision = handle_event(&event, &self.bot, &self.collaborators).await?;
        let dispatched = effects::execute(decision, &self.collaborators)
            .await
            .inspect_err(|e| {
                warn!(delivery_id = delivery, event_type, error = %e, "failed to dispatch webhook");
            })?;

        info!(
            delivery_id = delivery,
            event_type,
            installation_id = ?event.installation_id().map(|id| id.0),
            status = %dispatched.status,
            writes = dispatched.writes,
            "handled webhook"
        );
        Ok(HookResponse::new(dispatched.status.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{OpenPrMessage, RouterMessage};
    use crate::store::{
        ETag, InstallationRecord, MarketplaceRecord, Table, TableEntity, TableOp, TableOpKind,
    };
    use crate::test_utils::{MemoryBackends, fixture};
    use crate::types::{AccountId, InstallationId};

    fn hook(backends: &MemoryBackends) -> Hook {
        Hook::new(BotIdentity::default(), backends.collaborators())
    }

    async fn deliver(
        backends: &MemoryBackends,
        event_type: &str,
        name: &str,
    ) -> Result<HookResponse, DeliveryError> {
        hook(backends).handle(None, event_type, &fixture(name)).await
    }

    // ========================================================================
    // push
    // ========================================================================

    #[tokio::test]
    async fn push_to_other_branch_is_ignored() {
        let backends = MemoryBackends::new();

        let response = deliver(&backends, "push", "push-otherbranch.json")
            .await
            .unwrap();

        assert_eq!(response.result, "Commit to non default branch");
        backends.assert_untouched().await;
    }

    #[tokio::test]
    async fn push_without_images_is_ignored() {
        let backends = MemoryBackends::new();

        let response = deliver(&backends, "push", "push-defaultbranch-noimages.json")
            .await
            .unwrap();

        assert_eq!(response.result, "No image files touched");
        backends.assert_untouched().await;
    }

    #[tokio::test]
    async fn bot_push_to_bot_branch_opens_pull_request() {
        let backends = MemoryBackends::new();

        let response = deliver(&backends, "push", "push-imgbotbranch-byimgbot.json")
            .await
            .unwrap();

        assert_eq!(response.result, "imgbot push");
        let messages: Vec<OpenPrMessage> = backends.open_pr.decode().await.unwrap();
        assert_eq!(
            messages,
            vec![OpenPrMessage {
                installation_id: InstallationId(23199),
                repo_name: "test".to_string(),
                clone_url: "https://github.com/dabutvin/test".to_string(),
            }]
        );
        assert!(backends.router.is_empty().await);
    }

    #[tokio::test]
    async fn others_pushing_to_bot_branch_is_ignored() {
        let backends = MemoryBackends::new();

        let response = deliver(&backends, "push", "push-imgbotbranch-byothers.json")
            .await
            .unwrap();

        assert_eq!(response.result, "Commit to non default branch");
        backends.assert_untouched().await;
    }

    #[tokio::test]
    async fn push_with_images_requests_build() {
        let backends = MemoryBackends::new();

        let response = deliver(&backends, "push", "push-defaultbranch-images.json")
            .await
            .unwrap();

        assert_eq!(response.result, "truth");
        let messages: Vec<RouterMessage> = backends.router.decode().await.unwrap();
        assert_eq!(
            messages,
            vec![RouterMessage {
                installation_id: InstallationId(23199),
                owner: "dabutvin".to_string(),
                repo_name: "test".to_string(),
                clone_url: "https://github.com/dabutvin/test".to_string(),
            }]
        );
        assert!(backends.open_pr.is_empty().await);
    }

    #[tokio::test]
    async fn push_with_uppercase_image_extensions_requests_build() {
        let backends = MemoryBackends::new();

        let response = deliver(
            &backends,
            "push",
            "push-defaultbranch-images-uppercase.json",
        )
        .await
        .unwrap();

        assert_eq!(response.result, "truth");
        assert_eq!(backends.router.len().await, 1);
    }

    // ========================================================================
    // installation_repositories
    // ========================================================================

    #[tokio::test]
    async fn repositories_added_requests_builds() {
        let backends = MemoryBackends::new();

        let response = deliver(
            &backends,
            "installation_repositories",
            "installation-repositories-added.json",
        )
        .await
        .unwrap();

        assert_eq!(response.result, "truth");
        let messages: Vec<RouterMessage> = backends.router.decode().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].installation_id, InstallationId(554));
        assert_eq!(messages[0].repo_name, "testing");
        assert!(backends.installations.untouched().await);
    }

    #[tokio::test]
    async fn repositories_removed_deletes_the_record() {
        let backends = MemoryBackends::new();
        backends
            .installations
            .seed(InstallationRecord::new(InstallationId(554), "dabutvin", "testing"))
            .await;

        let response = deliver(
            &backends,
            "installation_repositories",
            "installation-repositories-removed.json",
        )
        .await
        .unwrap();

        assert_eq!(response.result, "truth");
        assert_eq!(backends.installations.count(TableOpKind::Retrieve).await, 1);
        assert_eq!(backends.installations.count(TableOpKind::Delete).await, 1);
        assert!(backends.installations.is_empty().await);
        assert!(backends.router.is_empty().await);
    }

    #[tokio::test]
    async fn repositories_removed_without_record_deletes_nothing() {
        let backends = MemoryBackends::new();

        let response = deliver(
            &backends,
            "installation_repositories",
            "installation-repositories-removed.json",
        )
        .await
        .unwrap();

        assert_eq!(response.result, "truth");
        assert_eq!(backends.installations.count(TableOpKind::Retrieve).await, 1);
        assert_eq!(backends.installations.count(TableOpKind::Delete).await, 0);
    }

    // ========================================================================
    // installation
    // ========================================================================

    #[tokio::test]
    async fn installation_created_requests_builds() {
        let backends = MemoryBackends::new();

        let response = deliver(&backends, "installation", "installation-created.json")
            .await
            .unwrap();

        assert_eq!(response.result, "truth");
        let messages: Vec<RouterMessage> = backends.router.decode().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].installation_id, InstallationId(541));
        assert_eq!(messages[0].repo_name, "myrepo");
        assert!(backends.installations.untouched().await);
    }

    #[tokio::test]
    async fn installation_deleted_drops_every_record() {
        let backends = MemoryBackends::new();
        for repo in ["repo1", "repo2"] {
            backends
                .installations
                .seed(InstallationRecord::new(InstallationId(654321), "dabutvin", repo))
                .await;
        }

        let response = deliver(&backends, "installation", "installation-deleted.json")
            .await
            .unwrap();

        assert_eq!(response.result, "truth");
        assert_eq!(backends.installations.count(TableOpKind::Delete).await, 2);
        assert!(backends.installations.is_empty().await);
        assert!(backends.router.is_empty().await);
    }

    #[tokio::test]
    async fn installation_deleted_pages_through_large_partitions() {
        let backends = MemoryBackends::with_page_size(1);
        for repo in ["repo1", "repo2"] {
            backends
                .installations
                .seed(InstallationRecord::new(InstallationId(654321), "dabutvin", repo))
                .await;
        }

        deliver(&backends, "installation", "installation-deleted.json")
            .await
            .unwrap();

        assert_eq!(backends.installations.count(TableOpKind::Delete).await, 2);
        assert!(backends.installations.count(TableOpKind::Query).await >= 2);
        assert!(backends.installations.is_empty().await);
    }

    // ========================================================================
    // marketplace_purchase
    // ========================================================================

    #[tokio::test]
    async fn marketplace_purchased_upserts_record() {
        let backends = MemoryBackends::new();

        let response = deliver(
            &backends,
            "marketplace_purchase",
            "marketplace-purchased.json",
        )
        .await
        .unwrap();

        assert_eq!(response.result, "purchased");
        assert_eq!(
            backends.marketplace.count(TableOpKind::InsertOrMerge).await,
            1
        );
        assert_eq!(backends.marketplace.len().await, 1);
    }

    #[tokio::test]
    async fn marketplace_purchase_replay_is_idempotent() {
        let backends = MemoryBackends::new();

        for _ in 0..2 {
            let response = deliver(
                &backends,
                "marketplace_purchase",
                "marketplace-purchased.json",
            )
            .await
            .unwrap();
            assert_eq!(response.result, "purchased");
        }

        assert_eq!(
            backends.marketplace.count(TableOpKind::InsertOrMerge).await,
            2
        );
        let written: Vec<MarketplaceRecord> = backends
            .marketplace
            .ops()
            .await
            .into_iter()
            .filter_map(|op| match op {
                TableOp::InsertOrMerge(record) => Some(record),
                _ => None,
            })
            .collect();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0], written[1]);

        assert_eq!(backends.marketplace.len().await, 1);
        let key = MarketplaceRecord::key_for(AccountId(18404719), "imgbot-test-org");
        let mut stored = backends
            .marketplace
            .retrieve(&key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.key(), key);
        stored.set_etag(ETag::any());
        assert_eq!(stored, written[1]);
    }

    #[tokio::test]
    async fn marketplace_cancelled_deletes_record() {
        let backends = MemoryBackends::new();
        deliver(
            &backends,
            "marketplace_purchase",
            "marketplace-purchased.json",
        )
        .await
        .unwrap();

        let response = deliver(
            &backends,
            "marketplace_purchase",
            "marketplace-cancelled.json",
        )
        .await
        .unwrap();

        assert_eq!(response.result, "cancelled");
        assert_eq!(backends.marketplace.count(TableOpKind::Delete).await, 1);
        assert!(backends.marketplace.is_empty().await);
    }

    #[tokio::test]
    async fn marketplace_cancelled_without_record_succeeds() {
        let backends = MemoryBackends::new();

        let response = deliver(
            &backends,
            "marketplace_purchase",
            "marketplace-cancelled.json",
        )
        .await
        .unwrap();

        assert_eq!(response.result, "cancelled");
        assert_eq!(backends.marketplace.count(TableOpKind::Retrieve).await, 1);
        assert_eq!(backends.marketplace.count(TableOpKind::Delete).await, 0);
    }

    #[tokio::test]
    async fn marketplace_changed_overwrites_record() {
        let backends = MemoryBackends::new();

        let response = deliver(&backends, "marketplace_purchase", "marketplace-changed.json")
            .await
            .unwrap();

        assert_eq!(response.result, "changed");
        assert_eq!(backends.marketplace.len().await, 1);
    }

    // ========================================================================
    // Failures
    // ========================================================================

    #[tokio::test]
    async fn unrecognized_event_type_is_rejected_without_writes() {
        let backends = MemoryBackends::new();

        let err = hook(&backends)
            .handle(None, "ping", br#"{"zen": "Keep it logically awesome."}"#)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeliveryError::Parse(ParseError::UnrecognizedEventType(_))
        ));
        assert!(!err.is_retryable());
        backends.assert_untouched().await;
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected_without_writes() {
        let backends = MemoryBackends::new();

        let err = hook(&backends)
            .handle(None, "push", br#"{"ref": "refs/heads/master"}"#)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeliveryError::Parse(ParseError::MalformedPayload { .. })
        ));
        backends.assert_untouched().await;
    }

    #[tokio::test]
    async fn queue_outage_is_retryable() {
        let backends = MemoryBackends::new();
        backends.router.set_unavailable(true);

        let err = deliver(&backends, "push", "push-defaultbranch-images.json")
            .await
            .unwrap_err();

        assert!(matches!(err, DeliveryError::Queue(QueueError::Unavailable { .. })));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn table_outage_during_classification_is_retryable() {
        let backends = MemoryBackends::new();
        backends.marketplace.set_unavailable(true);

        let err = deliver(
            &backends,
            "marketplace_purchase",
            "marketplace-cancelled.json",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DeliveryError::Store(ref e) if e.is_unavailable()));
        assert!(err.is_retryable());
    }
}
