//! Handler for `marketplace_purchase` webhook events.

use tracing::debug;

use crate::effects::{Action, Decision, Status};
use crate::store::{MarketplaceRecord, StoreError, Table};
use crate::webhooks::{MarketplaceAction, MarketplacePurchaseEvent};

/// Handles a marketplace purchase event.
///
/// | Action | Decision |
/// |--------|----------|
/// | `purchased` | Upsert the account's record |
/// | `changed` | Upsert the account's record |
/// | `cancelled` | Delete the account's record, if any |
/// | other | Nothing |
///
/// The upserted record is built from the event alone, so a replayed
/// purchase leaves the table unchanged apart from its ETag.
///
/// # Errors
///
/// Returns a [`StoreError`] if reading the record to cancel fails.
pub async fn handle_marketplace(
    event: &MarketplacePurchaseEvent,
    marketplace: &dyn Table<MarketplaceRecord>,
) -> Result<Decision, StoreError> {
    match &event.action {
        MarketplaceAction::Purchased => Ok(Decision::new(
            Status::Purchased,
            vec![Action::UpsertMarketplace(MarketplaceRecord::from_event(
                event,
            ))],
        )),
        MarketplaceAction::Changed => Ok(Decision::new(
            Status::Changed,
            vec![Action::UpsertMarketplace(MarketplaceRecord::from_event(
                event,
            ))],
        )),
        MarketplaceAction::Cancelled => {
            let key = MarketplaceRecord::key_for(event.account_id, &event.account_login);
            let actions = match marketplace.retrieve(&key).await? {
                Some(record) => vec![Action::DeleteMarketplace {
                    key,
                    etag: record.etag,
                }],
                None => {
                    debug!(%key, "no marketplace record to cancel");
                    Vec::new()
                }
            };
            Ok(Decision::new(Status::Cancelled, actions))
        }
        MarketplaceAction::Other(action) => {
            debug!(%action, "ignoring marketplace action");
            Ok(Decision::no_op(Status::UnhandledMarketplaceAction))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryTable, TableOpKind};
    use crate::types::AccountId;

    fn event(action: MarketplaceAction) -> MarketplacePurchaseEvent {
        MarketplacePurchaseEvent {
            action,
            account_id: AccountId(18404719),
            account_login: "imgbot-test-org".to_string(),
            account_type: "Organization".to_string(),
            organization_billing_email: Some("billing@example.com".to_string()),
            plan_id: 781,
            plan_name: "Professional".to_string(),
            billing_cycle: Some("monthly".to_string()),
            unit_count: Some(1),
            on_free_trial: false,
            free_trial_ends_on: None,
            next_billing_date: None,
            sender_id: 5555555,
            sender_login: "dabutvin".to_string(),
        }
    }

    #[tokio::test]
    async fn purchased_upserts_without_reading() {
        let table: MemoryTable<MarketplaceRecord> = MemoryTable::new("marketplace");

        let decision = handle_marketplace(&event(MarketplaceAction::Purchased), &table).await.unwrap();

        assert_eq!(decision.status, Status::Purchased);
        match decision.actions.as_slice() {
            [Action::UpsertMarketplace(record)] => {
                assert_eq!(record.partition_key, "18404719");
                assert_eq!(record.row_key, "imgbot-test-org");
                assert_eq!(record.plan_id, 781);
            }
            other => panic!("expected one UpsertMarketplace, got {other:?}"),
        }
        assert!(table.untouched().await);
    }

    #[tokio::test]
    async fn changed_upserts_with_its_own_status() {
        let table: MemoryTable<MarketplaceRecord> = MemoryTable::new("marketplace");

        let decision = handle_marketplace(&event(MarketplaceAction::Changed), &table).await.unwrap();

        assert_eq!(decision.status, Status::Changed);
        assert!(matches!(
            decision.actions.as_slice(),
            [Action::UpsertMarketplace(_)]
        ));
    }

    #[tokio::test]
    async fn cancelled_deletes_with_the_etag_it_read() {
        let table: MemoryTable<MarketplaceRecord> = MemoryTable::new("marketplace");
        let etag = table
            .seed(MarketplaceRecord::from_event(&event(MarketplaceAction::Purchased)))
            .await;

        let decision = handle_marketplace(&event(MarketplaceAction::Cancelled), &table).await.unwrap();

        assert_eq!(
            decision,
            Decision::new(
                Status::Cancelled,
                vec![Action::DeleteMarketplace {
                    key: MarketplaceRecord::key_for(AccountId(18404719), "imgbot-test-org"),
                    etag,
                }]
            )
        );
        assert_eq!(table.count(TableOpKind::Retrieve).await, 1);
    }

    #[tokio::test]
    async fn cancelled_without_record_still_reports_cancelled() {
        let table: MemoryTable<MarketplaceRecord> = MemoryTable::new("marketplace");

        let decision = handle_marketplace(&event(MarketplaceAction::Cancelled), &table).await.unwrap();

        assert_eq!(decision, Decision::new(Status::Cancelled, Vec::new()));
    }

    #[tokio::test]
    async fn other_marketplace_actions_are_ignored() {
        let table: MemoryTable<MarketplaceRecord> = MemoryTable::new("marketplace");

        let decision = handle_marketplace(&event(MarketplaceAction::Other("pending_change".to_string())), &table)
            .await
            .unwrap();

        assert_eq!(decision, Decision::no_op(Status::UnhandledMarketplaceAction));
        assert!(table.untouched().await);
    }
}
