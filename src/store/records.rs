//! Persisted record shapes.
//!
//! Property names are PascalCase on disk so records read the same as the
//! entities the build workers write.

use serde::{Deserialize, Serialize};

use super::{ETag, TableEntity, TableKey};
use crate::types::{AccountId, InstallationId};
use crate::webhooks::MarketplacePurchaseEvent;

/// One repository covered by an installation.
///
/// Keyed by installation ID (partition) and repository name (row), so every
/// repository of an installation shares a partition and an uninstall can
/// drop the whole partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstallationRecord {
    pub partition_key: String,
    pub row_key: String,
    #[serde(rename = "ETag", default)]
    pub etag: ETag,

    pub installation_id: InstallationId,
    #[serde(default)]
    pub owner: String,
    pub repo_name: String,
}

impl InstallationRecord {
    pub fn new(
        installation_id: InstallationId,
        owner: impl Into<String>,
        repo_name: impl Into<String>,
    ) -> Self {
        let repo_name = repo_name.into();
        InstallationRecord {
            partition_key: Self::partition_for(installation_id),
            row_key: repo_name.clone(),
            etag: ETag::any(),
            installation_id,
            owner: owner.into(),
            repo_name,
        }
    }

    /// Returns the partition holding every repository of an installation.
    pub fn partition_for(installation_id: InstallationId) -> String {
        installation_id.to_string()
    }

    /// Returns the key of one repository's record.
    pub fn key_for(installation_id: InstallationId, repo_name: &str) -> TableKey {
        TableKey::new(Self::partition_for(installation_id), repo_name)
    }
}

impl TableEntity for InstallationRecord {
    fn key(&self) -> TableKey {
        TableKey::new(&self.partition_key, &self.row_key)
    }

    fn etag(&self) -> &ETag {
        &self.etag
    }

    fn set_etag(&mut self, etag: ETag) {
        self.etag = etag;
    }
}

/// An account's marketplace plan.
///
/// Keyed by account ID (partition) and account login (row). Built entirely
/// from the purchase event, so replaying the same event writes identical
/// content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarketplaceRecord {
    pub partition_key: String,
    pub row_key: String,
    #[serde(rename = "ETag", default)]
    pub etag: ETag,

    pub account_id: AccountId,
    pub account_login: String,
    pub account_type: String,
    pub organization_billing_email: Option<String>,
    pub plan_id: u64,
    pub plan_name: String,
    pub billing_cycle: Option<String>,
    pub unit_count: Option<u64>,
    pub on_free_trial: bool,
    pub free_trial_ends_on: Option<String>,
    pub next_billing_date: Option<String>,
    pub sender_id: u64,
    pub sender_login: String,
}

impl MarketplaceRecord {
    /// Returns the key of an account's marketplace record.
    pub fn key_for(account_id: AccountId, account_login: &str) -> TableKey {
        TableKey::new(account_id.to_string(), account_login)
    }

    /// Builds the record a purchase or plan change should leave behind.
    pub fn from_event(event: &MarketplacePurchaseEvent) -> Self {
        let key = Self::key_for(event.account_id, &event.account_login);
        MarketplaceRecord {
            partition_key: key.partition_key,
            row_key: key.row_key,
            etag: ETag::any(),
            account_id: event.account_id,
            account_login: event.account_login.clone(),
            account_type: event.account_type.clone(),
            organization_billing_email: event.organization_billing_email.clone(),
            plan_id: event.plan_id,
            plan_name: event.plan_name.clone(),
            billing_cycle: event.billing_cycle.clone(),
            unit_count: event.unit_count,
            on_free_trial: event.on_free_trial,
            free_trial_ends_on: event.free_trial_ends_on.clone(),
            next_billing_date: event.next_billing_date.clone(),
            sender_id: event.sender_id,
            sender_login: event.sender_login.clone(),
        }
    }
}

impl TableEntity for MarketplaceRecord {
    fn key(&self) -> TableKey {
        TableKey::new(&self.partition_key, &self.row_key)
    }

    fn etag(&self) -> &ETag {
        &self.etag
    }

    fn set_etag(&mut self, etag: ETag) {
        self.etag = etag;
    }
}
