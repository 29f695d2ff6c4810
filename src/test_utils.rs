//! Shared test utilities: payload fixtures, in-memory collaborators and
//! arbitrary generators for property-based testing.

use std::path::PathBuf;
use std::sync::Arc;

use proptest::prelude::*;

use crate::effects::Collaborators;
use crate::queue::MemoryQueue;
use crate::store::{
    DEFAULT_PAGE_SIZE, INSTALLATIONS_TABLE, InstallationRecord, MARKETPLACE_TABLE,
    MarketplaceRecord, MemoryTable,
};
use crate::webhooks::InstalledRepo;

/// Reads a payload from `tests/fixtures/`.
pub fn fixture(name: &str) -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
}

/// In-memory queues and tables, kept concretely typed so tests can inspect
/// what a delivery did.
pub struct MemoryBackends {
    pub router: Arc<MemoryQueue>,
    pub open_pr: Arc<MemoryQueue>,
    pub installations: Arc<MemoryTable<InstallationRecord>>,
    pub marketplace: Arc<MemoryTable<MarketplaceRecord>>,
}

impl Default for MemoryBackends {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackends {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Backends whose partition queries return at most `page_size` records.
    pub fn with_page_size(page_size: usize) -> Self {
        MemoryBackends {
            router: Arc::new(MemoryQueue::new("router")),
            open_pr: Arc::new(MemoryQueue::new("open-pr")),
            installations: Arc::new(MemoryTable::with_page_size(INSTALLATIONS_TABLE, page_size)),
            marketplace: Arc::new(MemoryTable::with_page_size(MARKETPLACE_TABLE, page_size)),
        }
    }

    /// Returns collaborators sharing these backends.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            router_queue: self.router.clone(),
            open_pr_queue: self.open_pr.clone(),
            installations: self.installations.clone(),
            marketplace: self.marketplace.clone(),
        }
    }

    /// Asserts that no queue received a message and no table saw an
    /// operation.
    pub async fn assert_untouched(&self) {
        assert!(self.router.is_empty().await, "router queue was written");
        assert!(self.open_pr.is_empty().await, "open-pr queue was written");
        assert!(
            self.installations.untouched().await,
            "installations table was touched: {:?}",
            self.installations.ops().await
        );
        assert!(
            self.marketplace.untouched().await,
            "marketplace table was touched: {:?}",
            self.marketplace.ops().await
        );
    }
}

pub fn arb_repo_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,11}"
}

pub fn arb_installed_repo() -> impl Strategy<Value = InstalledRepo> {
    (any::<u32>(), arb_repo_name()).prop_map(|(id, name)| InstalledRepo {
        repo_id: u64::from(id),
        clone_url: format!("https://github.com/owner/{name}"),
        repo_name: name,
    })
}

pub fn arb_installed_repos() -> impl Strategy<Value = Vec<InstalledRepo>> {
    prop::collection::vec(arb_installed_repo(), 0..8)
}
