//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use crate::effects::Collaborators;
use crate::queue::{MemoryQueue, MessageQueue, SpoolQueue};
use crate::store::{
    DEFAULT_PAGE_SIZE, FileTable, INSTALLATIONS_TABLE, InstallationRecord, MARKETPLACE_TABLE,
    MarketplaceRecord, MemoryTable, Table,
};
use crate::webhooks::BotIdentity;
use crate::webhooks::handlers::{DEFAULT_BOT_BRANCH, DEFAULT_BOT_LOGIN};

/// Imgbot webhook dispatcher - turns GitHub deliveries into queued work
#[derive(Parser, Debug, Clone)]
#[command(name = "imgbot-webhook")]
pub struct Config {
    /// Bind address
    #[arg(long, env = "IMGBOT_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Directory holding queue spools and table files
    #[arg(long, env = "IMGBOT_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Keep queues and tables in memory (nothing survives a restart)
    #[arg(long, env = "IMGBOT_IN_MEMORY")]
    pub in_memory: bool,

    /// Sender login of the bot's own pushes
    #[arg(long, env = "IMGBOT_BOT_LOGIN", default_value = DEFAULT_BOT_LOGIN)]
    pub bot_login: String,

    /// Branch the bot pushes optimized images to
    #[arg(long, env = "IMGBOT_BOT_BRANCH", default_value = DEFAULT_BOT_BRANCH)]
    pub bot_branch: String,

    /// Queue receiving build requests
    #[arg(long, env = "IMGBOT_ROUTER_QUEUE", default_value = "router")]
    pub router_queue: String,

    /// Queue receiving pull-request requests
    #[arg(long, env = "IMGBOT_OPEN_PR_QUEUE", default_value = "open-pr")]
    pub open_pr_queue: String,

    /// Maximum records per partition query page
    #[arg(long, env = "IMGBOT_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

impl Config {
    /// Returns the bot identity the classifier compares pushes against.
    pub fn bot(&self) -> BotIdentity {
        BotIdentity::new(&self.bot_login, &self.bot_branch)
    }

    /// Returns the directory queue spools live under.
    pub fn queue_dir(&self) -> PathBuf {
        self.data_dir.join("queues")
    }

    /// Returns the directory table files live under.
    pub fn table_dir(&self) -> PathBuf {
        self.data_dir.join("tables")
    }

    /// Builds the queues and tables this configuration selects.
    ///
    /// Nothing is created on disk until the first write.
    pub fn collaborators(&self) -> Collaborators {
        if self.in_memory {
            self.memory_collaborators()
        } else {
            self.file_collaborators(&self.queue_dir(), &self.table_dir())
        }
    }

    fn memory_collaborators(&self) -> Collaborators {
        let installations: MemoryTable<InstallationRecord> =
            MemoryTable::with_page_size(INSTALLATIONS_TABLE, self.page_size);
        let marketplace: MemoryTable<MarketplaceRecord> =
            MemoryTable::with_page_size(MARKETPLACE_TABLE, self.page_size);
        Collaborators {
            router_queue: Arc::new(MemoryQueue::new(&self.router_queue)),
            open_pr_queue: Arc::new(MemoryQueue::new(&self.open_pr_queue)),
            installations: Arc::new(installations),
            marketplace: Arc::new(marketplace),
        }
    }

    fn file_collaborators(&self, queue_dir: &Path, table_dir: &Path) -> Collaborators {
        let router_queue: Arc<dyn MessageQueue> =
            Arc::new(SpoolQueue::new(queue_dir, &self.router_queue));
        let open_pr_queue: Arc<dyn MessageQueue> =
            Arc::new(SpoolQueue::new(queue_dir, &self.open_pr_queue));
        let installations: Arc<dyn Table<InstallationRecord>> = Arc::new(
            FileTable::with_page_size(table_dir, INSTALLATIONS_TABLE, self.page_size),
        );
        let marketplace: Arc<dyn Table<MarketplaceRecord>> = Arc::new(FileTable::with_page_size(
            table_dir,
            MARKETPLACE_TABLE,
            self.page_size,
        ));
        Collaborators {
            router_queue,
            open_pr_queue,
            installations,
            marketplace,
        }
    }
}
