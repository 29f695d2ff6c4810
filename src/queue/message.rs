//! Outbound queue message shapes.
//!
//! Both messages are serialized as flat JSON objects with PascalCase keys,
//! which is the format the router and open-pr workers read.

use serde::{Deserialize, Serialize};

use crate::types::InstallationId;

/// Asks the router to schedule an image-optimization build for a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouterMessage {
    pub installation_id: InstallationId,
    pub owner: String,
    pub repo_name: String,
    pub clone_url: String,
}

/// Asks the open-pr worker to open a pull request from the bot's branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OpenPrMessage {
    pub installation_id: InstallationId,
    pub repo_name: String,
    pub clone_url: String,
}
