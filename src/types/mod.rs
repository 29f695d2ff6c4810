//! Core identifier types shared across the webhook dispatcher.

pub mod ids;

pub use ids::{AccountId, DeliveryId, InstallationId};
