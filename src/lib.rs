//! Imgbot webhook dispatcher - turns GitHub webhook deliveries into queued
//! image-optimization work and keeps installation and marketplace records
//! current.
//!
//! A delivery flows through three stages:
//! - [`webhooks::parse_webhook`] turns the raw payload into a typed event
//! - [`webhooks::handle_event`] classifies it into an [`effects::Decision`]
//! - [`effects::execute`] performs the decision's queue and table writes
//!
//! [`delivery::Hook`] ties the stages together; [`server`] exposes it over
//! HTTP.

pub mod config;
pub mod delivery;
pub mod effects;
pub mod persistence;
pub mod queue;
pub mod server;
pub mod store;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
