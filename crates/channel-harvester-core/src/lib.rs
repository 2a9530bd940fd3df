//! # Channel Harvester Core
//!
//! Shared, runtime-agnostic logic for Channel Harvester: message models,
//! normalization, batching, embedding instances, and the collaborator traits
//! the pipeline talks to.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Concrete Slack, SQLite, and HTTP embedding implementations live in the
//! `channel-harvester` crate.

pub mod batch;
pub mod embedding;
pub mod messaging;
pub mod models;
pub mod normalize;
pub mod store;
