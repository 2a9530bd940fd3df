//! # Channel Harvester
//!
//! Harvests the message history of a Slack channel, threads included, and
//! delivers it in bounded batches to a persistent store and an embedding
//! service.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────┐   ┌───────────┐
//! │ Slack Web   │──▶│  Pipeline            │──▶│  SQLite   │
//! │ API         │   │  page → normalize →  │   │  records  │
//! └─────────────┘   │  batch → replies     │   └───────────┘
//!                   └──────────┬───────────┘
//!                              ▼
//!                       ┌────────────┐
//!                       │ Embedding  │
//!                       │ endpoint   │
//!                       └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! harvest init                  # create database
//! harvest run C0123456789       # harvest a channel
//! harvest get <object_id>       # inspect a stored record
//! harvest stats                 # counts and recent runs
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Upstream failure taxonomy |
//! | [`slack`] | Slack Web API client |
//! | [`policy`] | Retry, backoff and timeout per call site |
//! | [`paginator`] | Bounded history pagination |
//! | [`replies`] | Concurrent thread resolution |
//! | [`pipeline`] | Harvest orchestration |
//! | [`embedding`] | HTTP embedding sink |
//! | [`sqlite_store`] | SQLite persistence sink |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`progress`] | Progress reporting on stderr |
//!
//! Data types, normalization, batching and the collaborator traits live in
//! the `channel-harvester-core` crate.

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod get;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod paginator;
pub mod pipeline;
pub mod policy;
pub mod progress;
pub mod replies;
pub mod slack;
pub mod sqlite_store;
pub mod stats;
