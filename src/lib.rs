//! # Newswire
//!
//! A news aggregation ingestion pipeline.
//!
//! Newswire pulls articles from third-party news providers, maps each
//! provider's wire format onto one canonical article shape, drops records
//! without a title or url, and upserts the rest into SQLite keyed by url.
//! A scheduler repeats this per source without overlapping runs, and a
//! small HTTP API serves the stored articles.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │  Providers  │──▶│ Orchestrator │──▶│  SQLite   │
//! │ newsapi/... │   │  validate +  │   │ articles  │
//! └─────────────┘   │    upsert    │   └─────┬─────┘
//!                   └──────▲───────┘         │
//!                          │                 │
//!                   ┌──────┴─────┐     ┌─────▼─────┐
//!                   │ Scheduler  │     │ HTTP API  │
//!                   └────────────┘     └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! newswire init                 # create database
//! newswire fetch newsapi        # one ingestion run
//! newswire fetch all
//! newswire articles --source BBC
//! newswire serve --schedule     # HTTP API plus periodic ingestion
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`providers`] | Provider adapters and registry |
//! | [`ingest`] | Ingestion orchestrator |
//! | [`scheduler`] | Periodic, overlap-free runs |
//! | [`sqlite_store`] | SQLite article store |
//! | [`server`] | Read-only HTTP API |
//! | [`telemetry`] | `tracing` setup and event sink |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod app;
pub mod config;
pub mod db;
pub mod ingest;
pub mod migrate;
pub mod providers;
pub mod scheduler;
pub mod server;
pub mod sources;
pub mod sqlite_store;
pub mod telemetry;
