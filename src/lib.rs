//! # Doclens
//!
//! A document analysis orchestrator. Accepts batches of uploaded documents,
//! validates and hashes each one, reuses earlier results for content the
//! owner already analyzed in the same scope, sends everything else to a
//! remote analysis engine concurrently, and records an audit trail of every
//! analysis in SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ HTTP / CLI   │──▶│  Analyzer    │──▶│ Remote engine│
//! │ uploads      │   │ (per file)   │   │ /analyze     │
//! └──────────────┘   └──────┬───────┘   └──────────────┘
//!                           │ dedup + audit rows
//!                           ▼
//!                     ┌──────────┐
//!                     │  SQLite  │
//!                     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! doclens init                                  # create database
//! doclens analyze report.pdf notes.txt --owner alice
//! doclens serve                                 # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and `DOCLENS_*` overrides |
//! | [`analyze`] | Per-file state machine and batch fan-out |
//! | [`source`] | Upload streams and the single-pass hasher |
//! | [`engine`] | Remote analysis engine client |
//! | [`persist`] | Dedup lookup and audit writes |
//! | [`quiz`] | Quiz generation pass-through |
//! | [`history`] | Stored analyses and document listings |
//! | [`sqlite_store`] | SQLite repository |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod analyze;
pub mod config;
pub mod db;
pub mod engine;
pub mod history;
pub mod migrate;
pub mod persist;
pub mod quiz;
pub mod server;
pub mod source;
pub mod sqlite_store;
