//! # Law Archive
//!
//! Mirrors the threads of a Discord forum channel into a Notion database,
//! one record per law.
//!
//! Each thread's title is the law's name and its messages are the law's
//! text. A sync creates a record for every thread whose name is not yet in
//! the database, pulls the passage date out of the text ("passed 3/4/2024")
//! and archives duplicate records so each name has exactly one active
//! record. Re-running a sync is safe: recorded threads are skipped.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ ThreadSource │──▶│   Sync engine    │──▶│ RecordStore  │
//! │  (Discord)   │   │ index+date+chunk │   │   (Notion)   │
//! └──────────────┘   └────────┬─────────┘   └──────────────┘
//!                             │
//!                 ┌───────────┴───────────┐
//!                 ▼                       ▼
//!           ┌──────────┐            ┌──────────┐
//!           │   CLI    │            │   HTTP   │
//!           │(lawsync) │            │ trigger  │
//!           └──────────┘            └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export DISCORD_TOKEN=... NOTION_TOKEN=...
//! export DISCORD_CHANNEL_ID=... NOTION_DATABASE_ID=...
//! lawsync check                 # verify both APIs are reachable
//! lawsync sync --dry-run        # preview what would be recorded
//! lawsync sync                  # archive new laws
//! lawsync serve                 # start the HTTP trigger
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credentials |
//! | [`models`] | Core data types and run reports |
//! | [`traits`] | `ThreadSource` and `RecordStore` seams |
//! | [`date`] | Passage date extraction |
//! | [`chunk`] | Content chunking for the store's size limit |
//! | [`index`] | Existing-record index and duplicate detection |
//! | [`resolve`] | Archiving superseded duplicates |
//! | [`ingest`] | Sync orchestration |
//! | [`connector_discord`] | Discord forum thread source |
//! | [`store`] | Notion and in-memory record stores |
//! | [`error`] | HTTP API error classification |
//! | [`server`] | HTTP sync trigger |

pub mod check;
pub mod chunk;
pub mod config;
pub mod connector_discord;
pub mod date;
pub mod env_loader;
pub mod error;
pub mod index;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod records;
pub mod resolve;
pub mod server;
pub mod store;
pub mod sync_cmd;
pub mod traits;
