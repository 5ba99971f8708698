//! Collaborator traits for the sync engine.
//!
//! The engine never talks HTTP itself. It reads threads through a
//! [`ThreadSource`] and reads/writes law records through a
//! [`RecordStore`]. The built-in implementations are
//! [`DiscordSource`](crate::connector_discord::DiscordSource) and
//! [`NotionStore`](crate::store::notion::NotionStore); tests and dry runs
//! use [`InMemoryRecordStore`](crate::store::memory::InMemoryRecordStore).
//!
//! ```text
//! ┌──────────────┐      ┌──────────────┐      ┌──────────────┐
//! │ ThreadSource │─────▶│   run_sync   │◀────▶│ RecordStore  │
//! │  (Discord)   │      │ index/chunk  │      │   (Notion)   │
//! └──────────────┘      └──────────────┘      └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use anyhow::Result;
//! use async_trait::async_trait;
//! use law_archive::models::ThreadHandle;
//! use law_archive::traits::ThreadSource;
//!
//! pub struct FixedSource;
//!
//! #[async_trait]
//! impl ThreadSource for FixedSource {
//!     fn name(&self) -> &str { "fixed" }
//!
//!     async fn list_threads(&self) -> Result<Vec<ThreadHandle>> {
//!         Ok(vec![ThreadHandle { id: "1".into(), name: "Law A".into(), archived: false }])
//!     }
//!
//!     async fn fetch_messages(&self, _thread: &ThreadHandle) -> Result<Vec<String>> {
//!         Ok(vec!["Text passed 1/1/2023".into()])
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{LawRecord, NewLawRecord, ThreadHandle};

/// A forum-like channel whose threads are archived as laws.
#[async_trait]
pub trait ThreadSource: Send + Sync {
    /// Short label used in logs and progress output (e.g. `"discord:1234"`).
    fn name(&self) -> &str;

    /// Enumerate every thread in the channel, active and archived.
    ///
    /// An error here is fatal for the whole sync: without a thread list
    /// nothing can be processed.
    async fn list_threads(&self) -> Result<Vec<ThreadHandle>>;

    /// Fetch the message texts of one thread, oldest first.
    async fn fetch_messages(&self, thread: &ThreadHandle) -> Result<Vec<String>>;
}

/// The destination database of law records.
///
/// Implementations issue independent requests; no lock is held across
/// calls.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List every record in the collection, including archived ones when
    /// the backend returns them.
    async fn list_records(&self) -> Result<Vec<LawRecord>>;

    /// Create a record and return its store-assigned id.
    async fn create_record(&self, record: &NewLawRecord) -> Result<String>;

    /// Archive (logically delete) a record. Archiving an already archived
    /// record succeeds.
    async fn archive_record(&self, id: &str) -> Result<()>;
}
