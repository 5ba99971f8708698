//! Core data models used throughout Law Archive.
//!
//! These types represent the forum threads read from the source platform,
//! the law records held by the destination store, and the per-thread
//! outcomes produced by a sync run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Record name used when a thread has an empty or blank title.
pub const UNNAMED_LAW: &str = "Unnamed Law";

/// Lightweight reference to a forum thread, as returned by enumeration.
///
/// Messages are fetched separately and only for threads that are not
/// already recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadHandle {
    pub id: String,
    pub name: String,
    pub archived: bool,
}

impl ThreadHandle {
    /// The dedup key for this thread: its name, or [`UNNAMED_LAW`] when blank.
    pub fn record_name(&self) -> &str {
        record_name(&self.name)
    }
}

/// A forum thread with its messages in source order (oldest first).
#[derive(Debug, Clone)]
pub struct SourceThread {
    pub name: String,
    pub messages: Vec<String>,
}

impl SourceThread {
    /// Concatenate all messages, each followed by a newline.
    pub fn content(&self) -> String {
        let mut content = String::new();
        for message in &self.messages {
            content.push_str(message);
            content.push('\n');
        }
        content
    }
}

/// A law record as stored in the destination database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LawRecord {
    pub id: String,
    pub name: String,
    pub content_chunks: Vec<String>,
    pub passage_date: Option<NaiveDate>,
    pub created_time: DateTime<Utc>,
    pub archived: bool,
}

/// Draft of a law record submitted for creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLawRecord {
    pub name: String,
    pub content_chunks: Vec<String>,
    pub passage_date: Option<NaiveDate>,
}

/// Why a thread was not recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The concatenated message text was empty or whitespace-only.
    EmptyContent,
    /// The run was cancelled before this thread started.
    Cancelled,
    /// Reading the thread's messages failed.
    Source(String),
    /// The destination store rejected the create request.
    Store(String),
    /// Processing the thread crashed before it reached an outcome.
    Internal(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::EmptyContent => write!(f, "empty content"),
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::Source(msg) => write!(f, "source error: {}", msg),
            FailureReason::Store(msg) => write!(f, "store error: {}", msg),
            FailureReason::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

/// Terminal state of a single thread within a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ThreadOutcome {
    /// An active record with this name already exists.
    Skipped,
    /// A new record was created.
    Recorded { record_id: String },
    /// Dry run: a record would have been created.
    WouldRecord {
        chunks: usize,
        passage_date: Option<NaiveDate>,
    },
    Failed { reason: FailureReason },
}

impl ThreadOutcome {
    pub fn failed(reason: FailureReason) -> Self {
        ThreadOutcome::Failed { reason }
    }
}

/// Outcome of one thread, tagged with its name.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadReport {
    pub thread_id: String,
    pub thread_name: String,
    #[serde(flatten)]
    pub outcome: ThreadOutcome,
}

/// Result of archiving superseded duplicate records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub archived: usize,
    pub failed: usize,
}

/// Aggregate counts of a sync run, for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub recorded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub would_record: usize,
    pub duplicates_archived: usize,
    pub duplicates_failed: usize,
}

/// Full result of a sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub threads: Vec<ThreadReport>,
    pub duplicates: ArchiveReport,
}

impl SyncReport {
    pub fn summary(&self) -> SyncSummary {
        let mut summary = SyncSummary {
            duplicates_archived: self.duplicates.archived,
            duplicates_failed: self.duplicates.failed,
            ..SyncSummary::default()
        };
        for report in &self.threads {
            match report.outcome {
                ThreadOutcome::Skipped => summary.skipped += 1,
                ThreadOutcome::Recorded { .. } => summary.recorded += 1,
                ThreadOutcome::WouldRecord { .. } => summary.would_record += 1,
                ThreadOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    /// Look up the outcome for a thread by name (first match).
    pub fn outcome_for(&self, thread_name: &str) -> Option<&ThreadOutcome> {
        self.threads
            .iter()
            .find(|r| r.thread_name == thread_name)
            .map(|r| &r.outcome)
    }
}

/// Map a thread title to its record name.
pub fn record_name(thread_name: &str) -> &str {
    if thread_name.trim().is_empty() {
        UNNAMED_LAW
    } else {
        thread_name
    }
}
