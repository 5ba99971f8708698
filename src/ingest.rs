//! Sync orchestration.
//!
//! Coordinates the full archival flow for one invocation:
//!
//! 1. enumerate the source threads (any failure here aborts the run);
//! 2. build the [`RecordIndex`] from the store and archive superseded
//!    duplicates;
//! 3. for every thread, concurrently: skip it if its name is already
//!    recorded, otherwise read its messages, extract the passage date,
//!    chunk the content and create the record.
//!
//! Each thread ends as `Skipped`, `Recorded` or `Failed`; a failing thread
//! never stops its siblings.
//!
//! # Consistency
//!
//! The index is a snapshot taken once per run and is not updated as
//! records are created. Two threads with the same name processed in one run
//! can therefore both be recorded. The next run sees both records, keeps
//! the oldest and archives the other, so the store converges to one active
//! record per name without any cross-request lock.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::chunk::{chunk_text, MAX_CHUNK_CHARS};
use crate::config::Config;
use crate::date::read_passage_date;
use crate::error::is_transient_error;
use crate::index::{load_index, RecordIndex};
use crate::models::{
    ArchiveReport, FailureReason, NewLawRecord, SourceThread, SyncReport, ThreadHandle,
    ThreadOutcome, ThreadReport,
};
use crate::progress::{SyncProgressEvent, SyncProgressReporter};
use crate::resolve::archive_superseded;
use crate::traits::{RecordStore, ThreadSource};

/// Tunables for one sync run.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Maximum threads (and archive requests) in flight at once.
    pub concurrency: usize,
    pub max_chunk_chars: usize,
    /// Compute outcomes without archiving or creating anything.
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_chunk_chars: MAX_CHUNK_CHARS,
            dry_run: false,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.sync.concurrency,
            max_chunk_chars: config.sync.max_chunk_chars,
            dry_run: false,
        }
    }
}

/// The collaborators and options a sync run works with.
#[derive(Clone)]
pub struct SyncContext {
    pub source: Arc<dyn ThreadSource>,
    pub store: Arc<dyn RecordStore>,
    pub options: SyncOptions,
}

impl SyncContext {
    pub fn new(
        source: Arc<dyn ThreadSource>,
        store: Arc<dyn RecordStore>,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            store,
            options,
        }
    }
}

/// Run one synchronization pass.
///
/// Threads that have not started when `cancel` fires end as
/// `Failed(Cancelled)`; threads already in flight run to completion.
///
/// # Errors
///
/// Returns an error only when the run cannot proceed at all: the thread
/// list or the existing records cannot be read. Per-thread failures are
/// reported in the returned [`SyncReport`].
pub async fn run_sync(
    ctx: &SyncContext,
    cancel: &CancellationToken,
    progress: &dyn SyncProgressReporter,
) -> Result<SyncReport> {
    let source_name = ctx.source.name().to_string();
    progress.report(SyncProgressEvent::Discovering {
        source: source_name.clone(),
    });

    let threads = ctx
        .source
        .list_threads()
        .await
        .with_context(|| format!("Failed to list threads of {}", source_name))?;
    tracing::info!(source = %source_name, threads = threads.len(), "starting sync");

    let (index, duplicates) = refresh_index(&ctx.store, &ctx.options, progress).await?;
    let index = Arc::new(index);

    let total = threads.len() as u64;
    let concurrency = ctx.options.concurrency.max(1);
    let mut reports: Vec<ThreadReport> = Vec::with_capacity(threads.len());
    let mut tasks: JoinSet<ThreadReport> = JoinSet::new();
    let finish = |reports: &mut Vec<ThreadReport>, report: ThreadReport| {
        reports.push(report);
        progress.report(SyncProgressEvent::Processing {
            source: source_name.clone(),
            n: reports.len() as u64,
            total,
        });
    };

    for thread in threads {
        while tasks.len() >= concurrency {
            if let Some(report) = join_next(&mut tasks).await {
                finish(&mut reports, report);
            }
        }
        if cancel.is_cancelled() {
            finish(
                &mut reports,
                ThreadReport {
                    thread_id: thread.id,
                    thread_name: thread.name,
                    outcome: ThreadOutcome::failed(FailureReason::Cancelled),
                },
            );
            continue;
        }

        let ctx = ctx.clone();
        let index = index.clone();
        tasks.spawn(async move {
            let worker = {
                let thread = thread.clone();
                tokio::spawn(async move { process_thread(&ctx, &index, &thread).await })
            };
            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(thread = %thread.record_name(), "thread processing failed: {}", e);
                    ThreadOutcome::failed(FailureReason::Internal(e.to_string()))
                }
            };
            ThreadReport {
                thread_id: thread.id,
                thread_name: thread.name,
                outcome,
            }
        });
    }
    while !tasks.is_empty() {
        if let Some(report) = join_next(&mut tasks).await {
            finish(&mut reports, report);
        }
    }

    reports.sort_by(|a, b| {
        a.thread_name
            .cmp(&b.thread_name)
            .then_with(|| a.thread_id.cmp(&b.thread_id))
    });

    let report = SyncReport {
        dry_run: ctx.options.dry_run,
        threads: reports,
        duplicates,
    };
    let summary = report.summary();
    tracing::info!(
        recorded = summary.recorded,
        skipped = summary.skipped,
        failed = summary.failed,
        would_record = summary.would_record,
        duplicates_archived = summary.duplicates_archived,
        "sync finished"
    );
    Ok(report)
}

/// Build the index and archive superseded duplicates (unless dry run).
pub async fn refresh_index(
    store: &Arc<dyn RecordStore>,
    options: &SyncOptions,
    progress: &dyn SyncProgressReporter,
) -> Result<(RecordIndex, ArchiveReport)> {
    let index = load_index(store.as_ref()).await?;
    let superseded = index.superseded();
    if superseded.is_empty() || options.dry_run {
        if !superseded.is_empty() {
            tracing::info!(duplicates = superseded.len(), "dry run: not archiving duplicates");
        }
        return Ok((index, ArchiveReport::default()));
    }

    progress.report(SyncProgressEvent::Deduplicating {
        duplicates: superseded.len() as u64,
    });
    let report = archive_superseded(store.clone(), superseded, options.concurrency).await;
    Ok((index, report))
}

/// Wait for the next spawned thread task.
///
/// Each task turns a crash of its worker into `Failed(Internal)`, so an
/// error here means the wrapper itself died and is only logged.
async fn join_next(tasks: &mut JoinSet<ThreadReport>) -> Option<ThreadReport> {
    match tasks.join_next().await? {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::error!("thread task failed: {}", e);
            None
        }
    }
}

async fn process_thread(
    ctx: &SyncContext,
    index: &RecordIndex,
    thread: &ThreadHandle,
) -> ThreadOutcome {
    let name = thread.record_name();
    if index.contains(name) {
        tracing::debug!(thread = %name, "already recorded, skipping");
        return ThreadOutcome::Skipped;
    }

    let messages = match ctx.source.fetch_messages(thread).await {
        Ok(messages) => messages,
        Err(e) => {
            tracing::error!(
                thread = %name,
                transient = is_transient_error(&e),
                "failed to read thread: {:#}",
                e
            );
            return ThreadOutcome::failed(FailureReason::Source(format!("{:#}", e)));
        }
    };

    let source_thread = SourceThread {
        name: name.to_string(),
        messages,
    };
    let content = source_thread.content();
    if content.trim().is_empty() {
        tracing::warn!(thread = %name, "thread content is empty");
        return ThreadOutcome::failed(FailureReason::EmptyContent);
    }

    let draft = assemble_record(&source_thread.name, &content, ctx.options.max_chunk_chars);

    if ctx.options.dry_run {
        return ThreadOutcome::WouldRecord {
            chunks: draft.content_chunks.len(),
            passage_date: draft.passage_date,
        };
    }

    match ctx.store.create_record(&draft).await {
        Ok(record_id) => {
            tracing::info!(
                thread = %name,
                id = %record_id,
                chunks = draft.content_chunks.len(),
                archived_thread = thread.archived,
                "recorded law"
            );
            ThreadOutcome::Recorded { record_id }
        }
        Err(e) => {
            tracing::error!(
                thread = %name,
                transient = is_transient_error(&e),
                "failed to record law: {:#}",
                e
            );
            ThreadOutcome::failed(FailureReason::Store(format!("{:#}", e)))
        }
    }
}

/// Build the creation draft for a thread's content.
pub fn assemble_record(name: &str, content: &str, max_chunk_chars: usize) -> NewLawRecord {
    let passage = read_passage_date(content);
    if let Some(p) = passage.filter(|p| p.ambiguous) {
        tracing::debug!(
            thread = %name,
            date = %p.date,
            "passage date is ambiguous, using month/day reading"
        );
    }
    NewLawRecord {
        name: name.to_string(),
        content_chunks: chunk_text(content, max_chunk_chars),
        passage_date: passage.map(|p| p.date),
    }
}
