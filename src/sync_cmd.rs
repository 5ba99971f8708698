//! `lawsync sync` and `lawsync dedupe` commands.
//!
//! Builds the Discord source and Notion store from configuration, wires
//! Ctrl-C to the cancellation token, runs the engine and prints the result
//! to stdout (a summary table, or the full report as JSON).

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Credentials};
use crate::connector_discord::DiscordSource;
use crate::ingest::{refresh_index, run_sync, SyncContext, SyncOptions};
use crate::models::{FailureReason, SyncReport, ThreadOutcome};
use crate::progress::{NoProgress, ProgressMode};
use crate::store::notion::NotionStore;
use crate::traits::RecordStore;

/// Options for `lawsync sync` beyond what the config file holds.
#[derive(Debug, Clone, Copy)]
pub struct SyncCommandOptions {
    pub dry_run: bool,
    pub concurrency: Option<usize>,
    pub json: bool,
    pub progress: ProgressMode,
}

/// Build the live collaborators for a sync run.
pub fn build_context(
    config: &Config,
    credentials: &Credentials,
    options: SyncOptions,
) -> Result<SyncContext> {
    let source = DiscordSource::new(config, credentials.discord_token.clone())?;
    let store = NotionStore::new(config, credentials.notion_token.clone())?;
    Ok(SyncContext::new(Arc::new(source), Arc::new(store), options))
}

pub async fn run_sync_command(
    config: &Config,
    credentials: &Credentials,
    opts: SyncCommandOptions,
) -> Result<()> {
    let mut options = SyncOptions::from_config(config);
    options.dry_run = opts.dry_run;
    if let Some(n) = opts.concurrency {
        options.concurrency = n.max(1);
    }
    let ctx = build_context(config, credentials, options)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = || async { tokio::signal::ctrl_c().await.is_ok() };
        if wait_for_interrupts(ctrl_c, on_interrupt).await {
            eprintln!("Interrupted again, exiting without waiting for in-flight threads");
            std::process::exit(130);
        }
    });

    let progress = opts.progress.reporter();
    let report = run_sync(&ctx, &cancel, progress.as_ref()).await?;
    print_report(&report, opts.json)?;
    Ok(())
}

/// Wait for interrupts: the first cancels `cancel` so in-flight threads can
/// finish, and a second returns `true` so the caller can exit at once.
///
/// `next_signal` resolves to `false` when signals can no longer be received.
pub async fn wait_for_interrupts<F, Fut>(mut next_signal: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    if !next_signal().await {
        return false;
    }
    tracing::warn!("interrupted, finishing in-flight threads (press Ctrl-C again to quit)");
    cancel.cancel();
    next_signal().await
}

/// Index the store and archive duplicate records without touching Discord.
pub async fn run_dedupe_command(config: &Config, notion_token: &str, dry_run: bool) -> Result<()> {
    let store: Arc<dyn RecordStore> = Arc::new(NotionStore::new(config, notion_token)?);
    let mut options = SyncOptions::from_config(config);
    options.dry_run = dry_run;

    let (index, report) = refresh_index(&store, &options, &NoProgress).await?;
    let found = index.superseded().len();

    if dry_run {
        println!("Dry run: {} duplicate records would be archived", found);
        for record in index.superseded() {
            println!("  {}  {}", record.id, record.name);
        }
    } else {
        println!("Duplicates found:    {}", found);
        println!("Archived:            {}", report.archived);
        println!("Failed:              {}", report.failed);
    }
    Ok(())
}

/// Print a finished run: JSON on request, otherwise one line per
/// thread that did something followed by the totals.
pub fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    print!("{}", format_report(report));
    Ok(())
}

pub fn format_report(report: &SyncReport) -> String {
    let mut out = String::new();
    for thread in &report.threads {
        let line = match &thread.outcome {
            ThreadOutcome::Skipped => continue,
            ThreadOutcome::Recorded { record_id } => {
                format!("recorded     {}  ({})", thread.thread_name, record_id)
            }
            ThreadOutcome::WouldRecord {
                chunks,
                passage_date,
            } => {
                let date = passage_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "no date".to_string());
                format!(
                    "would record {}  ({} chunks, {})",
                    thread.thread_name, chunks, date
                )
            }
            ThreadOutcome::Failed { reason } => match reason {
                FailureReason::EmptyContent | FailureReason::Cancelled => {
                    format!("failed       {}  ({})", thread.thread_name, reason)
                }
                FailureReason::Source(_) | FailureReason::Store(_) | FailureReason::Internal(_) => {
                    format!("failed       {}  {}", thread.thread_name, reason)
                }
            },
        };
        out.push_str(&line);
        out.push('\n');
    }

    let summary = report.summary();
    if report.dry_run {
        out.push_str("Dry run, nothing written.\n");
        out.push_str(&format!("  would record:        {}\n", summary.would_record));
    } else {
        out.push_str(&format!("  recorded:            {}\n", summary.recorded));
    }
    out.push_str(&format!("  skipped:             {}\n", summary.skipped));
    out.push_str(&format!("  failed:              {}\n", summary.failed));
    out.push_str(&format!(
        "  duplicates archived: {}\n",
        summary.duplicates_archived
    ));
    if summary.duplicates_failed > 0 {
        out.push_str(&format!(
            "  duplicates failed:   {}\n",
            summary.duplicates_failed
        ));
    }
    out
}
