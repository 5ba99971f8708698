//! # Law Archive CLI (`lawsync`)
//!
//! Archives the threads of a Discord forum channel into a Notion database.
//!
//! ## Usage
//!
//! ```bash
//! lawsync [--config ./lawsync.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lawsync sync` | Record every thread not yet in the database |
//! | `lawsync dedupe` | Archive duplicate records only |
//! | `lawsync records` | List the records the database holds |
//! | `lawsync check` | Verify the forum channel and database are reachable |
//! | `lawsync serve` | Start the HTTP sync trigger |
//! | `lawsync completions <shell>` | Print shell completions |
//!
//! Tokens come from `DISCORD_TOKEN` and `NOTION_TOKEN` (a `.env` file is
//! read if present). Logging is controlled with `RUST_LOG`.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use law_archive::config::{self, Credentials};
use law_archive::error::is_access_error;
use law_archive::ingest::SyncOptions;
use law_archive::progress::ProgressMode;
use law_archive::store::notion::NotionStore;
use law_archive::sync_cmd::{self, SyncCommandOptions};
use law_archive::{check, env_loader, records, server};

#[derive(Parser)]
#[command(
    name = "lawsync",
    about = "Archive Discord forum threads into a Notion database, one record per law",
    version,
    long_about = "lawsync reads every thread of a Discord forum channel and creates one \
    Notion database record per thread name, with the passage date extracted from the text. \
    Runs are idempotent: threads already recorded are skipped and duplicate records are archived."
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record every forum thread that is not yet in the database.
    Sync {
        /// Report what would be recorded without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Threads processed at once (overrides `sync.concurrency`).
        #[arg(long)]
        concurrency: Option<usize>,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,

        /// Progress output on stderr.
        #[arg(long, value_enum, default_value = "auto")]
        progress: ProgressMode,
    },

    /// Archive duplicate records without reading Discord.
    Dedupe {
        #[arg(long)]
        dry_run: bool,
    },

    /// List the records the database holds.
    Records {
        #[arg(long)]
        json: bool,
    },

    /// Verify the forum channel and database are reachable.
    Check,

    /// Start the HTTP sync trigger on `[server].bind`.
    Serve,

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        if is_access_error(&e) {
            eprintln!("Error: access denied: {:#}", e);
            eprintln!(
                "Check DISCORD_TOKEN and NOTION_TOKEN, and that the bot can read the channel \
                 and the integration is shared with the database."
            );
            std::process::exit(2);
        }
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "lawsync", &mut std::io::stdout());
        return Ok(());
    }

    env_loader::load_dotenv(cli.config.as_deref());
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync {
            dry_run,
            concurrency,
            json,
            progress,
        } => {
            let credentials = Credentials::from_env()?;
            let opts = SyncCommandOptions {
                dry_run,
                concurrency,
                json,
                progress,
            };
            sync_cmd::run_sync_command(&cfg, &credentials, opts).await?;
        }
        Commands::Dedupe { dry_run } => {
            let notion_token = config::notion_token_from_env()?;
            sync_cmd::run_dedupe_command(&cfg, &notion_token, dry_run).await?;
        }
        Commands::Records { json } => {
            let store = NotionStore::new(&cfg, config::notion_token_from_env()?)?;
            records::run_records(&store, json).await?;
        }
        Commands::Check => {
            let credentials = Credentials::from_env()?;
            check::run_check(&cfg, &credentials).await?;
        }
        Commands::Serve => {
            let credentials = Credentials::from_env()?;
            let ctx = sync_cmd::build_context(&cfg, &credentials, SyncOptions::from_config(&cfg))?;
            server::run_server(&cfg, ctx).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
