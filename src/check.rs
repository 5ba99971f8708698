//! `lawsync check`: verify both collaborators before a sync.

use anyhow::{bail, Result};

use crate::config::{Config, Credentials};
use crate::connector_discord::DiscordSource;
use crate::store::notion::NotionStore;

/// Outcome of probing one collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub target: String,
    pub healthy: bool,
    pub detail: String,
}

/// Probe the forum channel and the database. Never fails; problems are
/// reported per target.
pub async fn check_collaborators(source: &DiscordSource, store: &NotionStore) -> Vec<CheckResult> {
    let discord = match source.check().await {
        Ok(guild_id) => CheckResult {
            target: "discord".to_string(),
            healthy: true,
            detail: format!("forum channel in guild {}", guild_id),
        },
        Err(e) => CheckResult {
            target: "discord".to_string(),
            healthy: false,
            detail: format!("{:#}", e),
        },
    };

    let notion = match store.check().await {
        Ok(()) => CheckResult {
            target: "notion".to_string(),
            healthy: true,
            detail: "database reachable".to_string(),
        },
        Err(e) => CheckResult {
            target: "notion".to_string(),
            healthy: false,
            detail: format!("{:#}", e),
        },
    };

    vec![discord, notion]
}

pub async fn run_check(config: &Config, credentials: &Credentials) -> Result<()> {
    let source = DiscordSource::new(config, credentials.discord_token.clone())?;
    let store = NotionStore::new(config, credentials.notion_token.clone())?;
    let results = check_collaborators(&source, &store).await;

    println!("{:<10} {:<10} DETAIL", "TARGET", "STATUS");
    for result in &results {
        let status = if result.healthy { "OK" } else { "FAILED" };
        println!("{:<10} {:<10} {}", result.target, status, result.detail);
    }

    let failed = results.iter().filter(|r| !r.healthy).count();
    if failed > 0 {
        bail!("{} of {} checks failed", failed, results.len());
    }
    Ok(())
}
