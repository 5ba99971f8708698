//! Discord forum connector.
//!
//! Enumerates the threads of a forum channel through the Discord REST API
//! and reads each thread's messages. Active threads come from the guild's
//! active-thread listing (filtered to the channel); archived threads come
//! from the channel's public archive, paginated by archive timestamp.
//!
//! # Configuration
//!
//! ```toml
//! [discord]
//! channel_id = "123456789012345678"
//! ```
//!
//! The bot token is read from `DISCORD_TOKEN`. The bot needs the
//! *View Channel* and *Read Message History* permissions on the forum,
//! and the *Message Content* intent for message text to be returned.
//!
//! # Pagination
//!
//! - Archived threads: `GET /channels/{id}/threads/archived/public?limit=100&before=<ts>`
//!   until `has_more` is false.
//! - Messages: `GET /channels/{thread}/messages?limit=100&before=<id>` until a
//!   page comes back short. Discord returns newest first; the connector
//!   reverses them so callers get source order.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::Config;
use crate::error::{check_response, ApiError};
use crate::models::ThreadHandle;
use crate::traits::ThreadSource;

const SERVICE: &str = "discord";
const PAGE_LIMIT: usize = 100;

/// Channel types that hold threads as posts.
const GUILD_FORUM: u8 = 15;
const GUILD_MEDIA: u8 = 16;

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    guild_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    thread_metadata: Option<ThreadMetadata>,
}

#[derive(Debug, Deserialize)]
struct ThreadMetadata {
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    archive_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadList {
    #[serde(default)]
    threads: Vec<ThreadChannel>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct Message {
    id: String,
    #[serde(default)]
    content: String,
}

impl ThreadChannel {
    fn into_handle(self) -> ThreadHandle {
        let archived = self
            .thread_metadata
            .as_ref()
            .map(|m| m.archived)
            .unwrap_or(false);
        ThreadHandle {
            id: self.id,
            name: self.name.unwrap_or_default(),
            archived,
        }
    }
}

/// [`ThreadSource`] reading a Discord forum channel.
pub struct DiscordSource {
    client: reqwest::Client,
    token: String,
    api_base: String,
    channel_id: String,
    label: String,
}

impl DiscordSource {
    /// Create a source for the configured forum channel.
    ///
    /// # Errors
    ///
    /// Returns an error if `discord.channel_id` is not set or the HTTP
    /// client cannot be built.
    pub fn new(config: &Config, token: impl Into<String>) -> Result<Self> {
        let channel_id = config.channel_id()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.sync.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
            api_base: config.discord.api_base.trim_end_matches('/').to_string(),
            label: format!("discord:{}", channel_id),
            channel_id,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bot {}", self.token))
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to reach Discord ({})", path))?;
        let value = check_response(SERVICE, response)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("Invalid Discord response for {}", path))?;
        Ok(value)
    }

    /// Fetch the channel and verify it is a forum. Returns its guild id.
    pub async fn check(&self) -> Result<String> {
        let channel: Channel = self
            .get_json(&format!("/channels/{}", self.channel_id), &[])
            .await?;
        if channel.kind != GUILD_FORUM && channel.kind != GUILD_MEDIA {
            return Err(ApiError::Access {
                service: SERVICE,
                message: format!(
                    "channel {} is not a forum channel (type {})",
                    self.channel_id, channel.kind
                ),
            }
            .into());
        }
        channel.guild_id.ok_or_else(|| {
            ApiError::Access {
                service: SERVICE,
                message: format!("channel {} does not belong to a guild", self.channel_id),
            }
            .into()
        })
    }

    async fn active_threads(&self, guild_id: &str) -> Result<Vec<ThreadChannel>> {
        let list: ThreadList = self
            .get_json(&format!("/guilds/{}/threads/active", guild_id), &[])
            .await?;
        Ok(list
            .threads
            .into_iter()
            .filter(|t| t.parent_id.as_deref() == Some(self.channel_id.as_str()))
            .collect())
    }

    async fn archived_threads(&self) -> Result<Vec<ThreadChannel>> {
        let path = format!("/channels/{}/threads/archived/public", self.channel_id);
        let mut threads = Vec::new();
        let mut before: Option<String> = None;

        loop {
            let mut query = vec![("limit", PAGE_LIMIT.to_string())];
            if let Some(ts) = &before {
                query.push(("before", ts.clone()));
            }
            let page: ThreadList = self.get_json(&path, &query).await?;

            let next = page
                .threads
                .last()
                .and_then(|t| t.thread_metadata.as_ref())
                .and_then(|m| m.archive_timestamp.clone());
            let has_more = page.has_more;
            threads.extend(page.threads);

            match next {
                Some(ts) if has_more && before.as_deref() != Some(ts.as_str()) => before = Some(ts),
                _ => break,
            }
        }

        Ok(threads)
    }
}

#[async_trait]
impl ThreadSource for DiscordSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn list_threads(&self) -> Result<Vec<ThreadHandle>> {
        let guild_id = self.check().await?;
        let active = self.active_threads(&guild_id).await?;
        let archived = self.archived_threads().await?;

        // A thread can appear in both listings while it is being archived.
        let mut by_id: BTreeMap<String, ThreadHandle> = BTreeMap::new();
        for thread in active.into_iter().chain(archived) {
            let handle = thread.into_handle();
            by_id.entry(handle.id.clone()).or_insert(handle);
        }

        tracing::debug!(channel = %self.channel_id, threads = by_id.len(), "listed forum threads");
        Ok(by_id.into_values().collect())
    }

    async fn fetch_messages(&self, thread: &ThreadHandle) -> Result<Vec<String>> {
        let path = format!("/channels/{}/messages", thread.id);
        let mut messages: Vec<Message> = Vec::new();
        let mut before: Option<String> = None;

        loop {
            let mut query = vec![("limit", PAGE_LIMIT.to_string())];
            if let Some(id) = &before {
                query.push(("before", id.clone()));
            }
            let page: Vec<Message> = self
                .get_json(&path, &query)
                .await
                .with_context(|| format!("Failed to read messages of thread '{}'", thread.name))?;

            let short = page.len() < PAGE_LIMIT;
            before = page.last().map(|m| m.id.clone());
            messages.extend(page);
            if short || before.is_none() {
                break;
            }
        }

        // Newest first from the API.
        Ok(messages.into_iter().rev().map(|m| m.content).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_channel_into_handle() {
        let thread: ThreadChannel = serde_json::from_value(serde_json::json!({
            "id": "10",
            "name": "Law A",
            "parent_id": "1",
            "thread_metadata": { "archived": true, "archive_timestamp": "2024-01-01T00:00:00+00:00" }
        }))
        .unwrap();
        assert_eq!(
            thread.into_handle(),
            ThreadHandle {
                id: "10".into(),
                name: "Law A".into(),
                archived: true
            }
        );
    }

    #[test]
    fn test_thread_without_metadata_is_active() {
        let thread: ThreadChannel =
            serde_json::from_value(serde_json::json!({ "id": "11" })).unwrap();
        let handle = thread.into_handle();
        assert!(!handle.archived);
        assert_eq!(handle.name, "");
    }

    #[test]
    fn test_new_requires_channel() {
        let config = Config::default();
        assert!(DiscordSource::new(&config, "token").is_err());

        let mut config = Config::default();
        config.discord.channel_id = Some("42".into());
        let source = DiscordSource::new(&config, "token").unwrap();
        assert_eq!(source.name(), "discord:42");
    }
}
