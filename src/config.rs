use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::chunk::MAX_CHUNK_CHARS;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    /// Forum channel whose threads are archived. `DISCORD_CHANNEL_ID` overrides.
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default = "default_discord_api_base")]
    pub api_base: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            channel_id: None,
            api_base: default_discord_api_base(),
        }
    }
}

fn default_discord_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotionConfig {
    /// Target database. `NOTION_DATABASE_ID` overrides.
    #[serde(default)]
    pub database_id: Option<String>,
    #[serde(default = "default_notion_api_base")]
    pub api_base: String,
    #[serde(default = "default_notion_version")]
    pub version: String,
    #[serde(default = "default_name_property")]
    pub name_property: String,
    #[serde(default = "default_content_property")]
    pub content_property: String,
    /// Date property for the passage date. An empty string disables it.
    #[serde(default = "default_date_property")]
    pub date_property: Option<String>,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            database_id: None,
            api_base: default_notion_api_base(),
            version: default_notion_version(),
            name_property: default_name_property(),
            content_property: default_content_property(),
            date_property: default_date_property(),
        }
    }
}

impl NotionConfig {
    /// The date property to write, if enabled.
    pub fn date_property(&self) -> Option<&str> {
        self.date_property
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

fn default_notion_api_base() -> String {
    "https://api.notion.com".to_string()
}
fn default_notion_version() -> String {
    "2022-06-28".to_string()
}
fn default_name_property() -> String {
    "Name".to_string()
}
fn default_content_property() -> String {
    "Content".to_string()
}
fn default_date_property() -> Option<String> {
    Some("Passage Date".to_string())
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_chunk_chars: default_max_chunk_chars(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}
fn default_max_chunk_chars() -> usize {
    MAX_CHUNK_CHARS
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// The configured forum channel id.
    pub fn channel_id(&self) -> Result<&str> {
        self.discord.channel_id.as_deref().ok_or_else(|| {
            anyhow::anyhow!("discord.channel_id is not set (config file or DISCORD_CHANNEL_ID)")
        })
    }

    /// The configured Notion database id.
    pub fn database_id(&self) -> Result<&str> {
        self.notion.database_id.as_deref().ok_or_else(|| {
            anyhow::anyhow!("notion.database_id is not set (config file or NOTION_DATABASE_ID)")
        })
    }

    /// Apply `DISCORD_CHANNEL_ID` / `NOTION_DATABASE_ID` from the environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("DISCORD_CHANNEL_ID").ok(),
            std::env::var("NOTION_DATABASE_ID").ok(),
        );
    }

    fn apply_overrides(&mut self, channel_id: Option<String>, database_id: Option<String>) {
        if let Some(id) = channel_id.filter(|s| !s.trim().is_empty()) {
            self.discord.channel_id = Some(id.trim().to_string());
        }
        if let Some(id) = database_id.filter(|s| !s.trim().is_empty()) {
            self.notion.database_id = Some(id.trim().to_string());
        }
    }

    /// Check invariants that do not depend on which command runs.
    pub fn validate(&self) -> Result<()> {
        if self.sync.concurrency == 0 {
            bail!("sync.concurrency must be >= 1");
        }
        if self.sync.max_chunk_chars == 0 || self.sync.max_chunk_chars > MAX_CHUNK_CHARS {
            bail!("sync.max_chunk_chars must be in [1, {}]", MAX_CHUNK_CHARS);
        }
        if self.sync.timeout_secs == 0 {
            bail!("sync.timeout_secs must be > 0");
        }
        if let Some(id) = &self.discord.channel_id {
            if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
                bail!("discord.channel_id must be a numeric snowflake, got '{}'", id);
            }
        }
        if let Some(id) = &self.notion.database_id {
            if id.trim().is_empty() {
                bail!("notion.database_id must not be empty");
            }
        }
        if self.notion.name_property.trim().is_empty() {
            bail!("notion.name_property must not be empty");
        }
        if self.notion.content_property.trim().is_empty() {
            bail!("notion.content_property must not be empty");
        }
        Ok(())
    }
}

/// API tokens, read from the environment only.
#[derive(Clone)]
pub struct Credentials {
    pub discord_token: String,
    pub notion_token: String,
}

impl Credentials {
    /// Both tokens, for commands that talk to Discord and Notion.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            discord_token: require_env("DISCORD_TOKEN")?,
            notion_token: notion_token_from_env()?,
        })
    }
}

/// The Notion token alone, for commands that never read Discord.
pub fn notion_token_from_env() -> Result<String> {
    require_env("NOTION_TOKEN")
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("discord_token", &"<redacted>")
            .field("notion_token", &"<redacted>")
            .finish()
    }
}

fn require_env(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => bail!("{} environment variable not set", key),
    }
}

/// Parse and validate a TOML config string (no environment overrides).
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from an optional TOML file, then apply environment
/// overrides and validate.
///
/// Without a file, defaults are used and the channel and database ids must
/// come from the environment.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse config file")?
        }
        None => Config::default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.sync.concurrency, 4);
        assert_eq!(config.sync.max_chunk_chars, 2000);
        assert_eq!(config.notion.name_property, "Name");
        assert_eq!(config.notion.content_property, "Content");
        assert_eq!(config.notion.date_property.as_deref(), Some("Passage Date"));
        assert_eq!(config.notion.version, "2022-06-28");
        assert_eq!(config.discord.api_base, "https://discord.com/api/v10");
        assert!(config.channel_id().is_err());
        assert!(config.database_id().is_err());
    }

    #[test]
    fn test_full_config() {
        let config = parse_config(
            r#"
[discord]
channel_id = "123456789"

[notion]
database_id = "abc123"
name_property = "Title"

[sync]
concurrency = 2
max_chunk_chars = 500

[server]
bind = "0.0.0.0:9000"
"#,
        )
        .unwrap();
        assert_eq!(config.channel_id().unwrap(), "123456789");
        assert_eq!(config.database_id().unwrap(), "abc123");
        assert_eq!(config.notion.name_property, "Title");
        assert_eq!(config.sync.concurrency, 2);
        assert_eq!(config.sync.max_chunk_chars, 500);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(parse_config("[sync]\nconcurrency = 0").is_err());
        assert!(parse_config("[sync]\nmax_chunk_chars = 0").is_err());
        assert!(parse_config("[sync]\nmax_chunk_chars = 2001").is_err());
        assert!(parse_config("[sync]\ntimeout_secs = 0").is_err());
        assert!(parse_config("[discord]\nchannel_id = \"general\"").is_err());
        assert!(parse_config("[notion]\ndatabase_id = \" \"").is_err());
        assert!(parse_config("[notion]\ncontent_property = \"\"").is_err());
        assert!(parse_config("[sync\nconcurrency = 1").is_err());
    }

    #[test]
    fn test_empty_date_property_disables_dates() {
        let config = parse_config("[notion]\ndate_property = \"\"").unwrap();
        assert_eq!(config.notion.date_property(), None);
        let config = parse_config("").unwrap();
        assert_eq!(config.notion.date_property(), Some("Passage Date"));
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = parse_config("[discord]\nchannel_id = \"1\"").unwrap();
        config.apply_overrides(Some(" 42 ".to_string()), Some("db".to_string()));
        assert_eq!(config.channel_id().unwrap(), "42");
        assert_eq!(config.database_id().unwrap(), "db");

        config.apply_overrides(Some(String::new()), None);
        assert_eq!(config.channel_id().unwrap(), "42");
    }

    #[test]
    fn test_example_config_parses() {
        let config = parse_config(include_str!("../lawsync.example.toml")).unwrap();
        assert_eq!(config.channel_id().unwrap(), "123456789012345678");
        assert_eq!(config.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/lawsync.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
