//! Notion database record store.
//!
//! Each law is a page in a Notion database. The page title holds the law
//! name, a rich-text property holds the content (one rich-text item per
//! chunk), and an optional date property holds the passage date.
//!
//! Notion measures rich-text length in UTF-16 code units and accepts at most
//! 100 items per property. Chunks longer than 2000 units are split again on
//! character boundaries, and a record that would still need more than 100
//! items is refused before any request is sent.
//!
//! # Configuration
//!
//! ```toml
//! [notion]
//! database_id = "0123456789abcdef0123456789abcdef"
//! name_property = "Name"
//! content_property = "Content"
//! date_property = "Passage Date"
//! ```
//!
//! The integration token is read from `NOTION_TOKEN`.
//!
//! # Requests
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list | `POST /v1/databases/{id}/query`, paginated by `next_cursor` |
//! | create | `POST /v1/pages` |
//! | archive | `PATCH /v1/pages/{id}` with `{"archived": true}` |
//!
//! Requests are not retried. A rejected request surfaces as an error
//! carrying an [`ApiError`](crate::error::ApiError).

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::{Config, NotionConfig};
use crate::error::check_response;
use crate::models::{LawRecord, NewLawRecord};
use crate::traits::RecordStore;

const SERVICE: &str = "notion";
const PAGE_SIZE: u32 = 100;
/// Longest rich-text item Notion accepts, in UTF-16 code units.
pub const MAX_RICH_TEXT_UNITS: usize = 2000;
/// Most rich-text items Notion accepts in one property.
pub const MAX_RICH_TEXT_ITEMS: usize = 100;

/// [`RecordStore`] backed by a Notion database.
pub struct NotionStore {
    client: reqwest::Client,
    token: String,
    database_id: String,
    config: NotionConfig,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl NotionStore {
    /// Create a store for the configured database.
    ///
    /// # Errors
    ///
    /// Returns an error if `notion.database_id` is not set or the HTTP
    /// client cannot be built.
    pub fn new(config: &Config, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.sync.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
            database_id: config.database_id()?.to_string(),
            config: config.notion.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.config.version)
    }

    /// Build the create-page request body for a draft record.
    pub fn page_payload(&self, record: &NewLawRecord) -> Value {
        let rich_text: Vec<Value> = rich_text_blocks(&record.content_chunks)
            .iter()
            .map(|block| json!({ "text": { "content": block } }))
            .collect();

        let mut properties = serde_json::Map::new();
        properties.insert(
            self.config.name_property.clone(),
            json!({ "title": [ { "text": { "content": record.name } } ] }),
        );
        properties.insert(
            self.config.content_property.clone(),
            json!({ "rich_text": rich_text }),
        );
        if let (Some(property), Some(date)) = (self.config.date_property(), record.passage_date) {
            properties.insert(
                property.to_string(),
                json!({ "date": { "start": date.format("%Y-%m-%d").to_string() } }),
            );
        }

        json!({
            "parent": { "database_id": self.database_id },
            "properties": properties,
        })
    }

    /// Verify the database is reachable with the configured token.
    pub async fn check(&self) -> Result<()> {
        let response = self
            .request(Method::GET, &format!("/v1/databases/{}", self.database_id))
            .send()
            .await
            .context("Failed to reach Notion")?;
        check_response(SERVICE, response).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for NotionStore {
    async fn list_records(&self) -> Result<Vec<LawRecord>> {
        let path = format!("/v1/databases/{}/query", self.database_id);
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }

            let response = self
                .request(Method::POST, &path)
                .json(&body)
                .send()
                .await
                .context("Failed to query Notion database")?;
            let page: QueryResponse = check_response(SERVICE, response)
                .await?
                .json()
                .await
                .context("Invalid Notion query response")?;

            for result in &page.results {
                match parse_page(result, &self.config) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::warn!("skipping unreadable Notion page: {:#}", e),
                }
            }

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(records)
    }

    async fn create_record(&self, record: &NewLawRecord) -> Result<String> {
        let blocks = rich_text_blocks(&record.content_chunks).len();
        if blocks > MAX_RICH_TEXT_ITEMS {
            tracing::warn!(
                record = %record.name,
                blocks,
                "content exceeds the Notion rich-text item limit"
            );
            bail!(
                "Content of '{}' needs {} rich-text items, Notion accepts at most {}",
                record.name,
                blocks,
                MAX_RICH_TEXT_ITEMS
            );
        }

        let response = self
            .request(Method::POST, "/v1/pages")
            .json(&self.page_payload(record))
            .send()
            .await
            .with_context(|| format!("Failed to send create request for '{}'", record.name))?;
        let created: Value = check_response(SERVICE, response)
            .await
            .with_context(|| format!("Notion rejected record '{}'", record.name))?
            .json()
            .await
            .context("Invalid Notion create response")?;

        created
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid Notion create response: missing id"))
    }

    async fn archive_record(&self, id: &str) -> Result<()> {
        let response = self
            .request(Method::PATCH, &format!("/v1/pages/{}", id))
            .json(&json!({ "archived": true }))
            .send()
            .await
            .with_context(|| format!("Failed to send archive request for {}", id))?;
        check_response(SERVICE, response)
            .await
            .with_context(|| format!("Notion rejected archiving {}", id))?;
        Ok(())
    }
}

/// Re-split content chunks so no block exceeds [`MAX_RICH_TEXT_UNITS`]
/// UTF-16 code units. Concatenating the blocks gives back the chunks.
pub fn rich_text_blocks(chunks: &[String]) -> Vec<String> {
    let mut blocks = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if chunk.encode_utf16().count() <= MAX_RICH_TEXT_UNITS {
            blocks.push(chunk.clone());
            continue;
        }
        let mut current = String::new();
        let mut units = 0;
        for c in chunk.chars() {
            if units + c.len_utf16() > MAX_RICH_TEXT_UNITS {
                blocks.push(std::mem::take(&mut current));
                units = 0;
            }
            current.push(c);
            units += c.len_utf16();
        }
        if !current.is_empty() {
            blocks.push(current);
        }
    }
    blocks
}

/// Convert a Notion page object into a [`LawRecord`].
pub fn parse_page(page: &Value, config: &NotionConfig) -> Result<LawRecord> {
    let id = page
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("page without id"))?;
    let created = page
        .get("created_time")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("page {} without created_time", id))?;
    let created_time = DateTime::parse_from_rfc3339(created)
        .with_context(|| format!("page {} has invalid created_time '{}'", id, created))?
        .with_timezone(&Utc);

    let archived = page.get("archived").and_then(|v| v.as_bool()).unwrap_or(false)
        || page.get("in_trash").and_then(|v| v.as_bool()).unwrap_or(false);

    let properties = page.get("properties");
    let property = |name: &str| properties.and_then(|p| p.get(name));

    let name = property(&config.name_property)
        .and_then(|p| p.get("title"))
        .map(rich_text_items)
        .map(|items| items.concat())
        .unwrap_or_default();

    let content_chunks = property(&config.content_property)
        .and_then(|p| p.get("rich_text"))
        .map(rich_text_items)
        .unwrap_or_default();

    let passage_date = config
        .date_property()
        .and_then(property)
        .and_then(|p| p.get("date"))
        .and_then(|d| d.get("start"))
        .and_then(|s| s.as_str())
        .and_then(|s| NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d").ok());

    Ok(LawRecord {
        id: id.to_string(),
        name,
        content_chunks,
        passage_date,
        created_time,
        archived,
    })
}

/// Text of each rich-text item, preferring `plain_text`.
fn rich_text_items(items: &Value) -> Vec<String> {
    items
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|item| {
                    item.get("plain_text")
                        .and_then(|t| t.as_str())
                        .or_else(|| {
                            item.get("text")
                                .and_then(|t| t.get("content"))
                                .and_then(|t| t.as_str())
                        })
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}
