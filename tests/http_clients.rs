//! Request/response tests for the Discord and Notion clients against a
//! local mock server.

use chrono::NaiveDate;
use law_archive::check::check_collaborators;
use law_archive::config::{parse_config, Config};
use law_archive::connector_discord::DiscordSource;
use law_archive::error::is_access_error;
use law_archive::models::{NewLawRecord, ThreadHandle};
use law_archive::store::notion::NotionStore;
use law_archive::traits::{RecordStore, ThreadSource};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    parse_config(&format!(
        r#"
[discord]
channel_id = "100"
api_base = "{uri}/api/v10"

[notion]
database_id = "db1"
api_base = "{uri}"
"#,
        uri = server.uri()
    ))
    .unwrap()
}

// ─── Notion ─────────────────────────────────────────────────────────

fn notion_page(id: &str, name: &str, chunks: &[&str], date: Option<&str>, created: &str) -> Value {
    let rich_text: Vec<Value> = chunks
        .iter()
        .map(|c| json!({ "type": "text", "plain_text": c, "text": { "content": c } }))
        .collect();
    json!({
        "object": "page",
        "id": id,
        "created_time": created,
        "archived": false,
        "properties": {
            "Name": { "type": "title", "title": [ { "plain_text": name } ] },
            "Content": { "type": "rich_text", "rich_text": rich_text },
            "Passage Date": { "type": "date", "date": date.map(|d| json!({ "start": d })) }
        }
    })
}

#[tokio::test]
async fn test_notion_query_follows_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/databases/db1/query"))
        .and(body_partial_json(json!({ "start_cursor": "cursor-2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [notion_page("p2", "Law B", &["b"], None, "2024-01-02T00:00:00.000Z")],
            "has_more": false,
            "next_cursor": null
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/db1/query"))
        .and(header("Authorization", "Bearer secret"))
        .and(header("Notion-Version", "2022-06-28"))
        .and(body_json(json!({ "page_size": 100 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [notion_page(
                "p1",
                "Law A",
                &["first ", "second"],
                Some("2023-01-01"),
                "2024-01-01T00:00:00.000Z"
            )],
            "has_more": true,
            "next_cursor": "cursor-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = NotionStore::new(&config_for(&server), "secret").unwrap();
    let records = store.list_records().await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "p1");
    assert_eq!(records[0].name, "Law A");
    assert_eq!(records[0].content_chunks, vec!["first ", "second"]);
    assert_eq!(records[0].passage_date, NaiveDate::from_ymd_opt(2023, 1, 1));
    assert_eq!(records[1].name, "Law B");
    assert_eq!(records[1].passage_date, None);
}

#[tokio::test]
async fn test_notion_create_sends_properties() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/pages"))
        .and(body_partial_json(json!({
            "parent": { "database_id": "db1" },
            "properties": {
                "Name": { "title": [ { "text": { "content": "Law A" } } ] },
                "Content": { "rich_text": [
                    { "text": { "content": "part one" } },
                    { "text": { "content": "part two" } }
                ] },
                "Passage Date": { "date": { "start": "2024-03-04" } }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "new-page" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = NotionStore::new(&config_for(&server), "secret").unwrap();
    let id = store
        .create_record(&NewLawRecord {
            name: "Law A".to_string(),
            content_chunks: vec!["part one".to_string(), "part two".to_string()],
            passage_date: NaiveDate::from_ymd_opt(2024, 3, 4),
        })
        .await
        .unwrap();

    assert_eq!(id, "new-page");
}

#[tokio::test]
async fn test_notion_create_refuses_too_many_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "never" })))
        .expect(0)
        .mount(&server)
        .await;

    let store = NotionStore::new(&config_for(&server), "secret").unwrap();
    let err = store
        .create_record(&NewLawRecord {
            name: "Long Law".to_string(),
            content_chunks: vec!["x".to_string(); 101],
            passage_date: None,
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Long Law"), "{:#}", err);
    assert!(err.to_string().contains("101"), "{:#}", err);
}

#[tokio::test]
async fn test_notion_archive_patches_page() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/pages/p9"))
        .and(body_json(json!({ "archived": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "p9" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = NotionStore::new(&config_for(&server), "secret").unwrap();
    store.archive_record("p9").await.unwrap();
}

#[tokio::test]
async fn test_notion_forbidden_is_access_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/db1/query"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "object": "error",
            "code": "restricted_resource"
        })))
        .mount(&server)
        .await;

    let store = NotionStore::new(&config_for(&server), "secret").unwrap();
    let err = store.list_records().await.unwrap_err();
    assert!(is_access_error(&err));
}

#[tokio::test]
async fn test_notion_server_error_is_not_access_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/pages"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let store = NotionStore::new(&config_for(&server), "secret").unwrap();
    let err = store
        .create_record(&NewLawRecord {
            name: "Law A".to_string(),
            content_chunks: vec!["x".to_string()],
            passage_date: None,
        })
        .await
        .unwrap_err();
    assert!(!is_access_error(&err));
    assert!(format!("{:#}", err).contains("Law A"));
}

// ─── Discord ────────────────────────────────────────────────────────

async fn mount_forum_channel(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v10/channels/100"))
        .and(header("Authorization", "Bot tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "100",
            "type": 15,
            "guild_id": "7"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_discord_lists_active_and_archived_threads() {
    let server = MockServer::start().await;
    mount_forum_channel(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v10/guilds/7/threads/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "threads": [
                { "id": "1", "name": "Law A", "parent_id": "100" },
                { "id": "9", "name": "Elsewhere", "parent_id": "200" },
                { "id": "2", "name": "Law B", "parent_id": "100" }
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v10/channels/100/threads/archived/public"))
        .and(query_param("before", "2024-02-01T00:00:00+00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "threads": [{
                "id": "3",
                "name": "Law C",
                "parent_id": "100",
                "thread_metadata": { "archived": true, "archive_timestamp": "2024-01-01T00:00:00+00:00" }
            }],
            "has_more": false
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v10/channels/100/threads/archived/public"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "threads": [{
                "id": "2",
                "name": "Law B",
                "parent_id": "100",
                "thread_metadata": { "archived": true, "archive_timestamp": "2024-02-01T00:00:00+00:00" }
            }],
            "has_more": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = DiscordSource::new(&config_for(&server), "tok").unwrap();
    let threads = source.list_threads().await.unwrap();

    let ids: Vec<&str> = threads.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(threads[2].name, "Law C");
    assert!(threads[2].archived);
    assert_eq!(source.name(), "discord:100");
}

#[tokio::test]
async fn test_discord_rejects_non_forum_channel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v10/channels/100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "100",
            "type": 0,
            "guild_id": "7"
        })))
        .mount(&server)
        .await;

    let source = DiscordSource::new(&config_for(&server), "tok").unwrap();
    let err = source.list_threads().await.unwrap_err();

    assert!(is_access_error(&err));
    assert!(err.to_string().contains("not a forum channel"));
}

#[tokio::test]
async fn test_discord_unauthorized_is_access_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v10/channels/100"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let source = DiscordSource::new(&config_for(&server), "bad").unwrap();
    assert!(is_access_error(&source.check().await.unwrap_err()));
}

#[tokio::test]
async fn test_discord_messages_paginate_oldest_first() {
    let server = MockServer::start().await;

    // Newest first, as Discord returns them: ids 102 down to 3.
    let first_page: Vec<Value> = (3..=102)
        .rev()
        .map(|i| json!({ "id": i.to_string(), "content": format!("m{}", i) }))
        .collect();
    let second_page = json!([
        { "id": "2", "content": "m2" },
        { "id": "1", "content": "m1" }
    ]);

    Mock::given(method("GET"))
        .and(path("/api/v10/channels/55/messages"))
        .and(query_param("before", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(second_page))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v10/channels/55/messages"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(first_page))
        .expect(1)
        .mount(&server)
        .await;

    let source = DiscordSource::new(&config_for(&server), "tok").unwrap();
    let thread = ThreadHandle {
        id: "55".to_string(),
        name: "Law A".to_string(),
        archived: false,
    };
    let messages = source.fetch_messages(&thread).await.unwrap();

    assert_eq!(messages.len(), 102);
    assert_eq!(messages[0], "m1");
    assert_eq!(messages[1], "m2");
    assert_eq!(messages[101], "m102");
}

// ─── check ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_check_reports_each_target() {
    let server = MockServer::start().await;
    mount_forum_channel(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/databases/db1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("database not shared"))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let source = DiscordSource::new(&config, "tok").unwrap();
    let store = NotionStore::new(&config, "secret").unwrap();
    let results = check_collaborators(&source, &store).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].target, "discord");
    assert!(results[0].healthy);
    assert!(results[0].detail.contains("guild 7"));
    assert_eq!(results[1].target, "notion");
    assert!(!results[1].healthy);
    assert!(results[1].detail.contains("database not shared"));
}
