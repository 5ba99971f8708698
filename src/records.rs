//! `lawsync records`: list what the database currently holds.
//!
//! Shows one row per canonical record (the one a sync would keep) and how
//! many active duplicates share its name.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::index::{load_index, RecordIndex};
use crate::traits::RecordStore;

/// One canonical record and its pending duplicates.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecordRow {
    pub name: String,
    pub id: String,
    pub chunks: usize,
    pub passage_date: Option<NaiveDate>,
    pub created_time: DateTime<Utc>,
    pub duplicates: usize,
}

/// Rows sorted by name.
pub fn record_rows(index: &RecordIndex) -> Vec<RecordRow> {
    let mut duplicates: HashMap<&str, usize> = HashMap::new();
    for record in index.superseded() {
        *duplicates.entry(record.name.as_str()).or_default() += 1;
    }

    index
        .records()
        .into_iter()
        .map(|record| RecordRow {
            name: record.name.clone(),
            id: record.id.clone(),
            chunks: record.content_chunks.len(),
            passage_date: record.passage_date,
            created_time: record.created_time,
            duplicates: duplicates.get(record.name.as_str()).copied().unwrap_or(0),
        })
        .collect()
}

pub async fn run_records(store: &dyn RecordStore, json: bool) -> Result<()> {
    let index = load_index(store).await?;
    let rows = record_rows(&index);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:<40} {:<12} {:>6} {:>5}  CREATED",
        "NAME", "PASSED", "CHUNKS", "DUPS"
    );
    for row in &rows {
        let passed = row
            .passage_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<40} {:<12} {:>6} {:>5}  {}",
            truncate(&row.name, 40),
            passed,
            row.chunks,
            row.duplicates,
            row.created_time.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    println!(
        "{} records, {} duplicates pending archive",
        rows.len(),
        index.superseded().len()
    );
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
