//! Existing record index.
//!
//! Built fresh at the start of every sync from the full record listing.
//! Archived records are ignored. Active records are grouped by name; in a
//! group with more than one record the oldest (by `created_time`, then by
//! `id`) is canonical and the rest are superseded. The result does not
//! depend on the order the store returned the records in.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};

use crate::models::LawRecord;
use crate::traits::RecordStore;

/// A record that lost duplicate resolution and should be archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupersededRecord {
    pub id: String,
    pub name: String,
}

/// Point-in-time view of the active records, one per name.
#[derive(Debug, Default)]
pub struct RecordIndex {
    canonical: HashMap<String, LawRecord>,
    superseded: Vec<SupersededRecord>,
}

impl RecordIndex {
    pub fn contains(&self, name: &str) -> bool {
        self.canonical.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&LawRecord> {
        self.canonical.get(name)
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    /// Records slated for archiving, ordered by name then age.
    pub fn superseded(&self) -> &[SupersededRecord] {
        &self.superseded
    }

    /// Canonical records sorted by name.
    pub fn records(&self) -> Vec<&LawRecord> {
        let mut records: Vec<&LawRecord> = self.canonical.values().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }
}

/// Group records by name and resolve duplicates deterministically.
pub fn build_index(records: Vec<LawRecord>) -> RecordIndex {
    let mut groups: BTreeMap<String, Vec<LawRecord>> = BTreeMap::new();
    for record in records.into_iter().filter(|r| !r.archived) {
        groups.entry(record.name.clone()).or_default().push(record);
    }

    let mut index = RecordIndex::default();
    for (name, mut group) in groups {
        group.sort_by(|a, b| {
            a.created_time
                .cmp(&b.created_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        let mut group = group.into_iter();
        let Some(canonical) = group.next() else {
            continue;
        };
        for loser in group {
            tracing::debug!(
                name = %name,
                kept = %canonical.id,
                superseded = %loser.id,
                "duplicate record"
            );
            index.superseded.push(SupersededRecord {
                id: loser.id,
                name: name.clone(),
            });
        }
        index.canonical.insert(name, canonical);
    }
    index
}

/// List all records from the store and build the index. Performs no writes.
pub async fn load_index(store: &dyn RecordStore) -> Result<RecordIndex> {
    let records = store
        .list_records()
        .await
        .context("Failed to list existing records")?;
    let total = records.len();
    let index = build_index(records);
    tracing::debug!(
        total,
        active = index.len(),
        superseded = index.superseded().len(),
        "record index built"
    );
    Ok(index)
}
