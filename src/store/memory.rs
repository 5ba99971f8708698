//! In-memory [`RecordStore`] implementation for testing.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Ids are random
//! UUIDs and creation timestamps come from a monotonic counter, so records
//! created later always sort after earlier ones. Every create and archive
//! call is logged, and individual calls can be made to fail.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::models::{LawRecord, NewLawRecord};
use crate::traits::RecordStore;

/// Base of the synthetic creation clock (2024-01-01T00:00:00Z).
const CLOCK_EPOCH: i64 = 1_704_067_200;

/// In-memory record store for tests.
pub struct InMemoryRecordStore {
    records: RwLock<Vec<LawRecord>>,
    creates: RwLock<Vec<NewLawRecord>>,
    archives: RwLock<Vec<String>>,
    failing_creates: RwLock<HashSet<String>>,
    failing_archives: RwLock<HashSet<String>>,
    fail_listing: AtomicBool,
    clock: AtomicI64,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            creates: RwLock::new(Vec::new()),
            archives: RwLock::new(Vec::new()),
            failing_creates: RwLock::new(HashSet::new()),
            failing_archives: RwLock::new(HashSet::new()),
            fail_listing: AtomicBool::new(false),
            clock: AtomicI64::new(0),
        }
    }

    /// Seed the store with existing records, kept as given.
    pub fn with_records(records: Vec<LawRecord>) -> Self {
        let store = Self::new();
        *write(&store.records) = records;
        store
    }

    /// Insert an active record directly, bypassing the call log.
    pub fn insert(&self, name: &str, chunks: &[&str]) -> String {
        let record = LawRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            content_chunks: chunks.iter().map(|c| c.to_string()).collect(),
            passage_date: None,
            created_time: self.tick(),
            archived: false,
        };
        let id = record.id.clone();
        write(&self.records).push(record);
        id
    }

    pub fn get(&self, id: &str) -> Option<LawRecord> {
        read(&self.records).iter().find(|r| r.id == id).cloned()
    }

    pub fn records(&self) -> Vec<LawRecord> {
        read(&self.records).clone()
    }

    /// Active records with the given name, oldest first.
    pub fn active_named(&self, name: &str) -> Vec<LawRecord> {
        let mut found: Vec<LawRecord> = read(&self.records)
            .iter()
            .filter(|r| !r.archived && r.name == name)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.created_time);
        found
    }

    /// Every create request received, including rejected ones.
    pub fn create_calls(&self) -> Vec<NewLawRecord> {
        read(&self.creates).clone()
    }

    /// Every archive request received, including rejected ones.
    pub fn archive_calls(&self) -> Vec<String> {
        read(&self.archives).clone()
    }

    /// Reject create requests for records with this name.
    pub fn fail_creates_for(&self, name: &str) {
        write(&self.failing_creates).insert(name.to_string());
    }

    /// Reject archive requests for this record id.
    pub fn fail_archives_for(&self, id: &str) {
        write(&self.failing_archives).insert(id.to_string());
    }

    /// Make [`RecordStore::list_records`] fail.
    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    fn tick(&self) -> DateTime<Utc> {
        let n = self.clock.fetch_add(1, Ordering::SeqCst);
        Utc.timestamp_opt(CLOCK_EPOCH + n, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_records(&self) -> Result<Vec<LawRecord>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            bail!("record listing unavailable");
        }
        Ok(self.records())
    }

    async fn create_record(&self, record: &NewLawRecord) -> Result<String> {
        write(&self.creates).push(record.clone());
        if read(&self.failing_creates).contains(&record.name) {
            bail!("create rejected for '{}'", record.name);
        }
        let stored = LawRecord {
            id: Uuid::new_v4().to_string(),
            name: record.name.clone(),
            content_chunks: record.content_chunks.clone(),
            passage_date: record.passage_date,
            created_time: self.tick(),
            archived: false,
        };
        let id = stored.id.clone();
        write(&self.records).push(stored);
        Ok(id)
    }

    async fn archive_record(&self, id: &str) -> Result<()> {
        write(&self.archives).push(id.to_string());
        if read(&self.failing_archives).contains(id) {
            bail!("archive rejected for '{}'", id);
        }
        let mut records = write(&self.records);
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.archived = true;
                Ok(())
            }
            None => bail!("record not found: {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_list() {
        let store = InMemoryRecordStore::new();
        let id = store
            .create_record(&NewLawRecord {
                name: "Law A".into(),
                content_chunks: vec!["text".into()],
                passage_date: None,
            })
            .await
            .unwrap();

        let records = store.list_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert!(!records[0].archived);
        assert_eq!(store.create_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_archive_is_idempotent() {
        let store = InMemoryRecordStore::new();
        let id = store.insert("Law A", &["text"]);
        store.archive_record(&id).await.unwrap();
        store.archive_record(&id).await.unwrap();
        assert!(store.get(&id).unwrap().archived);
        assert_eq!(store.archive_calls(), vec![id.clone(), id]);
    }

    #[test]
    fn test_creation_clock_is_monotonic() {
        let store = InMemoryRecordStore::new();
        let first = store.insert("Law A", &[]);
        let second = store.insert("Law A", &[]);
        assert!(store.get(&first).unwrap().created_time < store.get(&second).unwrap().created_time);
        assert_eq!(store.active_named("Law A")[0].id, first);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryRecordStore::new();
        store.fail_creates_for("Law B");
        store.fail_listing();

        let err = store
            .create_record(&NewLawRecord {
                name: "Law B".into(),
                content_chunks: vec![],
                passage_date: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Law B"));
        assert!(store.list_records().await.is_err());
        assert!(store.records().is_empty());
    }
}
