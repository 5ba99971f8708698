//! Duplicate resolution.
//!
//! Archives the records that lost duplicate resolution in
//! [`build_index`](crate::index::build_index). Every archive request is
//! independent: a failure is logged and counted, and the remaining
//! requests still run. A duplicate left active is picked up again on the
//! next sync.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::index::SupersededRecord;
use crate::models::ArchiveReport;
use crate::traits::RecordStore;

/// Archive every superseded record, at most `concurrency` at a time.
pub async fn archive_superseded(
    store: Arc<dyn RecordStore>,
    superseded: &[SupersededRecord],
    concurrency: usize,
) -> ArchiveReport {
    let concurrency = concurrency.max(1);
    let mut report = ArchiveReport::default();
    let mut tasks = JoinSet::new();

    for record in superseded.iter().cloned() {
        while tasks.len() >= concurrency {
            collect_next(&mut tasks, &mut report).await;
        }
        let store = store.clone();
        tasks.spawn(async move {
            match store.archive_record(&record.id).await {
                Ok(()) => {
                    tracing::info!(name = %record.name, id = %record.id, "archived duplicate record");
                    true
                }
                Err(e) => {
                    tracing::error!(
                        name = %record.name,
                        id = %record.id,
                        "failed to archive duplicate record: {:#}",
                        e
                    );
                    false
                }
            }
        });
    }
    while !tasks.is_empty() {
        collect_next(&mut tasks, &mut report).await;
    }

    report
}

async fn collect_next(tasks: &mut JoinSet<bool>, report: &mut ArchiveReport) {
    match tasks.join_next().await {
        Some(Ok(true)) => report.archived += 1,
        Some(Ok(false)) => report.failed += 1,
        Some(Err(e)) => {
            tracing::error!("archive task failed: {}", e);
            report.failed += 1;
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryRecordStore;

    fn superseded(id: &str) -> SupersededRecord {
        SupersededRecord {
            id: id.to_string(),
            name: "Law A".to_string(),
        }
    }

    #[tokio::test]
    async fn test_archives_every_id() {
        let store = Arc::new(InMemoryRecordStore::new());
        let r1 = store.insert("Law A", &["one"]);
        let r2 = store.insert("Law A", &["two"]);

        let report = archive_superseded(store.clone(), &[superseded(&r1), superseded(&r2)], 2).await;

        assert_eq!(report, ArchiveReport { archived: 2, failed: 0 });
        assert!(store.get(&r1).unwrap().archived);
        assert!(store.get(&r2).unwrap().archived);
    }

    #[tokio::test]
    async fn test_failure_does_not_block_others() {
        let store = Arc::new(InMemoryRecordStore::new());
        let r1 = store.insert("Law A", &["one"]);
        let r2 = store.insert("Law A", &["two"]);
        store.fail_archives_for(&r1);

        let report = archive_superseded(store.clone(), &[superseded(&r1), superseded(&r2)], 1).await;

        assert_eq!(report, ArchiveReport { archived: 1, failed: 1 });
        assert!(!store.get(&r1).unwrap().archived);
        assert!(store.get(&r2).unwrap().archived);
    }

    #[tokio::test]
    async fn test_nothing_to_archive() {
        let store = Arc::new(InMemoryRecordStore::new());
        let report = archive_superseded(store.clone(), &[], 4).await;
        assert_eq!(report, ArchiveReport::default());
        assert!(store.archive_calls().is_empty());
    }
}
