use crate::store::{RecordStore, StoreError, TodoRecord};
use futures::future::join_all;
use tracing::{error, info, instrument};

/// Fixed seed set loaded by a reset
const SEEDS: [(&str, &str, bool); 6] = [
    ("ed0bcc48-bbbe-5f06-c7c9-2ccb0456ceba", "Wake Up.", true),
    (
        "42582304-3c6e-311e-7f88-7e3791caf88c",
        "Grab a brush and put a little makeup.",
        true,
    ),
    (
        "036af7f9-1181-fb8f-258f-3f06034c020f",
        "Write a blog post.",
        false,
    ),
    (
        "1cf63885-5f75-8deb-19dc-9b6765deae6c",
        "Create a demo repository.",
        false,
    ),
    ("63a871b2-0b6f-4427-9c35-304bc680a4b7", "??????", false),
    ("63a871b2-0b6f-4422-9c35-304bc680a4b7", "Profit.", false),
];

/// The seed records inserted by [`run`]
pub fn seed_todos() -> Vec<TodoRecord> {
    SEEDS
        .iter()
        .map(|(id, title, completed)| TodoRecord {
            id: (*id).to_string(),
            title: (*title).to_string(),
            completed: *completed,
        })
        .collect()
}

/// Per-phase outcome of a reset
///
/// Deletes and inserts are best-effort: individual failures are counted
/// here rather than rolled back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetReport {
    /// Records deleted in the clear phase
    pub deleted: usize,
    /// Seed records inserted
    pub inserted: usize,
    /// Deletes that failed
    pub failed_deletes: usize,
    /// Inserts that failed
    pub failed_inserts: usize,
}

/// Clear the store and reload the seed set.
///
/// Scans the whole table, fires all deletes concurrently, then fires all
/// seed inserts concurrently. A scan failure aborts before any write. An
/// individual delete or insert failure is logged and counted but does not
/// halt the rest of the batch.
#[instrument(skip(store))]
pub async fn run(store: &dyn RecordStore) -> Result<ResetReport, StoreError> {
    info!("Resetting record store");

    let existing = store.scan().await?;
    let mut report = ResetReport::default();

    info!(count = existing.len(), "Deleting records");
    let results = join_all(existing.iter().map(|record| store.delete(&record.id))).await;
    for (record, result) in existing.iter().zip(results) {
        match result {
            Ok(()) => report.deleted += 1,
            Err(e) => {
                error!(error = %e, id = %record.id, "Failed to delete record");
                report.failed_deletes += 1;
            }
        }
    }
    info!(count = report.deleted, "Deleted records");

    let seeds = seed_todos();
    info!(count = seeds.len(), "Adding seed records");
    let results = join_all(seeds.iter().map(|record| store.put(record))).await;
    for (record, result) in seeds.iter().zip(results) {
        match result {
            Ok(()) => report.inserted += 1,
            Err(e) => {
                error!(error = %e, id = %record.id, "Failed to add seed record");
                report.failed_inserts += 1;
            }
        }
    }

    metrics::counter!("todo.reset.completed").increment(1);
    if report.failed_deletes > 0 || report.failed_inserts > 0 {
        metrics::counter!("todo.reset.partial").increment(1);
    }

    info!(
        deleted = report.deleted,
        inserted = report.inserted,
        failed_deletes = report.failed_deletes,
        failed_inserts = report.failed_inserts,
        "Reset finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashSet;

    #[test]
    fn test_seed_set_has_six_unique_ids() {
        let seeds = seed_todos();
        assert_eq!(seeds.len(), 6);

        let ids: HashSet<_> = seeds.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn test_seed_completion_flags() {
        let seeds = seed_todos();
        assert_eq!(seeds.iter().filter(|s| s.completed).count(), 2);
        assert_eq!(seeds[0].title, "Wake Up.");
        assert_eq!(seeds[5].title, "Profit.");
    }

    #[tokio::test]
    async fn test_reset_replaces_existing_records() {
        let store = MemoryStore::new();
        store
            .put(&TodoRecord {
                id: "stale".to_string(),
                title: "Old item".to_string(),
                completed: false,
            })
            .await
            .unwrap();

        let report = run(&store).await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.inserted, 6);
        assert_eq!(report.failed_deletes, 0);
        assert_eq!(report.failed_inserts, 0);

        let mut all = store.scan().await.unwrap();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        let mut expected = seed_todos();
        expected.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(all, expected);
    }

    #[tokio::test]
    async fn test_reset_on_empty_store() {
        let store = MemoryStore::new();
        let report = run(&store).await.unwrap();

        assert_eq!(report.deleted, 0);
        assert_eq!(report.inserted, 6);
        assert_eq!(store.len().await, 6);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let store = MemoryStore::new();
        run(&store).await.unwrap();
        let report = run(&store).await.unwrap();

        assert_eq!(report.deleted, 6);
        assert_eq!(report.inserted, 6);
        assert_eq!(store.len().await, 6);
    }
}
