//! Statistics and run summaries
//!
//! This module provides functionality for extracting statistics from the
//! document store and displaying them, along with the summary of a
//! finished collection run.

use crate::output::traits::CollectionSummary;
use crate::storage::{DocumentStore, RunRecord, StorageResult};

/// Store statistics for one collection
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Collection the counts refer to
    pub collection: String,

    /// Number of stored product documents
    pub product_count: u64,

    /// The requested run, or the most recent one
    pub run: Option<RunRecord>,
}

/// Loads statistics from the store
///
/// # Arguments
///
/// * `store` - The document store to query
/// * `collection` - Collection to count
/// * `run_id` - Run to report on; the most recent run when `None`
pub fn load_statistics(
    store: &dyn DocumentStore,
    collection: &str,
    run_id: Option<i64>,
) -> StorageResult<StoreStatistics> {
    let run = match run_id {
        Some(id) => Some(store.get_run(id)?),
        None => store.get_latest_run()?,
    };

    Ok(StoreStatistics {
        collection: collection.to_string(),
        product_count: store.count_products(collection)?,
        run,
    })
}

/// Renders store statistics as the text printed by `stats`
pub fn format_statistics(stats: &StoreStatistics) -> String {
    let mut lines = vec![
        "=== Store Statistics ===\n".to_string(),
        format!("Collection: {}", stats.collection),
        format!("  Products stored: {}", stats.product_count),
        String::new(),
    ];

    match &stats.run {
        Some(run) => {
            lines.push(format!("Run #{}:", run.id));
            lines.push(format!("  Status: {}", run.status.to_db_string()));
            lines.push(format!("  Started: {}", run.started_at));
            if let Some(finished) = &run.finished_at {
                lines.push(format!("  Finished: {}", finished));
            }
            lines.extend(
                run.categories
                    .iter()
                    .map(|category| format!("  Category: {}", category)),
            );
            lines.push(format!("  Succeeded: {}", run.succeeded));
            lines.push(format!("  Skipped: {}", run.skipped));
            lines.push(format!("  Config hash: {}", run.config_hash));
        }
        None => lines.push("No runs recorded".to_string()),
    }

    lines.join("\n")
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &StoreStatistics) {
    println!("{}", format_statistics(stats));
}

/// Renders the end-of-run summary printed by `collect`
pub fn format_summary(summary: &CollectionSummary) -> String {
    [
        "=== Collection Summary ===\n".to_string(),
        format!("Run #{} ({})", summary.run_id, summary.status),
        format!(
            "  Categories: {} ({} failed)",
            summary.categories, summary.categories_failed
        ),
        format!(
            "  Subcategories: {} ({} failed)",
            summary.subcategories, summary.subcategories_failed
        ),
        format!("  Links seen: {}", summary.links_seen),
        format!("  Duplicates: {}", summary.duplicates),
        format!(
            "  Succeeded: {} ({} new, {} updated)",
            summary.succeeded, summary.inserted, summary.updated
        ),
        format!("  Skipped: {}", summary.skipped),
        String::new(),
        format!(
            "Success Rate: {:.1}% ({} / {} links extracted)",
            summary.success_rate(),
            summary.succeeded,
            summary.attempted()
        ),
    ]
    .join("\n")
}

/// Prints the end-of-run summary to stdout
pub fn print_summary(summary: &CollectionSummary) {
    println!("{}", format_summary(summary));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::ProductRecord;
    use crate::storage::{RunStatus, SqliteStore};
    use chrono::Utc;

    #[test]
    fn test_load_statistics_empty_store() {
        let store = SqliteStore::new_in_memory().unwrap();
        let stats = load_statistics(&store, "products", None).unwrap();

        assert_eq!(stats.product_count, 0);
        assert!(stats.run.is_none());
        assert!(format_statistics(&stats).contains("No runs recorded"));
    }

    #[test]
    fn test_load_statistics_with_run() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let record = ProductRecord::new(
            "a1".to_string(),
            "Кирпич".to_string(),
            "https://example.com/p/a1".to_string(),
            Utc::now(),
        );
        store.upsert_product("products", &record).unwrap();
        let run_id = store
            .create_run("abc", &["https://example.com/price/11".to_string()])
            .unwrap();
        store.finish_run(run_id, RunStatus::Completed, 1, 0).unwrap();

        let stats = load_statistics(&store, "products", None).unwrap();
        assert_eq!(stats.product_count, 1);

        let text = format_statistics(&stats);
        assert!(text.contains("Products stored: 1"));
        assert!(text.contains("Status: completed"));
        assert!(text.contains("https://example.com/price/11"));
    }

    #[test]
    fn test_load_statistics_for_older_run() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let first = store.create_run("abc", &[]).unwrap();
        store.finish_run(first, RunStatus::Failed, 0, 2).unwrap();
        let second = store.create_run("abc", &[]).unwrap();
        store.finish_run(second, RunStatus::Completed, 5, 0).unwrap();

        let latest = load_statistics(&store, "products", None).unwrap();
        assert_eq!(latest.run.unwrap().id, second);

        let older = load_statistics(&store, "products", Some(first)).unwrap();
        let text = format_statistics(&older);
        assert!(text.contains(&format!("Run #{}:", first)));
        assert!(text.contains("Status: failed"));
        assert!(text.contains("Skipped: 2"));
    }

    #[test]
    fn test_unknown_run_is_an_error() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert!(load_statistics(&store, "products", Some(42)).is_err());
    }

    #[test]
    fn test_format_summary() {
        let mut summary = CollectionSummary::new(3, RunStatus::Completed);
        summary.succeeded = 4;
        summary.skipped = 1;
        summary.inserted = 4;

        let text = format_summary(&summary);
        assert!(text.contains("Run #3 (completed)"));
        assert!(text.contains("Succeeded: 4 (4 new, 0 updated)"));
        assert!(text.contains("80.0%"));
    }
}
