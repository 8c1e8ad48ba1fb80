//! Output module for persisting records and reporting runs
//!
//! This module handles:
//! - The record sink used by the collection orchestrator
//! - Line-delimited JSON output and JSON array export
//! - Store statistics and run summaries

mod jsonl;
mod sink;
pub mod stats;
mod traits;

pub use jsonl::JsonlWriter;
pub use sink::Sink;
pub use stats::{format_summary, load_statistics, print_statistics, print_summary, StoreStatistics};
pub use traits::{CollectionSummary, OutputError, OutputResult, RecordSink};

use crate::storage::DocumentStore;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes every product of a collection to `path` as a pretty-printed
/// JSON array
///
/// # Returns
///
/// * `Ok(usize)` - Number of products exported
/// * `Err(OutputError)` - Failed to read the store or write the file
pub fn export_collection(
    store: &dyn DocumentStore,
    collection: &str,
    path: &Path,
) -> OutputResult<usize> {
    let products = store.list_products(collection)?;

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &products)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    tracing::info!(
        path = %path.display(),
        count = products.len(),
        collection,
        "exported collection"
    );
    Ok(products.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::ProductRecord;
    use crate::storage::SqliteStore;
    use chrono::Utc;

    #[test]
    fn test_export_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");

        let mut store = SqliteStore::new_in_memory().unwrap();
        for id in ["a1", "b2"] {
            let record = ProductRecord::new(
                id.to_string(),
                format!("Товар {}", id),
                format!("https://example.com/p/{}", id),
                Utc::now(),
            );
            store.upsert_product("products", &record).unwrap();
        }

        assert_eq!(export_collection(&store, "products", &path).unwrap(), 2);

        let exported: Vec<ProductRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(exported.len(), 2);
    }

    #[test]
    fn test_export_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        let store = SqliteStore::new_in_memory().unwrap();

        assert_eq!(export_collection(&store, "products", &path).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }
}
