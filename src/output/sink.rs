//! Store-plus-file record sink

use crate::crawler::ProductRecord;
use crate::output::jsonl::JsonlWriter;
use crate::output::traits::{OutputError, OutputResult, RecordSink};
use crate::storage::{DocumentStore, RunStatus, UpsertOutcome};
use std::sync::Mutex;

/// Sink that upserts each record into a document store and appends it to
/// a JSONL file
///
/// The store and the writer sit behind separate mutexes. Neither lock is
/// held across an `.await`.
pub struct Sink {
    store: Mutex<Box<dyn DocumentStore + Send>>,
    writer: Mutex<JsonlWriter>,
    collection: String,
}

impl Sink {
    /// Creates a new sink
    ///
    /// # Arguments
    ///
    /// * `store` - Document store backend
    /// * `writer` - Open JSONL output file
    /// * `collection` - Collection the records are upserted into
    pub fn new(
        store: Box<dyn DocumentStore + Send>,
        writer: JsonlWriter,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            writer: Mutex::new(writer),
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Number of documents currently in the sink's collection
    pub fn stored_count(&self) -> OutputResult<u64> {
        let store = self
            .store
            .lock()
            .map_err(|e| OutputError::Lock(format!("Failed to lock store: {}", e)))?;
        Ok(store.count_products(&self.collection)?)
    }
}

impl RecordSink for Sink {
    fn begin_run(&self, config_hash: &str, categories: &[String]) -> OutputResult<i64> {
        let mut store = self
            .store
            .lock()
            .map_err(|e| OutputError::Lock(format!("Failed to lock store: {}", e)))?;

        let stale = store.interrupt_stale_runs()?;
        if stale > 0 {
            tracing::warn!(count = stale, "marked unfinished previous runs as interrupted");
        }

        Ok(store.create_run(config_hash, categories)?)
    }

    fn write(&self, record: &ProductRecord) -> OutputResult<UpsertOutcome> {
        let outcome = {
            let mut store = self
                .store
                .lock()
                .map_err(|e| OutputError::Lock(format!("Failed to lock store: {}", e)))?;
            store.upsert_product(&self.collection, record)?
        };

        let mut writer = self
            .writer
            .lock()
            .map_err(|e| OutputError::Lock(format!("Failed to lock writer: {}", e)))?;
        writer.write_line(record)?;

        tracing::trace!(id = %record.id, outcome = ?outcome, "record written");
        Ok(outcome)
    }

    fn finalize(
        &self,
        run_id: i64,
        status: RunStatus,
        succeeded: u64,
        skipped: u64,
    ) -> OutputResult<()> {
        let mut store = self
            .store
            .lock()
            .map_err(|e| OutputError::Lock(format!("Failed to lock store: {}", e)))?;
        store.finish_run(run_id, status, succeeded, skipped)?;

        let writer = self
            .writer
            .lock()
            .map_err(|e| OutputError::Lock(format!("Failed to lock writer: {}", e)))?;
        tracing::info!(
            run_id,
            status = status.to_db_string(),
            lines = writer.lines_written(),
            path = %writer.path().display(),
            "run finalized"
        );
        Ok(())
    }
}
