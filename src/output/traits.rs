//! Output sink trait and types
//!
//! This module defines the trait interface for record sinks and the
//! summary returned by a collection run.

use crate::crawler::ProductRecord;
use crate::storage::{RunStatus, StorageError, UpsertOutcome};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Output lock poisoned: {0}")]
    Lock(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Counters of one collection run
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    pub run_id: i64,
    pub status: String,

    // Categories and subcategories
    pub categories: u64,
    pub categories_failed: u64,
    pub subcategories: u64,
    pub subcategories_failed: u64,

    // Product links
    pub links_seen: u64,
    pub duplicates: u64,
    pub succeeded: u64,
    pub skipped: u64,

    // Store outcome of the succeeded records
    pub inserted: u64,
    pub updated: u64,
}

impl CollectionSummary {
    /// Creates a summary with every counter at zero
    pub fn new(run_id: i64, status: RunStatus) -> Self {
        Self {
            run_id,
            status: status.to_db_string().to_string(),
            categories: 0,
            categories_failed: 0,
            subcategories: 0,
            subcategories_failed: 0,
            links_seen: 0,
            duplicates: 0,
            succeeded: 0,
            skipped: 0,
            inserted: 0,
            updated: 0,
        }
    }

    /// Links that reached extraction (not duplicates)
    pub fn attempted(&self) -> u64 {
        self.succeeded + self.skipped
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let attempted = self.attempted();
        if attempted == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / attempted as f64) * 100.0
    }
}

/// Destination for extracted records
///
/// Implementations are shared between concurrent extractors and must
/// serialize their own writes.
pub trait RecordSink: Send + Sync {
    /// Records the start of a run and returns its id
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the effective configuration
    /// * `categories` - Category URLs the run starts from
    fn begin_run(&self, config_hash: &str, categories: &[String]) -> OutputResult<i64>;

    /// Persists one record
    ///
    /// # Returns
    ///
    /// Whether the record was new to the store or replaced an older copy
    fn write(&self, record: &ProductRecord) -> OutputResult<UpsertOutcome>;

    /// Records the end of a run
    ///
    /// # Arguments
    ///
    /// * `run_id` - Id returned by `begin_run`
    /// * `status` - The final status of the run
    /// * `succeeded` - Records written
    /// * `skipped` - Links whose extraction failed
    fn finalize(
        &self,
        run_id: i64,
        status: RunStatus,
        succeeded: u64,
        skipped: u64,
    ) -> OutputResult<()>;
}
