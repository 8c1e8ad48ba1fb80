//! Storage traits and error types
//!
//! This module defines the trait interface for document store backends and
//! associated error types.

use crate::crawler::ProductRecord;
use crate::storage::{RunRecord, RunStatus, UpsertOutcome};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for document store implementations
///
/// Documents are grouped into named collections and keyed by product id
/// within a collection. Writes go through `&mut self`; callers that share a
/// store across tasks wrap it in a mutex.
pub trait DocumentStore {
    // ===== Run Management =====

    /// Creates a new collection run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the effective configuration
    /// * `categories` - Category URLs the run starts from
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, categories: &[String]) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as finished with its final status and counts
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        succeeded: u64,
        skipped: u64,
    ) -> StorageResult<()>;

    /// Marks runs still flagged as running as interrupted
    ///
    /// A run left in `running` state belongs to a process that was killed;
    /// its documents are valid partial progress.
    ///
    /// # Returns
    ///
    /// The number of runs that were marked
    fn interrupt_stale_runs(&mut self) -> StorageResult<usize>;

    // ===== Documents =====

    /// Inserts a product, or replaces the stored document with the same id
    fn upsert_product(
        &mut self,
        collection: &str,
        record: &ProductRecord,
    ) -> StorageResult<UpsertOutcome>;

    /// Counts the products in a collection
    fn count_products(&self, collection: &str) -> StorageResult<u64>;

    /// Lists every product in a collection, ordered by first sighting
    fn list_products(&self, collection: &str) -> StorageResult<Vec<ProductRecord>>;
}
