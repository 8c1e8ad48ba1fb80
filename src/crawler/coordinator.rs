//! Collection coordinator - main orchestration logic
//!
//! This module composes the category walker, link enumerator and product
//! extractor into one run:
//! - Recording the run in the store
//! - Walking each category and fanning out over its subcategories
//! - Deduplicating product links by product id
//! - Forwarding records to the sink
//! - Isolating per-link, per-subcategory and per-category failures

use crate::config::{compute_config_hash, validate, Config};
use crate::crawler::categories::walk_categories;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::listing::enumerate_links;
use crate::crawler::model::{CategoryRef, ProductLink};
use crate::crawler::product::extract_product;
use crate::output::{CollectionSummary, JsonlWriter, RecordSink, Sink};
use crate::state::{CollectorState, StateTracker};
use crate::storage::{open_store, RunStatus, UpsertOutcome};
use crate::url::product_id;
use crate::{HarvestError, UrlError};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// Run counters, updated from concurrent tasks
#[derive(Debug, Default)]
struct Counters {
    categories: AtomicU64,
    categories_failed: AtomicU64,
    subcategories: AtomicU64,
    subcategories_failed: AtomicU64,
    links_seen: AtomicU64,
    duplicates: AtomicU64,
    succeeded: AtomicU64,
    skipped: AtomicU64,
    inserted: AtomicU64,
    updated: AtomicU64,
}

impl Counters {
    fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    fn summary(&self, run_id: i64, status: RunStatus) -> CollectionSummary {
        CollectionSummary {
            categories: Self::get(&self.categories),
            categories_failed: Self::get(&self.categories_failed),
            subcategories: Self::get(&self.subcategories),
            subcategories_failed: Self::get(&self.subcategories_failed),
            links_seen: Self::get(&self.links_seen),
            duplicates: Self::get(&self.duplicates),
            succeeded: Self::get(&self.succeeded),
            skipped: Self::get(&self.skipped),
            inserted: Self::get(&self.inserted),
            updated: Self::get(&self.updated),
            ..CollectionSummary::new(run_id, status)
        }
    }
}

/// State owned by a single call to `Coordinator::run`
#[derive(Debug, Default)]
struct RunState {
    claimed: Mutex<HashSet<String>>,
    counters: Counters,
}

impl RunState {
    /// Claims a product id; false if it was already claimed in this run
    fn claim(&self, id: &str) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string())
    }

    fn release(&self, id: &str) {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }
}

/// Main collection coordinator structure
///
/// Claimed product ids and counters belong to a run, not to the
/// coordinator, so one coordinator can run any number of collections.
/// Across runs the store's upsert keeps the collection free of duplicates.
pub struct Coordinator {
    config: Arc<Config>,
    sink: Arc<dyn RecordSink>,
    fetcher: Fetcher,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The effective configuration
    /// * `sink` - Destination of extracted records
    /// * `fetcher` - Shared page fetcher
    pub fn new(config: Config, sink: Arc<dyn RecordSink>, fetcher: Fetcher) -> Self {
        Self {
            config: Arc::new(config),
            sink,
            fetcher,
        }
    }

    /// Runs a collection over the given category pages
    ///
    /// Categories are walked one after another; subcategories and product
    /// links fan out over bounded pools sized by `crawl.link-concurrency`
    /// and `crawl.product-concurrency`.
    ///
    /// # Returns
    ///
    /// * `Ok(CollectionSummary)` - The run finished; check `status` for
    ///   `failed` when every category walk failed
    /// * `Err(HarvestError)` - A sink write failed; the run is recorded as
    ///   failed
    pub async fn run(&self, categories: &[Url]) -> Result<CollectionSummary, HarvestError> {
        let config_hash = compute_config_hash(&self.config)?;
        let category_strings: Vec<String> = categories.iter().map(|u| u.to_string()).collect();
        let run_id = self.sink.begin_run(&config_hash, &category_strings)?;

        tracing::info!(run_id, categories = categories.len(), "starting collection run");

        let run = RunState::default();
        let mut tracker = StateTracker::new(format!("run {}", run_id));
        let outcome = self.collect_all(&run, categories, &mut tracker).await;

        let status = match &outcome {
            Ok(()) => {
                let failed = Counters::get(&run.counters.categories_failed);
                if !categories.is_empty() && failed == categories.len() as u64 {
                    RunStatus::Failed
                } else {
                    RunStatus::Completed
                }
            }
            Err(_) => RunStatus::Failed,
        };

        let summary = run.counters.summary(run_id, status);

        if let Err(e) = outcome {
            tracing::error!(run_id, kind = e.kind(), error = %e, "collection run aborted");
            if tracker.state().can_transition_to(CollectorState::Failed) {
                tracker.transition(CollectorState::Failed)?;
            }
            if let Err(finalize_err) =
                self.sink
                    .finalize(run_id, status, summary.succeeded, summary.skipped)
            {
                tracing::error!(run_id, error = %finalize_err, "failed to record run status");
            }
            return Err(e);
        }

        tracker.transition(if status == RunStatus::Failed {
            CollectorState::Failed
        } else {
            CollectorState::Done
        })?;
        self.sink
            .finalize(run_id, status, summary.succeeded, summary.skipped)?;

        tracing::info!(
            run_id,
            status = status.to_db_string(),
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            duplicates = summary.duplicates,
            "collection run finished"
        );

        Ok(summary)
    }

    async fn collect_all(
        &self,
        run: &RunState,
        categories: &[Url],
        tracker: &mut StateTracker,
    ) -> Result<(), HarvestError> {
        for category_url in categories {
            tracker.transition(CollectorState::WalkingCategories)?;
            Counters::add(&run.counters.categories, 1);

            let subcategories = match walk_categories(&self.fetcher, category_url).await {
                Ok(subcategories) => subcategories,
                Err(e) => {
                    Counters::add(&run.counters.categories_failed, 1);
                    tracing::info!(
                        url = %category_url,
                        kind = e.kind(),
                        error = %e,
                        "category walk failed"
                    );
                    tracker.transition(CollectorState::Idle)?;
                    continue;
                }
            };

            Counters::add(&run.counters.subcategories, subcategories.len() as u64);
            tracker.transition(CollectorState::Idle)?;

            let mut results = stream::iter(subcategories)
                .map(|subcategory| self.collect_subcategory(run, subcategory))
                .buffer_unordered(self.config.crawl.link_concurrency as usize);

            while let Some(result) = results.next().await {
                result?;
            }
        }

        Ok(())
    }

    /// Enumerates one subcategory and extracts its products
    ///
    /// Only sink failures are returned as errors. A subcategory whose
    /// listing cannot be enumerated goes back to idle and is counted.
    async fn collect_subcategory(
        &self,
        run: &RunState,
        subcategory: CategoryRef,
    ) -> Result<(), HarvestError> {
        let mut tracker = StateTracker::new(subcategory.url.clone());
        tracker.transition(CollectorState::EnumeratingLinks)?;

        let links = match Url::parse(&subcategory.url) {
            Ok(url) => enumerate_links(&self.fetcher, &url, self.config.crawl.max_pages).await,
            Err(e) => Err(HarvestError::UrlError(UrlError::Parse(e.to_string()))),
        };

        let links = match links {
            Ok(links) => links,
            Err(e) => {
                Counters::add(&run.counters.subcategories_failed, 1);
                tracing::info!(
                    url = %subcategory.url,
                    kind = e.kind(),
                    error = %e,
                    "subcategory enumeration failed"
                );
                tracker.transition(CollectorState::Idle)?;
                return Ok(());
            }
        };

        Counters::add(&run.counters.links_seen, links.len() as u64);

        if !links.is_empty() {
            tracker.transition(CollectorState::ExtractingProduct)?;

            let mut results = stream::iter(links)
                .map(|link| self.collect_product(run, link))
                .buffer_unordered(self.config.crawl.product_concurrency as usize);

            while let Some(result) = results.next().await {
                result?;
            }
        }

        tracker.transition(CollectorState::Idle)?;
        tracker.transition(CollectorState::Done)?;
        Ok(())
    }

    /// Extracts one product link unless its id was already claimed
    ///
    /// A failed extraction releases the claim, so the same product can be
    /// retried when its link turns up again later in the run. A duplicate
    /// that arrives while the first attempt is still in flight is dropped;
    /// if that attempt then fails, the product is missing from this run and
    /// is picked up by the next one.
    async fn collect_product(
        &self,
        run: &RunState,
        link: ProductLink,
    ) -> Result<(), HarvestError> {
        let url = match Url::parse(&link.url) {
            Ok(url) => url,
            Err(e) => {
                Counters::add(&run.counters.skipped, 1);
                tracing::info!(url = %link.url, kind = "url", error = %e, "invalid product link");
                return Ok(());
            }
        };

        let id = product_id(&url);
        if !run.claim(&id) {
            Counters::add(&run.counters.duplicates, 1);
            tracing::debug!(url = %url, id = %id, "duplicate product link");
            return Ok(());
        }

        let record = match extract_product(&self.fetcher, &url).await {
            Ok(record) => record,
            Err(e) => {
                run.release(&id);
                Counters::add(&run.counters.skipped, 1);
                tracing::info!(
                    url = %url,
                    kind = e.kind(),
                    error = %e,
                    "product extraction failed"
                );
                return Ok(());
            }
        };

        match self.sink.write(&record)? {
            UpsertOutcome::Inserted => Counters::add(&run.counters.inserted, 1),
            UpsertOutcome::Updated => Counters::add(&run.counters.updated, 1),
        }
        Counters::add(&run.counters.succeeded, 1);
        Ok(())
    }
}

/// Runs a complete collection from configuration
///
/// This is the entry point used by the CLI. It will:
/// 1. Validate the configuration
/// 2. Open the document store at `output.database-path`
/// 3. Open the JSONL file at `output.jsonl-path` (truncated unless `append`)
/// 4. Build the fetcher
/// 5. Run the coordinator over `categories`
///
/// # Example
///
/// ```no_run
/// use pulscen_harvest::config::Config;
/// use pulscen_harvest::crawler::run_collection;
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let category = Url::parse("https://pulscen.ru/price/11-stroymaterialy")?;
/// let summary = run_collection(Config::default(), &[category], false).await?;
/// println!("{} products", summary.succeeded);
/// # Ok(())
/// # }
/// ```
pub async fn run_collection(
    config: Config,
    categories: &[Url],
    append: bool,
) -> Result<CollectionSummary, HarvestError> {
    validate(&config)?;

    let store = open_store(Path::new(&config.output.database_path))?;
    let writer = JsonlWriter::create(Path::new(&config.output.jsonl_path), append)?;
    let sink = Arc::new(Sink::new(
        Box::new(store),
        writer,
        config.output.collection.clone(),
    ));
    let fetcher = Fetcher::new(&config.fetcher)?;

    let coordinator = Coordinator::new(config, sink, fetcher);
    coordinator.run(categories).await
}
