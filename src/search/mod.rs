//! Retrieval orchestration
//!
//! [`BatchRetriever`] decides between one request and a batched run by the
//! length of the ESearch URL the full query would need. Batched runs go through
//! a bounded worker pool and fall back to sequential processing when the pool
//! itself breaks. Failed batches contribute nothing; the rest is merged in
//! batch order with duplicate PMC ids dropped.

pub mod dispatch;
pub mod normalize;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::config::SearchConfig;
use crate::entrez::{RawRecord, SearchGateway, SearchHandle};
use crate::error::{Result, RetrievalError};
use crate::query::{BatchPartitioner, ComposedQuery, DateRange, split_query};
use crate::retry::RetryableError;

pub use dispatch::Dispatch;
pub use normalize::{ArticleResult, Deduplicator, normalize_record};

/// How a query was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Single,
    Batched,
}

/// Merged results plus counts for spotting partial retrieval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<ArticleResult>,
    pub mode: RetrievalMode,
    pub batch_count: usize,
    pub failed_batches: usize,
    /// Sum of the match counts the service reported
    pub expected_records: usize,
    /// Records fetched before duplicates were dropped
    pub retrieved_records: usize,
}

impl SearchOutcome {
    /// Whether some batches or pages were lost
    pub fn is_partial(&self) -> bool {
        self.failed_batches > 0 || self.retrieved_records < self.expected_records
    }
}

/// What one batch contributed
#[derive(Debug)]
struct BatchOutput {
    results: Vec<ArticleResult>,
    expected: usize,
    retrieved: usize,
    failed: bool,
}

impl BatchOutput {
    fn failed() -> Self {
        Self {
            results: Vec::new(),
            expected: 0,
            retrieved: 0,
            failed: true,
        }
    }
}

/// Retrieval orchestrator over a [`SearchGateway`]
///
/// # Example
///
/// ```no_run
/// use pmc_retrieval::{BatchRetriever, DateRange, EntrezClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let retriever = BatchRetriever::new(EntrezClient::new()?);
///     let results = retriever
///         .search(
///             &["Hemoblast", "Gelfoam"],
///             &["urological surgery", "prostatectomy"],
///             Some(DateRange::between(2023, 2025)),
///         )
///         .await?;
///
///     for article in results {
///         println!("{} {:?}", article.pmcid, article.pmid);
///     }
///     Ok(())
/// }
/// ```
pub struct BatchRetriever<G> {
    gateway: Arc<G>,
    config: SearchConfig,
}

impl<G> Clone for BatchRetriever<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            config: self.config.clone(),
        }
    }
}

impl<G: SearchGateway + 'static> BatchRetriever<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_config(gateway, SearchConfig::default())
    }

    pub fn with_config(gateway: G, config: SearchConfig) -> Self {
        Self::from_shared(Arc::new(gateway), config)
    }

    /// Build on a gateway that is already shared elsewhere
    pub fn from_shared(gateway: Arc<G>, config: SearchConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Search for articles matching any device term and any indicator term
    pub async fn search<S: AsRef<str>>(
        &self,
        devices: &[S],
        indicators: &[S],
        date_range: Option<DateRange>,
    ) -> Result<Vec<ArticleResult>> {
        Ok(self
            .search_with_report(devices, indicators, date_range)
            .await?
            .results)
    }

    pub async fn search_with_report<S: AsRef<str>>(
        &self,
        devices: &[S],
        indicators: &[S],
        date_range: Option<DateRange>,
    ) -> Result<SearchOutcome> {
        let query = ComposedQuery::new(
            devices.iter().map(|s| s.as_ref().to_string()),
            indicators.iter().map(|s| s.as_ref().to_string()),
        );
        let query = match date_range {
            Some(range) => query.with_date_range(range),
            None => query,
        };
        self.search_query_with_report(&query).await
    }

    /// Like [`Self::search`], keeping only articles linked to a PubMed record
    pub async fn search_linked<S: AsRef<str>>(
        &self,
        devices: &[S],
        indicators: &[S],
        date_range: Option<DateRange>,
    ) -> Result<Vec<ArticleResult>> {
        let mut results = self.search(devices, indicators, date_range).await?;
        results.retain(ArticleResult::has_pmid);
        Ok(results)
    }

    pub async fn search_query(&self, query: &ComposedQuery) -> Result<Vec<ArticleResult>> {
        Ok(self.search_query_with_report(query).await?.results)
    }

    /// Run a structured query, batching it on its term lists when too long
    ///
    /// # Errors
    ///
    /// * `RetrievalError::InvalidConfig` - If the search configuration is unusable
    /// * `RetrievalError::NoValidBatches` - If the query needs batching but a term group is empty
    /// * `RetrievalError::DispatchFailed` - If both dispatch strategies failed
    #[instrument(skip(self, query), fields(terms = query.term_count()))]
    pub async fn search_query_with_report(&self, query: &ComposedQuery) -> Result<SearchOutcome> {
        self.config.validate()?;
        let term = query.render();
        let url_len = self.url_len(&term);

        if url_len <= self.gateway.max_url_length() {
            return Ok(self.run_single(&term).await);
        }

        info!(url_len, max = self.gateway.max_url_length(), "Query too long, batching");
        let batches: Vec<String> = self
            .partitioner()
            .split(query)
            .iter()
            .map(ComposedQuery::render)
            .collect();
        self.run_batched(url_len, batches).await
    }

    pub async fn search_term(&self, term: &str) -> Result<Vec<ArticleResult>> {
        Ok(self.search_term_with_report(term).await?.results)
    }

    /// Run an already rendered query string
    ///
    /// Oversized strings are parsed back into their term groups for batching;
    /// a string that does not parse is sent as a single batch.
    #[instrument(skip(self, term), fields(term_len = term.len()))]
    pub async fn search_term_with_report(&self, term: &str) -> Result<SearchOutcome> {
        self.config.validate()?;
        let url_len = self.url_len(term);

        if url_len <= self.gateway.max_url_length() {
            return Ok(self.run_single(term).await);
        }

        info!(url_len, max = self.gateway.max_url_length(), "Query too long, batching");
        let batches = split_query(
            term,
            self.config.batch_budget,
            self.gateway.reserved_query_len(),
        );
        self.run_batched(url_len, batches).await
    }

    /// Page through a cached result set
    ///
    /// Failing pages are skipped. Errors only when every requested page failed.
    pub async fn collect_records(&self, handle: &SearchHandle) -> Result<Vec<RawRecord>> {
        collect_pages(
            self.gateway.as_ref(),
            &self.config.database,
            handle,
            self.config.page_size,
        )
        .await
    }

    fn partitioner(&self) -> BatchPartitioner {
        BatchPartitioner::new(self.config.batch_budget).with_reserved(self.gateway.reserved_query_len())
    }

    fn url_len(&self, term: &str) -> usize {
        self.gateway.search_url(&self.config.database, term).len()
    }

    async fn run_single(&self, term: &str) -> SearchOutcome {
        info!("Running query as a single request");
        let output = process_batch(self.gateway.as_ref(), &self.config, 0, term).await;
        self.finish(RetrievalMode::Single, vec![output])
    }

    async fn run_batched(&self, url_len: usize, batches: Vec<String>) -> Result<SearchOutcome> {
        if batches.is_empty() {
            error!(url_len, "Query could not be split into batches");
            return Err(RetrievalError::NoValidBatches { query_len: url_len });
        }

        info!(
            batches = batches.len(),
            workers = self.config.max_workers,
            "Dispatching batches"
        );

        let gateway = Arc::clone(&self.gateway);
        let config = Arc::new(self.config.clone());
        let job = move |index: usize, term: String| {
            let gateway = Arc::clone(&gateway);
            let config = Arc::clone(&config);
            async move { process_batch(gateway.as_ref(), &config, index, &term).await }
        };

        let concurrent = Dispatch::Concurrent {
            workers: self.config.max_workers,
        };
        let outputs = match concurrent.run(&batches, &job).await {
            Ok(outputs) => outputs,
            Err(err) if err.is_structural() => {
                warn!(error = %err, "Concurrent dispatch failed, falling back to sequential");
                Dispatch::Sequential.run(&batches, &job).await?
            }
            Err(err) => return Err(err),
        };

        Ok(self.finish(RetrievalMode::Batched, outputs))
    }

    fn finish(&self, mode: RetrievalMode, outputs: Vec<BatchOutput>) -> SearchOutcome {
        let batch_count = outputs.len();
        let mut failed_batches = 0;
        let mut expected_records = 0;
        let mut retrieved_records = 0;
        let mut merged = Deduplicator::new();

        for output in outputs {
            if output.failed {
                failed_batches += 1;
            }
            expected_records += output.expected;
            retrieved_records += output.retrieved;
            merged.extend(output.results);
        }

        let mut results = merged.into_results();
        if self.config.require_secondary_id {
            results.retain(ArticleResult::has_pmid);
        }

        if failed_batches > 0 || retrieved_records < expected_records {
            warn!(
                failed_batches,
                expected_records, retrieved_records, "Partial retrieval"
            );
        }
        info!(
            ?mode,
            batch_count,
            results = results.len(),
            "Retrieval finished"
        );

        SearchOutcome {
            results,
            mode,
            batch_count,
            failed_batches,
            expected_records,
            retrieved_records,
        }
    }
}

/// Search one batch and page through its results, retrying the whole batch
/// on transient failure; exhaustion yields an empty, failed output
async fn process_batch<G: SearchGateway + ?Sized>(
    gateway: &G,
    config: &SearchConfig,
    index: usize,
    term: &str,
) -> BatchOutput {
    let attempts = config.batch_retries + 1;

    for attempt in 1..=attempts {
        match retrieve(gateway, config, term).await {
            Ok((handle, records)) => {
                let results: Vec<ArticleResult> = records.iter().map(normalize_record).collect();
                debug!(batch = index, results = results.len(), "Batch complete");
                return BatchOutput {
                    expected: handle.total_count,
                    retrieved: records.len(),
                    results,
                    failed: false,
                };
            }
            Err(err) if err.is_retryable() && attempt < attempts => {
                warn!(batch = index, attempt, error = %err, "Batch failed, retrying");
            }
            Err(err) => {
                warn!(batch = index, attempt, error = %err, "Batch failed, skipping");
                break;
            }
        }
    }

    BatchOutput::failed()
}

async fn retrieve<G: SearchGateway + ?Sized>(
    gateway: &G,
    config: &SearchConfig,
    term: &str,
) -> Result<(SearchHandle, Vec<RawRecord>)> {
    let handle = gateway.submit_search(&config.database, term).await?;
    let records = collect_pages(gateway, &config.database, &handle, config.page_size).await?;
    Ok((handle, records))
}

async fn collect_pages<G: SearchGateway + ?Sized>(
    gateway: &G,
    database: &str,
    handle: &SearchHandle,
    page_size: usize,
) -> Result<Vec<RawRecord>> {
    let total = handle.total_count;
    let page_size = page_size.max(1);
    let mut records = Vec::with_capacity(total);
    let mut last_error = None;
    let mut pages_ok = 0;

    for offset in (0..total).step_by(page_size) {
        let size = page_size.min(total - offset);
        match gateway.fetch_page(database, handle, offset, size).await {
            Ok(page) => {
                pages_ok += 1;
                records.extend(page);
            }
            Err(err) => {
                warn!(offset, size, error = %err, "Page fetch failed, skipping");
                last_error = Some(err);
            }
        }
    }

    if pages_ok == 0 {
        if let Some(err) = last_error {
            return Err(err);
        }
    }
    if records.len() < total {
        warn!(
            retrieved = records.len(),
            total, "Retrieved fewer records than the search reported"
        );
    }

    Ok(records)
}
