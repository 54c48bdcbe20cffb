//! # PMC Retrieval
//!
//! Literature retrieval against PubMed Central through NCBI E-utilities.
//! Two term lists (devices and indicators) are composed into one boolean
//! query; queries too long for a single GET are split into batches that are
//! fetched concurrently and merged without duplicates.
//!
//! ## Features
//!
//! - **Query composition**: `("d1" OR "d2") AND ("i1" OR "i2") [AND date]`
//! - **Batching**: byte-budgeted splitting that keeps every term and the AND structure
//! - **History server paging**: ESearch with `usehistory=y`, ESummary in pages
//! - **Retry and rate limiting**: capped exponential backoff and a shared token bucket
//! - **Partial tolerance**: failed batches are logged and skipped, counts are reported
//!
//! ## Quick Start
//!
//! ```no_run
//! use pmc_retrieval::{BatchRetriever, ClientConfig, DateRange, EntrezClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EntrezClient::with_config(ClientConfig::from_env())?;
//!     let retriever = BatchRetriever::new(client);
//!
//!     let outcome = retriever
//!         .search_with_report(
//!             &["Hemoblast", "Gelfoam"],
//!             &["urological surgery", "prostatectomy"],
//!             Some(DateRange::from_year(2023)),
//!         )
//!         .await?;
//!
//!     println!(
//!         "{} articles ({} of {} records retrieved)",
//!         outcome.results.len(),
//!         outcome.retrieved_records,
//!         outcome.expected_records
//!     );
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entrez;
pub mod error;
pub mod query;
pub mod rate_limit;
pub mod retry;
pub mod search;

// Re-export main types for convenience
pub use config::{ClientConfig, SearchConfig};
pub use entrez::{EntrezClient, RawRecord, SearchGateway, SearchHandle};
pub use error::{Result, RetrievalError};
pub use query::{BatchPartitioner, ComposedQuery, DateRange, compose, split_query};
pub use rate_limit::RateLimiter;
pub use retry::RetryConfig;
pub use search::{ArticleResult, BatchRetriever, Dispatch, RetrievalMode, SearchOutcome};
