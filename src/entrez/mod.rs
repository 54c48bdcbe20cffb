//! Remote search gateway over NCBI E-utilities
//!
//! [`SearchGateway`] is the seam between the retrieval orchestrator and the
//! network. [`EntrezClient`] is the production implementation; tests swap in
//! in-memory gateways.

pub mod client;
pub mod models;
pub(crate) mod responses;

use async_trait::async_trait;

use crate::error::Result;

pub use client::EntrezClient;
pub use models::{ArticleId, RawRecord, SearchHandle};

/// Submit searches and page through their cached result sets
#[async_trait]
pub trait SearchGateway: Send + Sync {
    /// Request URL a search for `term` would be sent as
    fn search_url(&self, database: &str, term: &str) -> String;

    /// Longest request URL the transport accepts, in bytes
    fn max_url_length(&self) -> usize;

    /// Bytes every request spends on credential parameters
    fn reserved_query_len(&self) -> usize {
        0
    }

    /// Run a search and keep its result set on the server
    ///
    /// # Errors
    ///
    /// * `RetrievalError::UrlTooLong` - If the request would exceed [`Self::max_url_length`]
    /// * `RetrievalError::ApiError` - If the service rejects the query or stays unavailable
    async fn submit_search(&self, database: &str, term: &str) -> Result<SearchHandle>;

    /// Fetch `size` summaries starting at `offset` from a cached result set
    async fn fetch_page(
        &self,
        database: &str,
        handle: &SearchHandle,
        offset: usize,
        size: usize,
    ) -> Result<Vec<RawRecord>>;
}
