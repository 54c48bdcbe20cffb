use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::entrez::SearchGateway;
use crate::entrez::models::{ArticleId, RawRecord, SearchHandle};
use crate::entrez::responses::{DocumentSummary, ESearchResult, ESummaryResult};
use crate::error::{Result, RetrievalError};
use crate::rate_limit::RateLimiter;
use crate::retry::with_retry;

/// E-utilities client for ESearch/ESummary over the history server
#[derive(Clone)]
pub struct EntrezClient {
    client: Client,
    base_url: String,
    rate_limiter: RateLimiter,
    config: ClientConfig,
}

impl EntrezClient {
    /// Create a client with default configuration
    ///
    /// Uses default NCBI rate limiting (3 requests/second) and no API key.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::new())
    }

    /// Create a client with custom configuration
    ///
    /// # Example
    ///
    /// ```
    /// use pmc_retrieval::{ClientConfig, EntrezClient};
    ///
    /// let config = ClientConfig::new()
    ///     .with_api_key("your_api_key_here")
    ///     .with_email("researcher@university.edu");
    ///
    /// let client = EntrezClient::with_config(config).unwrap();
    /// ```
    ///
    /// # Errors
    ///
    /// * `RetrievalError::RequestError` - If the HTTP client cannot be built
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.effective_user_agent())
            .build()?;

        Ok(Self::with_client(client, config))
    }

    /// Create a client around an existing `reqwest::Client`
    pub fn with_client(client: Client, config: ClientConfig) -> Self {
        let rate_limiter = config.create_rate_limiter();
        let base_url = config.effective_base_url().to_string();

        Self {
            client,
            base_url,
            rate_limiter,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn append_api_params(&self, url: &mut String) {
        for (key, value) in self.config.build_api_params() {
            url.push('&');
            url.push_str(&key);
            url.push('=');
            url.push_str(&urlencoding::encode(&value));
        }
    }

    fn summary_url(&self, database: &str, handle: &SearchHandle, offset: usize, size: usize) -> String {
        let mut url = format!(
            "{}/esummary.fcgi?db={}&WebEnv={}&query_key={}&retmode=json&retstart={}&retmax={}",
            self.base_url,
            urlencoding::encode(database),
            urlencoding::encode(&handle.webenv),
            urlencoding::encode(&handle.query_key),
            offset,
            size
        );
        self.append_api_params(&mut url);
        url
    }

    /// Send a GET with rate limiting and retry
    ///
    /// Oversized URLs are rejected before anything is sent. Any non-success
    /// status becomes an error; 5xx and 429 are retried.
    async fn make_request(&self, url: &str) -> Result<Response> {
        let max = self.config.max_url_length;
        if url.len() > max {
            warn!(length = url.len(), max, "Request URL too long");
            return Err(RetrievalError::UrlTooLong {
                length: url.len(),
                max,
            });
        }

        with_retry(
            move || async move {
                self.rate_limiter.acquire().await;
                debug!("Making API request to: {}", url);
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(RetrievalError::from)?;
                let status = response.status();

                if status == StatusCode::TOO_MANY_REQUESTS {
                    warn!("NCBI rate limit hit");
                    return Err(RetrievalError::RateLimitExceeded);
                }
                if !status.is_success() {
                    warn!("API request failed with status: {}", status);
                    return Err(RetrievalError::ApiError {
                        status: status.as_u16(),
                        message: format!(
                            "HTTP {}: {}",
                            status,
                            status.canonical_reason().unwrap_or("Unknown error")
                        ),
                    });
                }

                Ok::<_, RetrievalError>(response)
            },
            &self.config.retry_config,
            "NCBI API request",
        )
        .await
    }
}

#[async_trait]
impl SearchGateway for EntrezClient {
    fn search_url(&self, database: &str, term: &str) -> String {
        let mut url = format!(
            "{}/esearch.fcgi?db={}&usehistory=y&retmode=json&retmax=0&term={}",
            self.base_url,
            urlencoding::encode(database),
            urlencoding::encode(term)
        );
        self.append_api_params(&mut url);
        url
    }

    fn max_url_length(&self) -> usize {
        self.config.max_url_length
    }

    fn reserved_query_len(&self) -> usize {
        self.config.api_key_param_len()
    }

    #[instrument(skip(self, term), fields(term_len = term.len()))]
    async fn submit_search(&self, database: &str, term: &str) -> Result<SearchHandle> {
        let url = self.search_url(database, term);
        let response = self.make_request(&url).await?;
        let body: ESearchResult = response.json().await?;

        if let Some(message) = body.error {
            return Err(RetrievalError::ApiError {
                status: 200,
                message,
            });
        }

        let data = body.esearchresult.ok_or_else(|| {
            RetrievalError::InvalidResponse("ESearch response has no esearchresult".to_string())
        })?;

        if let Some(message) = data.error {
            warn!(error = %message, "ESearch reported an error");
            return Err(RetrievalError::ApiError {
                status: 200,
                message,
            });
        }

        let total_count = match data.count.as_deref() {
            Some(count) => count.trim().parse::<usize>().map_err(|_| {
                RetrievalError::InvalidResponse(format!("ESearch count is not a number: {count}"))
            })?,
            None => 0,
        };

        let handle = match (data.webenv, data.querykey) {
            (Some(webenv), Some(query_key)) => SearchHandle {
                webenv,
                query_key,
                total_count,
            },
            _ if total_count == 0 => SearchHandle {
                webenv: String::new(),
                query_key: String::new(),
                total_count,
            },
            _ => {
                return Err(RetrievalError::InvalidResponse(
                    "ESearch response has no history session".to_string(),
                ));
            }
        };

        info!(total_count, "Search submitted");
        Ok(handle)
    }

    #[instrument(skip(self, handle))]
    async fn fetch_page(
        &self,
        database: &str,
        handle: &SearchHandle,
        offset: usize,
        size: usize,
    ) -> Result<Vec<RawRecord>> {
        if handle.is_empty() || size == 0 {
            return Ok(Vec::new());
        }

        let url = self.summary_url(database, handle, offset, size);
        let response = self.make_request(&url).await?;
        let body: ESummaryResult = response.json().await?;

        if let Some(message) = body.error {
            return Err(RetrievalError::ApiError {
                status: 200,
                message,
            });
        }

        let Some(mut result) = body.result else {
            return Err(RetrievalError::InvalidResponse(
                "ESummary response has no result".to_string(),
            ));
        };

        let mut records = Vec::with_capacity(result.uids.len());
        for uid in &result.uids {
            let Some(document) = result.documents.remove(uid) else {
                warn!(uid = %uid, "Summary missing for uid");
                continue;
            };
            let summary: DocumentSummary = match serde_json::from_value(document) {
                Ok(summary) => summary,
                Err(err) => {
                    warn!(uid = %uid, error = %err, "Unreadable summary");
                    continue;
                }
            };
            if let Some(error) = summary.error {
                warn!(uid = %uid, error = %error, "Summary reported an error");
                continue;
            }

            records.push(RawRecord {
                uid: uid.clone(),
                article_ids: summary
                    .articleids
                    .into_iter()
                    .map(|id| ArticleId::new(id.idtype, id.value))
                    .collect(),
            });
        }

        debug!(records = records.len(), "Fetched summary page");
        Ok(records)
    }
}
