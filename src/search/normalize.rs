//! Record normalization and first-seen-wins merging

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::entrez::RawRecord;

/// Prefix every primary identifier carries
pub const PMC_PREFIX: &str = "PMC";

const PMID_ID_TYPE: &str = "pmid";
const ABSENT_ID: &str = "0";

/// Normalized output unit: a PMC id and, when linked, its PubMed id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleResult {
    pub pmcid: String,
    pub pmid: Option<String>,
}

impl ArticleResult {
    pub fn has_pmid(&self) -> bool {
        self.pmid.is_some()
    }
}

/// Turn a raw summary record into an [`ArticleResult`]
///
/// The first `pmid` cross-reference with a real value wins; `"0"` and blank
/// values count as absent.
///
/// # Example
///
/// ```
/// use pmc_retrieval::entrez::RawRecord;
/// use pmc_retrieval::search::normalize_record;
///
/// let record = RawRecord::new("123").with_article_id("pmid", "456");
/// let result = normalize_record(&record);
///
/// assert_eq!(result.pmcid, "PMC123");
/// assert_eq!(result.pmid.as_deref(), Some("456"));
/// ```
pub fn normalize_record(record: &RawRecord) -> ArticleResult {
    let pmid = record
        .article_ids
        .iter()
        .filter(|id| id.id_type == PMID_ID_TYPE)
        .map(|id| id.value.trim())
        .find(|value| !value.is_empty() && *value != ABSENT_ID)
        .map(str::to_string);

    ArticleResult {
        pmcid: format_pmcid(&record.uid),
        pmid,
    }
}

fn format_pmcid(uid: &str) -> String {
    let uid = uid.trim();
    if uid.starts_with(PMC_PREFIX) {
        uid.to_string()
    } else {
        format!("{}{}", PMC_PREFIX, uid)
    }
}

/// Ordered accumulator that drops repeated PMC ids
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
    results: Vec<ArticleResult>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `result` unless its PMC id was already seen; returns whether it was kept
    pub fn push(&mut self, result: ArticleResult) -> bool {
        if !self.seen.insert(result.pmcid.clone()) {
            return false;
        }
        self.results.push(result);
        true
    }

    pub fn extend<I: IntoIterator<Item = ArticleResult>>(&mut self, results: I) {
        for result in results {
            self.push(result);
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_results(self) -> Vec<ArticleResult> {
        self.results
    }
}
