use serde::{Deserialize, Serialize};

/// Server-side cached result set created by ESearch with `usehistory=y`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHandle {
    /// History server session token
    pub webenv: String,
    pub query_key: String,
    /// Number of records the search matched
    pub total_count: usize,
}

impl SearchHandle {
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }
}

/// One document summary as returned by ESummary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub uid: String,
    pub article_ids: Vec<ArticleId>,
}

/// Typed cross-reference identifier carried by a record (`pmid`, `doi`, `pmcid`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleId {
    pub id_type: String,
    pub value: String,
}

impl ArticleId {
    pub fn new<T: Into<String>, V: Into<String>>(id_type: T, value: V) -> Self {
        Self {
            id_type: id_type.into(),
            value: value.into(),
        }
    }
}

impl RawRecord {
    pub fn new<S: Into<String>>(uid: S) -> Self {
        Self {
            uid: uid.into(),
            article_ids: Vec::new(),
        }
    }

    pub fn with_article_id<T: Into<String>, V: Into<String>>(mut self, id_type: T, value: V) -> Self {
        self.article_ids.push(ArticleId::new(id_type, value));
        self
    }
}
