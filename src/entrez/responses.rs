use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ESearchResult {
    pub esearchresult: Option<ESearchData>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ESearchData {
    #[serde(rename = "ERROR")]
    pub error: Option<String>,
    pub count: Option<String>,
    pub webenv: Option<String>,
    pub querykey: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ESummaryResult {
    pub result: Option<ESummaryResultData>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ESummaryResultData {
    #[serde(default)]
    pub uids: Vec<String>,
    #[serde(flatten)]
    pub documents: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentSummary {
    #[serde(default)]
    pub articleids: Vec<ArticleIdData>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArticleIdData {
    pub idtype: String,
    #[serde(default)]
    pub value: String,
}
