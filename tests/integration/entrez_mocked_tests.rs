//! EntrezClient against mocked E-utilities endpoints
//!
//! These tests verify request shape, response parsing, URL length checks and
//! retry behavior without making real API calls.

use std::time::Duration;

use pmc_retrieval::entrez::{SearchGateway, SearchHandle};
use pmc_retrieval::{ClientConfig, EntrezClient, RetrievalError, RetryConfig};
use tracing_test::traced_test;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ESEARCH_RESPONSE: &str = r#"{
    "header": {"type": "esearch", "version": "0.3"},
    "esearchresult": {
        "count": "2",
        "retmax": "0",
        "retstart": "0",
        "querykey": "1",
        "webenv": "MCID_6710b5d5c0b1d3",
        "idlist": []
    }
}"#;

const ESUMMARY_RESPONSE: &str = r#"{
    "header": {"type": "esummary", "version": "0.3"},
    "result": {
        "uids": ["123", "124", "125"],
        "123": {
            "uid": "123",
            "title": "Hemostatic agents in radical prostatectomy",
            "articleids": [
                {"idtype": "pmid", "idtypen": 1, "value": "456"},
                {"idtype": "doi", "idtypen": 3, "value": "10.1000/example"},
                {"idtype": "pmcid", "idtypen": 5, "value": "PMC123"}
            ]
        },
        "124": {
            "uid": "124",
            "title": "Gelfoam in partial nephrectomy",
            "articleids": [
                {"idtype": "pmid", "idtypen": 1, "value": "0"},
                {"idtype": "pmcid", "idtypen": 5, "value": "PMC124"}
            ]
        },
        "125": {
            "uid": "125",
            "error": "cannot get document summary"
        }
    }
}"#;

fn fast_retry() -> RetryConfig {
    RetryConfig::new()
        .with_max_retries(3)
        .with_initial_delay(Duration::from_millis(10))
        .with_min_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(20))
}

fn client_for(server: &MockServer) -> EntrezClient {
    let config = ClientConfig::new()
        .with_base_url(server.uri())
        .with_rate_limit(100.0)
        .with_retry_config(fast_retry());
    EntrezClient::with_config(config).unwrap()
}

fn handle() -> SearchHandle {
    SearchHandle {
        webenv: "MCID_6710b5d5c0b1d3".to_string(),
        query_key: "1".to_string(),
        total_count: 3,
    }
}

#[tokio::test]
#[traced_test]
async fn test_submit_search_uses_history_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("db", "pmc"))
        .and(query_param("usehistory", "y"))
        .and(query_param("retmode", "json"))
        .and(query_param("term", r#"("Hemoblast") AND ("prostatectomy")"#))
        .respond_with(ResponseTemplate::new(200).set_body_string(ESEARCH_RESPONSE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let handle = client
        .submit_search("pmc", r#"("Hemoblast") AND ("prostatectomy")"#)
        .await
        .unwrap();

    assert_eq!(handle.webenv, "MCID_6710b5d5c0b1d3");
    assert_eq!(handle.query_key, "1");
    assert_eq!(handle.total_count, 2);
}

#[tokio::test]
#[traced_test]
async fn test_fetch_page_reads_summaries_in_uid_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .and(query_param("db", "pmc"))
        .and(query_param("WebEnv", "MCID_6710b5d5c0b1d3"))
        .and(query_param("query_key", "1"))
        .and(query_param("retstart", "0"))
        .and(query_param("retmax", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ESUMMARY_RESPONSE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let records = client.fetch_page("pmc", &handle(), 0, 3).await.unwrap();

    // 125 carries an error and is skipped
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].uid, "123");
    assert_eq!(records[0].article_ids.len(), 3);
    assert_eq!(records[0].article_ids[0].id_type, "pmid");
    assert_eq!(records[0].article_ids[0].value, "456");
    assert_eq!(records[1].uid, "124");
}

#[tokio::test]
async fn test_zero_count_search_needs_no_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"esearchresult": {"count": "0", "idlist": []}}"#),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let handle = client.submit_search("pmc", "nothing").await.unwrap();

    assert!(handle.is_empty());
    assert!(client.fetch_page("pmc", &handle, 0, 100).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_esearch_error_field_is_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"esearchresult": {"ERROR": "Invalid query syntax"}}"#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.submit_search("pmc", "((").await;

    match result {
        Err(RetrievalError::ApiError { status, message }) => {
            assert_eq!(status, 200);
            assert_eq!(message, "Invalid query syntax");
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_session_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"esearchresult": {"count": "7"}}"#),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.submit_search("pmc", "x").await;

    assert!(matches!(result, Err(RetrievalError::InvalidResponse(_))));
}

#[tokio::test]
#[traced_test]
async fn test_server_errors_are_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ESEARCH_RESPONSE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let handle = client.submit_search("pmc", "x").await.unwrap();

    assert_eq!(handle.total_count, 2);
}

#[tokio::test]
async fn test_retries_are_capped() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.fetch_page("pmc", &handle(), 0, 3).await;

    assert!(matches!(
        result,
        Err(RetrievalError::ApiError { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.submit_search("pmc", "x").await;

    assert!(matches!(
        result,
        Err(RetrievalError::ApiError { status: 400, .. })
    ));
}

#[tokio::test]
async fn test_long_url_is_never_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ESEARCH_RESPONSE))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = ClientConfig::new()
        .with_base_url(mock_server.uri())
        .with_max_url_length(200);
    let client = EntrezClient::with_config(config).unwrap();
    let term = "Hemoblast ".repeat(30);

    let result = client.submit_search("pmc", &term).await;
    assert!(matches!(
        result,
        Err(RetrievalError::UrlTooLong { max: 200, .. })
    ));
}

#[tokio::test]
async fn test_credentials_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("api_key", "test_key"))
        .and(query_param("email", "researcher@university.edu"))
        .and(query_param("tool", "pmc-retrieval"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ESEARCH_RESPONSE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ClientConfig::new()
        .with_base_url(mock_server.uri())
        .with_api_key("test_key")
        .with_email("researcher@university.edu")
        .with_retry_config(RetryConfig::no_retry());
    let client = EntrezClient::with_config(config).unwrap();

    client.submit_search("pmc", "x").await.unwrap();
}

#[tokio::test]
async fn test_throttled_requests_are_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(
            ResponseTemplate::new(429).set_body_string(r#"{"error":"API rate limit exceeded"}"#),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ESEARCH_RESPONSE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let handle = client.submit_search("pmc", "x").await.unwrap();

    assert_eq!(handle.webenv, "MCID_6710b5d5c0b1d3");
}
