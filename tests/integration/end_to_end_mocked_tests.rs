//! Full retrieval runs through EntrezClient against a mocked E-utilities server

use pmc_retrieval::{
    BatchRetriever, ClientConfig, EntrezClient, RetrievalMode, RetryConfig, SearchConfig, compose,
};
use tracing_test::traced_test;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ESEARCH_RESPONSE: &str = r#"{
    "esearchresult": {
        "count": "2",
        "querykey": "1",
        "webenv": "MCID_e2e",
        "idlist": []
    }
}"#;

const ESUMMARY_RESPONSE: &str = r#"{
    "result": {
        "uids": ["123", "124"],
        "123": {
            "uid": "123",
            "articleids": [
                {"idtype": "pmid", "value": "456"},
                {"idtype": "pmcid", "value": "PMC123"}
            ]
        },
        "124": {
            "uid": "124",
            "articleids": [
                {"idtype": "pmcid", "value": "PMC124"}
            ]
        }
    }
}"#;

async fn mock_eutils(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("db", "pmc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ESEARCH_RESPONSE))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .and(query_param("WebEnv", "MCID_e2e"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ESUMMARY_RESPONSE))
        .mount(server)
        .await;
}

fn client_for(server: &MockServer, max_url_length: usize) -> EntrezClient {
    let config = ClientConfig::new()
        .with_base_url(server.uri())
        .with_rate_limit(100.0)
        .with_max_url_length(max_url_length)
        .with_retry_config(RetryConfig::no_retry());
    EntrezClient::with_config(config).unwrap()
}

#[test]
fn test_composed_query_text() {
    assert_eq!(
        compose(
            &["Hemoblast", "Gelfoam"],
            &["urological surgery", "prostatectomy"],
            None
        ),
        r#"("Hemoblast" OR "Gelfoam") AND ("urological surgery" OR "prostatectomy")"#
    );
}

#[tokio::test]
#[traced_test]
async fn test_single_request_end_to_end() {
    let mock_server = MockServer::start().await;
    mock_eutils(&mock_server).await;

    let retriever = BatchRetriever::new(client_for(&mock_server, 2000));
    let outcome = retriever
        .search_with_report(
            &["Hemoblast", "Gelfoam"],
            &["urological surgery", "prostatectomy"],
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.mode, RetrievalMode::Single);
    assert_eq!(outcome.expected_records, 2);
    assert_eq!(outcome.retrieved_records, 2);

    let json = serde_json::to_value(&outcome.results).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"pmcid": "PMC123", "pmid": "456"},
            {"pmcid": "PMC124", "pmid": null}
        ])
    );
}

#[tokio::test]
#[traced_test]
async fn test_batched_run_deduplicates_across_batches() {
    let mock_server = MockServer::start().await;
    mock_eutils(&mock_server).await;

    let config = SearchConfig::new().with_batch_budget(200);
    let retriever = BatchRetriever::with_config(client_for(&mock_server, 500), config);

    let devices = vec!["Hemoblast"; 20];
    let indicators = vec!["prostatectomy"; 20];
    let outcome = retriever
        .search_with_report(&devices, &indicators, None)
        .await
        .unwrap();

    assert_eq!(outcome.mode, RetrievalMode::Batched);
    assert!(outcome.batch_count > 1);
    assert_eq!(outcome.failed_batches, 0);
    assert_eq!(outcome.retrieved_records, 2 * outcome.batch_count);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[0].pmcid, "PMC123");
}

#[tokio::test]
async fn test_unavailable_service_yields_empty_results() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let retriever = BatchRetriever::new(client_for(&mock_server, 2000));
    let outcome = retriever
        .search_with_report(&["Floseal"], &["cystectomy"], None)
        .await
        .unwrap();

    assert!(outcome.results.is_empty());
    assert_eq!(outcome.failed_batches, 1);
}

#[cfg(feature = "integration-tests")]
mod live {
    use super::*;

    /// Hits the real NCBI service; run with `--features integration-tests`
    #[tokio::test]
    #[traced_test]
    async fn test_live_search() {
        let client = EntrezClient::with_config(ClientConfig::from_env()).unwrap();
        let retriever = BatchRetriever::new(client);

        let outcome = retriever
            .search_with_report(
                &["Hemoblast", "Gelfoam"],
                &["prostatectomy"],
                Some(pmc_retrieval::DateRange::between(2020, 2024)),
            )
            .await
            .unwrap();

        assert!(outcome.results.iter().all(|r| r.pmcid.starts_with("PMC")));
    }
}
