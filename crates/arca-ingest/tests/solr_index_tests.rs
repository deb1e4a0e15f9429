//! HTTP tests for the Solr status index

#![allow(clippy::unwrap_used, clippy::expect_used)]

use arca_ingest::config::IndexConfig;
use arca_ingest::index::{FieldMatch, IndexDocument, SolrIndex, StatusIndex};
use serde_json::json;
use wiremock::{
    matchers::{body_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn index(server: &MockServer) -> SolrIndex {
    SolrIndex::new(&IndexConfig {
        url: format!("{}/solr/arca", server.uri()),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn test_add_then_commit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/solr/arca/update"))
        .and(query_param("wt", "json"))
        .and(body_json(json!([{
            "id": "arca:1",
            "record_type": "ingest",
            "operation_status": "IN_PROGRESS"
        }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responseHeader": {"status": 0}})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/solr/arca/update"))
        .and(body_json(json!({"commit": {}})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let index = index(&server);
    let document = IndexDocument::from_record(&json!({
        "id": "arca:1",
        "record_type": "ingest",
        "operation_status": "IN_PROGRESS",
        "message": null
    }))
    .unwrap();

    index.add(document).await.unwrap();
    index.commit().await.unwrap();
}

#[tokio::test]
async fn test_rollback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/solr/arca/update"))
        .and(body_json(json!({"rollback": {}})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    index(&server).rollback().await.unwrap();
}

#[tokio::test]
async fn test_update_failure_is_an_index_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/solr/arca/update"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let error = index(&server).commit().await.unwrap_err();
    assert!(matches!(error, arca_ingest::IngestError::Index(_)));
}

#[tokio::test]
async fn test_query_returns_documents() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/solr/arca/select"))
        .and(query_param(
            "q",
            r#"record_type:"ingest" AND included_pid:"demo:1""#,
        ))
        .and(query_param("wt", "json"))
        .and(query_param("rows", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responseHeader": {"status": 0},
            "response": {
                "numFound": 1,
                "start": 0,
                "docs": [{"id": "arca:1", "included_pid": ["demo:1", "demo:2"]}]
            }
        })))
        .mount(&server)
        .await;

    let docs = index(&server)
        .query(&[
            FieldMatch::new("record_type", "ingest"),
            FieldMatch::new("included_pid", "demo:1"),
        ])
        .await
        .unwrap();

    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["id"], json!("arca:1"));
}

#[tokio::test]
async fn test_unreadable_query_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/solr/arca/select"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .mount(&server)
        .await;

    let error = index(&server).query(&[]).await.unwrap_err();
    assert!(error.to_string().contains("Unreadable query response"));
}
