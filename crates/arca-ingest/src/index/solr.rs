//! Solr-backed status index
//!
//! Documents and transaction commands go to `{core}/update` as JSON; queries
//! go to `{core}/select` with every clause as a quoted term joined by `AND`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{FieldMatch, IndexDocument, StatusIndex};
use crate::config::IndexConfig;
use crate::error::{IngestError, Result};

/// Upper bound on documents returned by one query.
const MAX_ROWS: u32 = 1000;

pub struct SolrIndex {
    client: Client,
    core_url: String,
}

#[derive(Debug, Deserialize)]
struct SelectResponse {
    response: SelectDocs,
}

#[derive(Debug, Deserialize)]
struct SelectDocs {
    docs: Vec<Value>,
}

impl SolrIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IngestError::Index(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            core_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn update_url(&self) -> String {
        format!("{}/update", self.core_url)
    }

    fn select_url(&self) -> String {
        format!("{}/select", self.core_url)
    }

    async fn update(&self, body: Value, what: &str) -> Result<()> {
        self.client
            .post(self.update_url())
            .query(&[("wt", "json")])
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IngestError::Index(format!("{} failed: {}", what, e)))?;
        Ok(())
    }
}

/// Render clauses as a Lucene query, quoting every value.
pub fn query_string(clauses: &[FieldMatch]) -> String {
    if clauses.is_empty() {
        return "*:*".to_string();
    }
    clauses
        .iter()
        .map(|clause| {
            let escaped = clause.value.replace('\\', "\\\\").replace('"', "\\\"");
            format!("{}:\"{}\"", clause.field, escaped)
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[async_trait]
impl StatusIndex for SolrIndex {
    #[instrument(skip(self, document), fields(id = document.id()))]
    async fn add(&self, document: IndexDocument) -> Result<()> {
        self.update(json!([document.into_value()]), "document add")
            .await
    }

    #[instrument(skip(self))]
    async fn commit(&self) -> Result<()> {
        self.update(json!({"commit": {}}), "commit").await
    }

    #[instrument(skip(self))]
    async fn rollback(&self) -> Result<()> {
        self.update(json!({"rollback": {}}), "rollback").await
    }

    #[instrument(skip(self))]
    async fn query(&self, clauses: &[FieldMatch]) -> Result<Vec<Value>> {
        let q = query_string(clauses);
        debug!("Querying index: {}", q);

        let response: SelectResponse = self
            .client
            .get(self.select_url())
            .query(&[("q", q.as_str()), ("wt", "json")])
            .query(&[("rows", MAX_ROWS)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IngestError::Index(format!("query failed: {}", e)))?
            .json()
            .await
            .map_err(|e| IngestError::Index(format!("Unreadable query response: {}", e)))?;

        Ok(response.response.docs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string() {
        let q = query_string(&[
            FieldMatch::new("record_type", "ingest"),
            FieldMatch::new("included_pid", "demo:1"),
        ]);
        assert_eq!(q, r#"record_type:"ingest" AND included_pid:"demo:1""#);
    }

    #[test]
    fn test_query_string_escapes_quotes() {
        let q = query_string(&[FieldMatch::new("title", r#"say "hi""#)]);
        assert_eq!(q, r#"title:"say \"hi\"""#);
        assert_eq!(query_string(&[]), "*:*");
    }
}
