//! In-memory status index for tests and local runs.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use tokio::sync::RwLock;

use super::{fields, FieldMatch, IndexDocument, StatusIndex};
use crate::error::{IngestError, Result};

#[derive(Default)]
struct IndexState {
    /// Committed documents in first-insertion order
    committed: Vec<Value>,
    pending: Vec<IndexDocument>,
    /// Every committed version, oldest first
    history: Vec<Value>,
}

/// Transactional index over a vector of JSON documents.
#[derive(Default)]
pub struct InMemoryIndex {
    state: RwLock<IndexState>,
    failing: RwLock<HashSet<String>>,
}

fn value_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        Value::Bool(b) => b.to_string() == expected,
        Value::Array(values) => values.iter().any(|v| value_matches(v, expected)),
        _ => false,
    }
}

fn document_id(document: &Value) -> Option<&str> {
    document.get(fields::ID).and_then(Value::as_str)
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed document with `id`, if any.
    pub async fn get(&self, id: &str) -> Option<Value> {
        self.state
            .read()
            .await
            .committed
            .iter()
            .find(|doc| document_id(doc) == Some(id))
            .cloned()
    }

    /// Every committed version of the document with `id`, oldest first.
    pub async fn history(&self, id: &str) -> Vec<Value> {
        self.state
            .read()
            .await
            .history
            .iter()
            .filter(|doc| document_id(doc) == Some(id))
            .cloned()
            .collect()
    }

    pub async fn pending_count(&self) -> usize {
        self.state.read().await.pending.len()
    }

    /// Make `operation` (`add`, `commit`, `rollback`, `query`) fail.
    pub async fn fail_on(&self, operation: &str) {
        self.failing.write().await.insert(operation.to_string());
    }

    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
    }

    async fn check(&self, operation: &str) -> Result<()> {
        if self.failing.read().await.contains(operation) {
            return Err(IngestError::Index(format!("{} unavailable", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl StatusIndex for InMemoryIndex {
    async fn add(&self, document: IndexDocument) -> Result<()> {
        self.check("add").await?;
        self.state.write().await.pending.push(document);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.check("commit").await?;
        let mut state = self.state.write().await;
        let pending = std::mem::take(&mut state.pending);

        for document in pending {
            let id = document.id().to_string();
            let value = document.into_value();
            state.history.push(value.clone());
            let existing = state
                .committed
                .iter()
                .position(|doc| document_id(doc) == Some(id.as_str()));
            match existing {
                Some(position) => state.committed[position] = value,
                None => state.committed.push(value),
            }
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.check("rollback").await?;
        self.state.write().await.pending.clear();
        Ok(())
    }

    async fn query(&self, clauses: &[FieldMatch]) -> Result<Vec<Value>> {
        self.check("query").await?;
        Ok(self
            .state
            .read()
            .await
            .committed
            .iter()
            .filter(|doc| {
                clauses.iter().all(|clause| {
                    doc.get(&clause.field)
                        .is_some_and(|value| value_matches(value, &clause.value))
                })
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> IndexDocument {
        IndexDocument::from_record(&value).unwrap()
    }

    #[tokio::test]
    async fn test_documents_visible_after_commit() {
        let index = InMemoryIndex::new();
        index.add(doc(json!({"id": "arca:1", "record_type": "ingest"}))).await.unwrap();

        assert!(index.get("arca:1").await.is_none());
        index.commit().await.unwrap();
        assert!(index.get("arca:1").await.is_some());
    }

    #[tokio::test]
    async fn test_rollback_discards_pending() {
        let index = InMemoryIndex::new();
        index.add(doc(json!({"id": "arca:1"}))).await.unwrap();
        index.rollback().await.unwrap();
        index.commit().await.unwrap();

        assert!(index.get("arca:1").await.is_none());
        assert_eq!(index.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_replaces_by_id() {
        let index = InMemoryIndex::new();
        index.add(doc(json!({"id": "arca:1", "completed_object_count": 0}))).await.unwrap();
        index.commit().await.unwrap();
        index.add(doc(json!({"id": "arca:1", "completed_object_count": 1}))).await.unwrap();
        index.commit().await.unwrap();

        assert_eq!(index.get("arca:1").await.unwrap()["completed_object_count"], json!(1));
        assert_eq!(index.history("arca:1").await.len(), 2);
    }

    #[tokio::test]
    async fn test_query_matches_array_membership() {
        let index = InMemoryIndex::new();
        index
            .add(doc(json!({
                "id": "arca:1",
                "operation_status": "IN_PROGRESS",
                "included_pid": ["demo:1", "demo:2"]
            })))
            .await
            .unwrap();
        index.add(doc(json!({"id": "arca:2", "operation_status": "FAILED"}))).await.unwrap();
        index.commit().await.unwrap();

        let hits = index
            .query(&[
                FieldMatch::new("operation_status", "IN_PROGRESS"),
                FieldMatch::new("included_pid", "demo:2"),
            ])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["id"], json!("arca:1"));

        let none = index.query(&[FieldMatch::new("included_pid", "demo:3")]).await.unwrap();
        assert!(none.is_empty());
    }
}
