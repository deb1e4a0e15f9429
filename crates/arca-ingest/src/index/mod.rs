//! Status index access
//!
//! The index is a transactional document store: documents added since the
//! last commit become visible on commit and are discarded on rollback.
//! Queries are conjunctions of field matches; a multi-valued field matches
//! when any of its values does.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{IngestError, Result};

pub mod memory;
pub mod solr;

pub use memory::InMemoryIndex;
pub use solr::SolrIndex;

/// Field names shared by every record written to the index.
pub mod fields {
    pub const ID: &str = "id";
    pub const RECORD_TYPE: &str = "record_type";
    pub const INSTITUTION_ID: &str = "institution_id";
    pub const OPERATION_STATUS: &str = "operation_status";
    pub const INCLUDED_PID: &str = "included_pid";
}

/// A single `field = value` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    pub field: String,
    pub value: String,
}

impl FieldMatch {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A record ready to be indexed, keyed by its `id` field.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    id: String,
    fields: Map<String, Value>,
}

impl IndexDocument {
    /// Convert any record that serializes to a JSON object with a string
    /// `id`. Null fields are dropped.
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self> {
        let value = serde_json::to_value(record)
            .map_err(|e| IngestError::Index(format!("Unserializable record: {}", e)))?;

        let Value::Object(mut fields) = value else {
            return Err(IngestError::Index("Index records must be objects".to_string()));
        };
        fields.retain(|_, v| !v.is_null());

        let id = match fields.get(fields::ID) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            _ => return Err(IngestError::Index("Index records need a string id".to_string())),
        };

        Ok(Self { id, fields })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

#[async_trait]
pub trait StatusIndex: Send + Sync {
    /// Stage a document; replaces any document with the same id on commit.
    async fn add(&self, document: IndexDocument) -> Result<()>;

    async fn commit(&self) -> Result<()>;

    /// Discard everything staged since the last commit.
    async fn rollback(&self) -> Result<()>;

    /// Committed documents matching every clause.
    async fn query(&self, clauses: &[FieldMatch]) -> Result<Vec<Value>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_record_drops_nulls() {
        let document =
            IndexDocument::from_record(&json!({"id": "arca:1", "title": null, "object_count": 2}))
                .unwrap();
        assert_eq!(document.id(), "arca:1");
        assert!(!document.fields().contains_key("title"));
        assert_eq!(document.fields()["object_count"], json!(2));
    }

    #[test]
    fn test_from_record_requires_id() {
        assert!(IndexDocument::from_record(&json!({"title": "x"})).is_err());
        assert!(IndexDocument::from_record(&json!({"id": 4})).is_err());
        assert!(IndexDocument::from_record(&json!(["arca:1"])).is_err());
    }
}
