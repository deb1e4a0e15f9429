//! In-memory object repository for tests and local runs.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::ObjectRepository;
use crate::error::{IngestError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredObject {
    /// (predicate, target) pairs in insertion order
    pub relationships: Vec<(String, String)>,
    pub streams: HashMap<String, Vec<u8>>,
}

/// Repository allocating `<namespace>:<n>` ids from a counter.
pub struct InMemoryRepository {
    namespace: String,
    next_id: AtomicU64,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    failing: RwLock<HashSet<String>>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new("arca")
    }
}

impl InMemoryRepository {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            next_id: AtomicU64::new(1),
            objects: RwLock::new(BTreeMap::new()),
            failing: RwLock::new(HashSet::new()),
        }
    }

    pub async fn object(&self, object_id: &str) -> Option<StoredObject> {
        self.objects.read().await.get(object_id).cloned()
    }

    pub async fn object_ids(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Make `operation` (`allocate_object`, `purge_object`, ...) fail.
    pub async fn fail_on(&self, operation: &str) {
        self.failing.write().await.insert(operation.to_string());
    }

    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
    }

    async fn check(&self, operation: &str) -> Result<()> {
        if self.failing.read().await.contains(operation) {
            return Err(IngestError::repository(format!("{} unavailable", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectRepository for InMemoryRepository {
    async fn allocate_object(&self) -> Result<String> {
        self.check("allocate_object").await?;
        let id = format!(
            "{}:{}",
            self.namespace,
            self.next_id.fetch_add(1, Ordering::SeqCst)
        );
        self.objects
            .write()
            .await
            .insert(id.clone(), StoredObject::default());
        Ok(id)
    }

    async fn add_relationship(&self, object_id: &str, predicate: &str, target: &str) -> Result<()> {
        self.check("add_relationship").await?;
        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(object_id)
            .ok_or_else(|| IngestError::repository_not_found(format!("object {}", object_id)))?;
        object
            .relationships
            .push((predicate.to_string(), target.to_string()));
        Ok(())
    }

    async fn attach_content(&self, object_id: &str, stream_id: &str, bytes: Vec<u8>) -> Result<()> {
        self.check("attach_content").await?;
        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(object_id)
            .ok_or_else(|| IngestError::repository_not_found(format!("object {}", object_id)))?;
        object.streams.insert(stream_id.to_string(), bytes);
        Ok(())
    }

    async fn fetch_content(&self, object_id: &str, stream_id: &str) -> Result<Vec<u8>> {
        self.check("fetch_content").await?;
        self.objects
            .read()
            .await
            .get(object_id)
            .and_then(|object| object.streams.get(stream_id))
            .cloned()
            .ok_or_else(|| {
                IngestError::repository_not_found(format!("stream {} of {}", stream_id, object_id))
            })
    }

    async fn purge_object(&self, object_id: &str) -> Result<()> {
        self.check("purge_object").await?;
        self.objects
            .write()
            .await
            .remove(object_id)
            .map(|_| ())
            .ok_or_else(|| IngestError::repository_not_found(format!("object {}", object_id)))
    }
}
