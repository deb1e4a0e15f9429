//! In-memory content store for tests and local runs.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use super::{Content, ContentProperties, ContentStore, CONTENT_SIZE, TAGS};
use crate::error::{IngestError, Result};

/// Content store keeping every space in a map.
///
/// Operations named through [`fail_on`](Self::fail_on) return an error until
/// cleared, which lets tests drive failure paths.
#[derive(Default)]
pub struct InMemoryContentStore {
    spaces: RwLock<BTreeMap<(String, String), Content>>,
    failing: RwLock<HashSet<String>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes`, recording `content-size` from their length.
    pub async fn put(&self, space_id: &str, content_id: &str, bytes: impl Into<Vec<u8>>) {
        self.put_with(space_id, content_id, bytes, ContentProperties::new())
            .await;
    }

    /// Store `bytes` tagged with the given tags.
    pub async fn put_tagged(
        &self,
        space_id: &str,
        content_id: &str,
        bytes: impl Into<Vec<u8>>,
        tags: &[&str],
    ) {
        let properties = ContentProperties::new().with(TAGS, tags.join("|"));
        self.put_with(space_id, content_id, bytes, properties).await;
    }

    /// Store `bytes` with explicit properties. `content-size` is filled in
    /// from the length unless already present.
    pub async fn put_with(
        &self,
        space_id: &str,
        content_id: &str,
        bytes: impl Into<Vec<u8>>,
        mut properties: ContentProperties,
    ) {
        let bytes = bytes.into();
        if properties.get(CONTENT_SIZE).is_none() {
            properties.insert(CONTENT_SIZE, bytes.len().to_string());
        }
        self.spaces
            .write()
            .await
            .insert((space_id.to_string(), content_id.to_string()), Content { bytes, properties });
    }

    pub async fn contains(&self, space_id: &str, content_id: &str) -> bool {
        self.spaces
            .read()
            .await
            .contains_key(&(space_id.to_string(), content_id.to_string()))
    }

    /// Content ids currently held in a space, sorted.
    pub async fn content_ids(&self, space_id: &str) -> Vec<String> {
        self.spaces
            .read()
            .await
            .keys()
            .filter(|(space, _)| space == space_id)
            .map(|(_, content_id)| content_id.clone())
            .collect()
    }

    /// Make `operation` (`get_content`, `copy_content`, ...) fail.
    pub async fn fail_on(&self, operation: &str) {
        self.failing.write().await.insert(operation.to_string());
    }

    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
    }

    async fn check(&self, operation: &str, space_id: &str, content_id: &str) -> Result<()> {
        if self.failing.read().await.contains(operation) {
            return Err(IngestError::store(
                space_id,
                content_id,
                format!("{} unavailable", operation),
            ));
        }
        Ok(())
    }

    async fn lookup(&self, space_id: &str, content_id: &str) -> Result<Content> {
        self.spaces
            .read()
            .await
            .get(&(space_id.to_string(), content_id.to_string()))
            .cloned()
            .ok_or_else(|| IngestError::store_not_found(space_id, content_id))
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn get_content(&self, space_id: &str, content_id: &str) -> Result<Content> {
        self.check("get_content", space_id, content_id).await?;
        self.lookup(space_id, content_id).await
    }

    async fn get_content_properties(
        &self,
        space_id: &str,
        content_id: &str,
    ) -> Result<ContentProperties> {
        self.check("get_content_properties", space_id, content_id)
            .await?;
        Ok(self.lookup(space_id, content_id).await?.properties)
    }

    async fn copy_content(
        &self,
        source_space_id: &str,
        source_content_id: &str,
        dest_space_id: &str,
        dest_content_id: &str,
    ) -> Result<()> {
        self.check("copy_content", source_space_id, source_content_id)
            .await?;
        let content = self.lookup(source_space_id, source_content_id).await?;
        self.spaces
            .write()
            .await
            .insert((dest_space_id.to_string(), dest_content_id.to_string()), content);
        Ok(())
    }

    async fn delete_content(&self, space_id: &str, content_id: &str) -> Result<()> {
        self.check("delete_content", space_id, content_id).await?;
        self.spaces
            .write()
            .await
            .remove(&(space_id.to_string(), content_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| IngestError::store_not_found(space_id, content_id))
    }
}
