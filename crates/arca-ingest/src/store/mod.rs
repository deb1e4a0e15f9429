//! Content store access
//!
//! The content store is a set of named spaces, each holding opaque content
//! addressed by a content id. Staging spaces receive uploads; the
//! institution's production space receives content once it is ingested.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

pub mod memory;
pub mod s3;

pub use memory::InMemoryContentStore;
pub use s3::S3ContentStore;

/// Property holding the content length in bytes.
pub const CONTENT_SIZE: &str = "content-size";

/// Property holding `|`-separated content tags.
pub const TAGS: &str = "tags";

const TAG_SEPARATOR: char = '|';

/// String properties attached to a piece of content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentProperties(HashMap<String, String>);

impl ContentProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Content length, when the store reported a parseable one.
    pub fn size(&self) -> Option<u64> {
        self.get(CONTENT_SIZE).and_then(|s| s.trim().parse().ok())
    }

    /// Tags split on the literal separator, empty entries dropped.
    pub fn tags(&self) -> Vec<&str> {
        self.get(TAGS)
            .map(|tags| {
                tags.split(TAG_SEPARATOR)
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().contains(&tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<HashMap<String, String>> for ContentProperties {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

/// Bytes of a piece of content together with its properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub bytes: Vec<u8>,
    pub properties: ContentProperties,
}

/// Access to the spaces of a content store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_content(&self, space_id: &str, content_id: &str) -> Result<Content>;

    async fn get_content_properties(
        &self,
        space_id: &str,
        content_id: &str,
    ) -> Result<ContentProperties>;

    async fn copy_content(
        &self,
        source_space_id: &str,
        source_content_id: &str,
        dest_space_id: &str,
        dest_content_id: &str,
    ) -> Result<()>;

    async fn delete_content(&self, space_id: &str, content_id: &str) -> Result<()>;

    /// Copy then delete the source. Not atomic: a failed delete leaves both.
    async fn move_content(
        &self,
        source_space_id: &str,
        source_content_id: &str,
        dest_space_id: &str,
        dest_content_id: &str,
    ) -> Result<()> {
        self.copy_content(source_space_id, source_content_id, dest_space_id, dest_content_id)
            .await?;
        self.delete_content(source_space_id, source_content_id).await
    }
}
