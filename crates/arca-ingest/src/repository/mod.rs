//! Object repository access
//!
//! The repository stores ingest records, packages and ingested objects,
//! addressed by ids it allocates. Relationships are RDF-style triples whose
//! subject is the object itself.

use async_trait::async_trait;

use crate::error::Result;

pub mod memory;
pub mod rest;

pub use memory::InMemoryRepository;
pub use rest::RestRepository;

/// Links an object to the content model it conforms to.
pub const HAS_MODEL: &str = "info:fedora/fedora-system:def/model#hasModel";

/// Links a package to each object it contains.
pub const HAS_PART: &str = "info:fedora/fedora-system:def/relations-external#hasPart";

/// URI form of a repository id, used as a relationship target.
pub fn object_uri(object_id: &str) -> String {
    format!("info:fedora/{}", object_id)
}

#[async_trait]
pub trait ObjectRepository: Send + Sync {
    /// Allocate a new, empty object and return its id.
    async fn allocate_object(&self) -> Result<String>;

    async fn add_relationship(&self, object_id: &str, predicate: &str, target: &str) -> Result<()>;

    /// Create or replace the named stream of an object.
    async fn attach_content(&self, object_id: &str, stream_id: &str, bytes: Vec<u8>) -> Result<()>;

    async fn fetch_content(&self, object_id: &str, stream_id: &str) -> Result<Vec<u8>>;

    /// Remove an object with all of its streams and relationships.
    async fn purge_object(&self, object_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_uri() {
        assert_eq!(object_uri("arca:12"), "info:fedora/arca:12");
    }
}
