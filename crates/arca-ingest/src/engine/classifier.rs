//! Content classification
//!
//! Decides which object a staged piece of content belongs to. Two content
//! models are recognized: repository objects, whose pieces follow the
//! `<namespace>:<local id>(+<datastream>+<version>)` naming convention, and
//! zipped AIPs, which carry their object id in an embedded METS document.

use regex::Regex;
use tracing::trace;

use crate::error::{IngestError, Result};
use crate::formats::aip_object_id;
use crate::store::{ContentProperties, ContentStore};

const REPOSITORY_OBJECT_PATTERN: &str =
    r"^((?:[A-Za-z0-9.-])+:(?:[A-Za-z0-9.~_-]|%[0-9A-F]{2})+)(?:\+.*)?$";

const AIP_ARCHIVE_PATTERN: &str = r"(?i)^.*\.zip$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// One piece of a repository object
    RepositoryObject,
    /// A self-contained archival package
    AipPackage,
}

/// A piece of staged content attributed to an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedContentReference {
    pub content_id: String,
    pub object_id: String,
    pub size: u64,
    pub kind: ContentKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Recognized(RecognizedContentReference),
    Unrecognized,
}

pub struct ContentClassifier {
    repository_object: Regex,
    aip_archive: Regex,
}

impl ContentClassifier {
    pub fn new() -> Result<Self> {
        Ok(Self {
            repository_object: Regex::new(REPOSITORY_OBJECT_PATTERN).map_err(IngestError::parse)?,
            aip_archive: Regex::new(AIP_ARCHIVE_PATTERN).map_err(IngestError::parse)?,
        })
    }

    /// The content model a content id follows, judged by name alone.
    pub fn kind_of(&self, content_id: &str) -> Option<ContentKind> {
        if self.repository_object.is_match(content_id) {
            Some(ContentKind::RepositoryObject)
        } else if self.aip_archive.is_match(content_id) {
            Some(ContentKind::AipPackage)
        } else {
            None
        }
    }

    /// Object id of a repository-object piece: everything before the first `+`.
    pub fn repository_object_id<'a>(&self, content_id: &'a str) -> Option<&'a str> {
        self.repository_object
            .captures(content_id)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    }

    /// Attribute a staged piece of content to its object.
    ///
    /// `properties` are the content's store properties as already fetched by
    /// the caller. Only AIPs are read from the store.
    pub async fn classify(
        &self,
        store: &dyn ContentStore,
        space_id: &str,
        content_id: &str,
        properties: &ContentProperties,
    ) -> Result<Classification> {
        let Some(kind) = self.kind_of(content_id) else {
            return Ok(Classification::Unrecognized);
        };

        let object_id = kind.identify(self, store, space_id, content_id).await?;

        let size = properties.size().ok_or_else(|| IngestError::Classification {
            content_id: content_id.to_string(),
            message: "content store reported no size".to_string(),
        })?;

        trace!(content_id, object_id = %object_id, size, ?kind, "classified content");

        Ok(Classification::Recognized(RecognizedContentReference {
            content_id: content_id.to_string(),
            object_id,
            size,
            kind,
        }))
    }
}

impl ContentKind {
    /// Kind-specific object id extraction.
    async fn identify(
        self,
        classifier: &ContentClassifier,
        store: &dyn ContentStore,
        space_id: &str,
        content_id: &str,
    ) -> Result<String> {
        match self {
            ContentKind::RepositoryObject => classifier
                .repository_object_id(content_id)
                .map(str::to_string)
                .ok_or_else(|| IngestError::Classification {
                    content_id: content_id.to_string(),
                    message: "no object id in content id".to_string(),
                }),
            ContentKind::AipPackage => {
                let content = store.get_content(space_id, content_id).await?;
                aip_object_id(&content.bytes).map_err(|e| IngestError::Classification {
                    content_id: content_id.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Whether the content's tags mark it as an ingest manifest.
pub fn is_manifest(properties: &ContentProperties, manifest_tag: &str) -> bool {
    properties.has_tag(manifest_tag)
}
