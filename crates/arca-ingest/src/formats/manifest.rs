//! Ingest manifest
//!
//! A manifest names the packages a depositor is submitting and the objects
//! in each. On disk it is XML:
//!
//! ```xml
//! <ingestManifest>
//!   <id>arca:12</id>
//!   <description>
//!     <name>Spring deposit</name>
//!     <suppliedUsername>jdoe</suppliedUsername>
//!     <ingestInitiated>2024-03-01T12:00:00Z</ingestInitiated>
//!   </description>
//!   <packages>
//!     <package>
//!       <metadata>
//!         <title>Letters</title>
//!       </metadata>
//!       <digitalObjects>
//!         <digitalObject id="demo:1"/>
//!       </digitalObjects>
//!     </package>
//!   </packages>
//! </ingestManifest>
//! ```
//!
//! `id` is absent in the staged file and filled in with the allocated
//! ingest record id once registered. A package without an id is new.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

const ROOT_ELEMENT: &str = "ingestManifest";
const METADATA_ROOT_ELEMENT: &str = "packageMetadata";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub description: Description,

    #[serde(default)]
    packages: PackageList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    pub name: String,

    #[serde(default)]
    pub supplied_username: String,

    #[serde(default = "Utc::now")]
    pub ingest_initiated: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct PackageList {
    #[serde(rename = "package", default)]
    items: Vec<IngestPackage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestPackage {
    pub metadata: PackageMetadata,

    #[serde(default)]
    digital_objects: ObjectList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ObjectList {
    #[serde(rename = "digitalObject", default)]
    items: Vec<DigitalObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct DigitalObject {
    #[serde(rename = "@id")]
    id: String,
}

/// Descriptive metadata of a package, also stored as its `metadata` stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl IngestManifest {
    pub fn new(name: impl Into<String>, supplied_username: impl Into<String>, packages: Vec<IngestPackage>) -> Self {
        Self {
            id: None,
            description: Description {
                name: name.into(),
                supplied_username: supplied_username.into(),
                ingest_initiated: Utc::now(),
            },
            packages: PackageList { items: packages },
        }
    }

    pub fn from_xml(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| IngestError::Parse(format!("Manifest is not UTF-8: {}", e)))?;
        quick_xml::de::from_str(text)
            .map_err(|e| IngestError::Parse(format!("Invalid ingest manifest: {}", e)))
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        quick_xml::se::to_string_with_root(ROOT_ELEMENT, self)
            .map(String::into_bytes)
            .map_err(|e| IngestError::Parse(format!("Unable to serialize manifest: {}", e)))
    }

    pub fn packages(&self) -> &[IngestPackage] {
        &self.packages.items
    }

    pub fn packages_mut(&mut self) -> &mut [IngestPackage] {
        &mut self.packages.items
    }

    /// Object ids across all packages, in declaration order.
    pub fn object_ids(&self) -> impl Iterator<Item = &str> {
        self.packages().iter().flat_map(IngestPackage::object_ids)
    }

    pub fn total_objects(&self) -> u64 {
        self.packages()
            .iter()
            .map(|p| p.digital_objects.items.len() as u64)
            .sum()
    }

    pub fn package_for(&self, object_id: &str) -> Option<&IngestPackage> {
        self.packages()
            .iter()
            .find(|p| p.object_ids().any(|id| id == object_id))
    }

    /// Ids of packages that already carry one.
    pub fn package_ids(&self) -> Vec<&str> {
        self.packages()
            .iter()
            .filter_map(|p| p.metadata.id.as_deref())
            .collect()
    }
}

impl IngestPackage {
    pub fn new(metadata: PackageMetadata, object_ids: &[&str]) -> Self {
        Self {
            metadata,
            digital_objects: ObjectList {
                items: object_ids
                    .iter()
                    .map(|id| DigitalObject { id: id.to_string() })
                    .collect(),
            },
        }
    }

    pub fn object_ids(&self) -> impl Iterator<Item = &str> {
        self.digital_objects.items.iter().map(|o| o.id.as_str())
    }

    pub fn is_new(&self) -> bool {
        self.metadata.id.is_none()
    }
}

impl PackageMetadata {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        quick_xml::se::to_string_with_root(METADATA_ROOT_ELEMENT, self)
            .map(String::into_bytes)
            .map_err(|e| IngestError::Parse(format!("Unable to serialize package metadata: {}", e)))
    }
}
