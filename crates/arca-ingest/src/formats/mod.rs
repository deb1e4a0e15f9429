//! Package formats read and written by the engine
//!
//! - [`manifest`]: the ingest manifest declaring packages and their objects
//! - [`descriptor`]: FOXML object descriptors listing managed content streams
//! - [`chunk`]: chunk manifests for content uploaded in pieces
//! - [`aip`]: zipped archival packages identified by their METS document

use quick_xml::events::BytesStart;

use crate::error::{IngestError, Result};

pub mod aip;
pub mod chunk;
pub mod descriptor;
pub mod manifest;

pub use aip::aip_object_id;
pub use chunk::{ChunkManifest, CHUNK_MANIFEST_SUFFIX};
pub use descriptor::{ManagedStream, ObjectDescriptor};
pub use manifest::{IngestManifest, IngestPackage, PackageMetadata};

/// Value of the attribute whose local name is `name`, unescaped.
pub(crate) fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(IngestError::parse)?;
        if attr.key.local_name().as_ref() == name {
            let value = attr.unescape_value().map_err(IngestError::parse)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
