//! Chunk manifests
//!
//! Large content is uploaded in chunks. The chunks arrive under their own
//! content ids next to a manifest stored as `<content id>.dura-manifest`:
//!
//! ```xml
//! <dur:chunksManifest xmlns:dur="duracloud.org">
//!   <header schemaVersion="0.2">
//!     <sourceContent contentId="demo:1+IMAGE+IMAGE.0">
//!       <byteSize>2048</byteSize>
//!     </sourceContent>
//!   </header>
//!   <chunks>
//!     <chunk chunkId="demo:1+IMAGE+IMAGE.0.dura-chunk-0000" index="0">
//!       <byteSize>1024</byteSize>
//!     </chunk>
//!   </chunks>
//! </dur:chunksManifest>
//! ```

use quick_xml::events::Event;
use quick_xml::Reader;

use super::attribute;
use crate::error::{IngestError, Result};

/// Suffix appended to a content id to name its chunk manifest.
pub const CHUNK_MANIFEST_SUFFIX: &str = ".dura-manifest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub byte_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkManifest {
    /// Content id of the reassembled content, when the header names it
    pub source_content_id: Option<String>,
    pub chunks: Vec<Chunk>,
}

impl ChunkManifest {
    /// Content id a chunk manifest describes, if `content_id` names one.
    pub fn target_of(content_id: &str) -> Option<&str> {
        content_id.strip_suffix(CHUNK_MANIFEST_SUFFIX)
    }

    pub fn from_xml(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();

        let mut source_content_id = None;
        let mut chunks = Vec::new();
        let mut chunk: Option<(String, Option<u64>)> = None;
        let mut in_byte_size = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"sourceContent" => source_content_id = attribute(&e, b"contentId")?,
                    b"chunk" => {
                        let id = attribute(&e, b"chunkId")?.ok_or_else(|| {
                            IngestError::Parse("Chunk without chunkId".to_string())
                        })?;
                        chunk = Some((id, None));
                    }
                    b"byteSize" => in_byte_size = chunk.is_some(),
                    _ => {}
                },
                Ok(Event::Text(text)) if in_byte_size => {
                    let value = text.unescape().map_err(IngestError::parse)?;
                    let size = value.trim().parse::<u64>().map_err(|e| {
                        IngestError::Parse(format!("Invalid chunk size {:?}: {}", value, e))
                    })?;
                    if let Some((_, byte_size)) = chunk.as_mut() {
                        *byte_size = Some(size);
                    }
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"byteSize" => in_byte_size = false,
                    b"chunk" => {
                        if let Some((chunk_id, byte_size)) = chunk.take() {
                            let byte_size = byte_size.ok_or_else(|| {
                                IngestError::Parse(format!("Chunk {} has no byteSize", chunk_id))
                            })?;
                            chunks.push(Chunk { chunk_id, byte_size });
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(IngestError::Parse(format!("Invalid chunk manifest: {}", e))),
                _ => {}
            }
            buf.clear();
        }

        if chunks.is_empty() {
            return Err(IngestError::Parse("Chunk manifest lists no chunks".to_string()));
        }

        Ok(Self {
            source_content_id,
            chunks,
        })
    }
}
