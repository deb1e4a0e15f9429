//! Object descriptors
//!
//! A repository object arrives as a FOXML descriptor (content id equal to the
//! object id) plus one piece per managed datastream version, uploaded under
//! `<object id>+<datastream id>+<version id>`. Only managed streams
//! (`CONTROL_GROUP="M"`) are uploaded separately; inline and external
//! streams travel inside the descriptor or are referenced by URL.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::attribute;
use crate::error::{IngestError, Result};

const MANAGED_CONTROL_GROUP: &str = "M";

/// A managed datastream version the object needs before it is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedStream {
    pub datastream_id: String,
    pub version_id: String,
    /// Content id the stream is uploaded under
    pub content_id: String,
    /// `None` when the descriptor gives no usable size
    pub expected_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub object_id: String,
    pub streams: Vec<ManagedStream>,
}

impl ObjectDescriptor {
    pub fn from_foxml(object_id: &str, bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();

        let mut streams = Vec::new();
        // (datastream id, managed?) of the enclosing datastream element
        let mut current: Option<(String, bool)> = None;
        let mut saw_root = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"digitalObject" => saw_root = true,
                    b"datastream" => {
                        let id = attribute(&e, b"ID")?.ok_or_else(|| {
                            IngestError::Parse(format!("Datastream without ID in {}", object_id))
                        })?;
                        let managed = attribute(&e, b"CONTROL_GROUP")?.as_deref()
                            == Some(MANAGED_CONTROL_GROUP);
                        current = Some((id, managed));
                    }
                    b"datastreamVersion" => {
                        if let Some((datastream_id, true)) = &current {
                            let version_id = attribute(&e, b"ID")?.ok_or_else(|| {
                                IngestError::Parse(format!(
                                    "Version of {} without ID in {}",
                                    datastream_id, object_id
                                ))
                            })?;
                            let expected_size = attribute(&e, b"SIZE")?
                                .and_then(|size| size.trim().parse::<i64>().ok())
                                .and_then(|size| u64::try_from(size).ok());

                            streams.push(ManagedStream {
                                content_id: format!("{}+{}+{}", object_id, datastream_id, version_id),
                                datastream_id: datastream_id.clone(),
                                version_id,
                                expected_size,
                            });
                        }
                    }
                    _ => {}
                },
                Ok(Event::End(e)) if e.local_name().as_ref() == b"datastream" => current = None,
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(IngestError::Parse(format!(
                        "Invalid object descriptor for {} at position {}: {}",
                        object_id,
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        if !saw_root {
            return Err(IngestError::Parse(format!(
                "{} is not an object descriptor",
                object_id
            )));
        }

        Ok(Self {
            object_id: object_id.to_string(),
            streams,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const FOXML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<foxml:digitalObject VERSION="1.1" PID="demo:1" xmlns:foxml="info:fedora/fedora-system:def/foxml#">
  <foxml:objectProperties>
    <foxml:property NAME="info:fedora/fedora-system:def/model#state" VALUE="Active"/>
  </foxml:objectProperties>
  <foxml:datastream ID="DC" STATE="A" CONTROL_GROUP="X" VERSIONABLE="true">
    <foxml:datastreamVersion ID="DC1.0" MIMETYPE="text/xml" SIZE="300">
      <foxml:xmlContent><dc/></foxml:xmlContent>
    </foxml:datastreamVersion>
  </foxml:datastream>
  <foxml:datastream ID="IMAGE" STATE="A" CONTROL_GROUP="M" VERSIONABLE="true">
    <foxml:datastreamVersion ID="IMAGE.0" MIMETYPE="image/tiff" SIZE="1024"/>
    <foxml:datastreamVersion ID="IMAGE.1" MIMETYPE="image/tiff" SIZE="-1"/>
  </foxml:datastream>
  <foxml:datastream ID="THUMB" STATE="A" CONTROL_GROUP="M">
    <foxml:datastreamVersion ID="THUMB.0" MIMETYPE="image/jpeg"/>
  </foxml:datastream>
  <foxml:datastream ID="LINK" STATE="A" CONTROL_GROUP="R">
    <foxml:datastreamVersion ID="LINK.0" MIMETYPE="text/html" SIZE="0"/>
  </foxml:datastream>
</foxml:digitalObject>"#;

    #[test]
    fn test_managed_streams_only() {
        let descriptor = ObjectDescriptor::from_foxml("demo:1", FOXML.as_bytes()).unwrap();
        let ids: Vec<_> = descriptor.streams.iter().map(|s| s.content_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["demo:1+IMAGE+IMAGE.0", "demo:1+IMAGE+IMAGE.1", "demo:1+THUMB+THUMB.0"]
        );
    }

    #[test]
    fn test_unknown_sizes() {
        let descriptor = ObjectDescriptor::from_foxml("demo:1", FOXML.as_bytes()).unwrap();
        let sizes: Vec<_> = descriptor.streams.iter().map(|s| s.expected_size).collect();
        assert_eq!(sizes, vec![Some(1024), None, None]);
    }

    #[test]
    fn test_reject_non_descriptor() {
        assert!(ObjectDescriptor::from_foxml("demo:1", b"<mets/>").is_err());
        assert!(ObjectDescriptor::from_foxml(
            "demo:1",
            b"<foxml:digitalObject></foxml:datastream>"
        )
        .is_err());
    }
}
