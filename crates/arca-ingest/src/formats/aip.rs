//! Archival information packages
//!
//! An AIP is a zip archive with a `mets.xml` entry at its root. The object
//! id is the `OBJID` attribute of the METS root element.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

use super::attribute;
use crate::error::{IngestError, Result};

const METS_ENTRY: &str = "mets.xml";

/// Read the object id out of a zipped AIP.
pub fn aip_object_id(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| IngestError::Parse(format!("Not a zip archive: {}", e)))?;

    let mut mets = String::new();
    archive
        .by_name(METS_ENTRY)
        .map_err(|e| IngestError::Parse(format!("No {} in archive: {}", METS_ENTRY, e)))?
        .read_to_string(&mut mets)
        .map_err(|e| IngestError::Parse(format!("Unreadable {}: {}", METS_ENTRY, e)))?;

    mets_object_id(&mets)
}

fn mets_object_id(mets: &str) -> Result<String> {
    let mut reader = Reader::from_str(mets);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() != b"mets" {
                    return Err(IngestError::Parse(format!(
                        "{} root is not a METS document",
                        METS_ENTRY
                    )));
                }
                return attribute(&e, b"OBJID")?
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| IngestError::Parse(format!("{} has no OBJID", METS_ENTRY)));
            }
            Ok(Event::Eof) => {
                return Err(IngestError::Parse(format!("{} is empty", METS_ENTRY)));
            }
            Err(e) => return Err(IngestError::Parse(format!("Invalid {}: {}", METS_ENTRY, e))),
            _ => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Zip holding the given `(name, contents)` entries.
    pub(crate) fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_object_id_from_mets() {
        let aip = zip_of(&[
            (
                "mets.xml",
                r#"<?xml version="1.0"?><mets:mets xmlns:mets="http://www.loc.gov/METS/" OBJID="hdl:1721.1/5" TYPE="DSpace ITEM"><mets:dmdSec/></mets:mets>"#,
            ),
            ("bitstream_1.pdf", "%PDF"),
        ]);
        assert_eq!(aip_object_id(&aip).unwrap(), "hdl:1721.1/5");
    }

    #[test]
    fn test_missing_mets() {
        let aip = zip_of(&[("bitstream_1.pdf", "%PDF")]);
        assert!(aip_object_id(&aip).is_err());
    }

    #[test]
    fn test_missing_objid() {
        let aip = zip_of(&[("mets.xml", "<mets/>")]);
        assert!(aip_object_id(&aip).is_err());
        assert!(aip_object_id(b"plain text").is_err());
    }
}
