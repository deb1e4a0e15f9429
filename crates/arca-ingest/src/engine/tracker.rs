//! Completeness tracking
//!
//! Remembers every recognized piece of every object in one staging area and
//! decides when an object has fully arrived. A repository object is complete
//! when each managed stream its descriptor declares has been recognized,
//! either as one piece or as every chunk listed by the stream's chunk
//! manifest. An AIP is complete as soon as it is recognized.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace};

use super::classifier::{ContentKind, RecognizedContentReference};
use crate::error::Result;
use crate::formats::{ChunkManifest, ObjectDescriptor};
use crate::store::ContentStore;

#[derive(Debug, Default)]
pub struct CompletenessTracker {
    recognized: HashMap<String, Vec<RecognizedContentReference>>,
    descriptors: HashMap<String, ObjectDescriptor>,
    /// Keyed by the content id the chunks reassemble into
    chunk_manifests: HashMap<String, ChunkManifest>,
    complete: HashSet<String>,
}

/// Whether `content_id` is named after `object_id`.
fn belongs_to(content_id: &str, object_id: &str) -> bool {
    content_id == object_id
        || content_id
            .strip_prefix(object_id)
            .is_some_and(|rest| rest.starts_with('+'))
}

fn identified(
    pieces: &[RecognizedContentReference],
    content_id: &str,
    expected_size: Option<u64>,
) -> bool {
    pieces.iter().any(|piece| {
        piece.content_id == content_id && expected_size.map_or(true, |size| piece.size == size)
    })
}

impl CompletenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a recognized piece and return whether its object is now
    /// complete.
    ///
    /// Descriptors and chunk manifests are fetched from `space_id` the first
    /// time their piece is recognized. Recognizing an identical reference
    /// again changes nothing. A piece re-uploaded under the same content id
    /// replaces the earlier one, and a replaced descriptor or chunk manifest
    /// is fetched again.
    pub async fn recognize(
        &mut self,
        store: &dyn ContentStore,
        space_id: &str,
        reference: RecognizedContentReference,
    ) -> Result<bool> {
        let object_id = reference.object_id.clone();
        let pieces = self.recognized(&object_id);

        if pieces.contains(&reference) {
            trace!(content_id = %reference.content_id, "piece already recognized");
            return Ok(self.is_complete(&object_id));
        }
        let replaces = pieces
            .iter()
            .any(|piece| piece.content_id == reference.content_id);

        if reference.kind == ContentKind::RepositoryObject {
            self.cache_structure(store, space_id, &reference, replaces)
                .await?;
        }

        if replaces {
            info!(
                content_id = %reference.content_id,
                size = reference.size,
                "replacing re-uploaded content for {}",
                object_id
            );
        } else {
            info!(
                content_id = %reference.content_id,
                object_id = %object_id,
                "recognized content for {}",
                object_id
            );
        }

        let kind = reference.kind;
        let pieces = self.recognized.entry(object_id.clone()).or_default();
        pieces.retain(|piece| piece.content_id != reference.content_id);
        pieces.push(reference);

        let complete = match kind {
            ContentKind::AipPackage => true,
            ContentKind::RepositoryObject => self.evaluate(&object_id),
        };

        if complete {
            info!(object_id = %object_id, "all content for {} has arrived", object_id);
            self.complete.insert(object_id);
        } else {
            self.complete.remove(&object_id);
        }

        Ok(complete)
    }

    async fn cache_structure(
        &mut self,
        store: &dyn ContentStore,
        space_id: &str,
        reference: &RecognizedContentReference,
        refresh: bool,
    ) -> Result<()> {
        if reference.content_id == reference.object_id
            && (refresh || !self.descriptors.contains_key(&reference.object_id))
        {
            let content = store.get_content(space_id, &reference.content_id).await?;
            let descriptor = ObjectDescriptor::from_foxml(&reference.object_id, &content.bytes)?;
            debug!(
                object_id = %reference.object_id,
                streams = descriptor.streams.len(),
                "cached object descriptor"
            );
            self.descriptors
                .insert(reference.object_id.clone(), descriptor);
        }

        if let Some(target) = ChunkManifest::target_of(&reference.content_id) {
            if refresh || !self.chunk_manifests.contains_key(target) {
                let content = store.get_content(space_id, &reference.content_id).await?;
                let manifest = ChunkManifest::from_xml(&content.bytes)?;
                debug!(
                    content_id = target,
                    chunks = manifest.chunks.len(),
                    "cached chunk manifest"
                );
                self.chunk_manifests.insert(target.to_string(), manifest);
            }
        }

        Ok(())
    }

    fn evaluate(&self, object_id: &str) -> bool {
        let Some(descriptor) = self.descriptors.get(object_id) else {
            trace!(object_id, "not complete: descriptor has not arrived");
            return false;
        };
        let pieces = self
            .recognized
            .get(object_id)
            .map(Vec::as_slice)
            .unwrap_or_default();

        descriptor.streams.iter().all(|stream| {
            if identified(pieces, &stream.content_id, stream.expected_size) {
                return true;
            }
            match self.chunk_manifests.get(&stream.content_id) {
                Some(manifest) => manifest.chunks.iter().all(|chunk| {
                    let found = identified(pieces, &chunk.chunk_id, Some(chunk.byte_size));
                    if !found {
                        trace!(
                            object_id,
                            chunk_id = %chunk.chunk_id,
                            size = chunk.byte_size,
                            "not complete: chunk missing"
                        );
                    }
                    found
                }),
                None => {
                    trace!(
                        object_id,
                        content_id = %stream.content_id,
                        "not complete: neither the stream nor its chunk manifest has arrived"
                    );
                    false
                }
            }
        })
    }

    pub fn is_complete(&self, object_id: &str) -> bool {
        self.complete.contains(object_id)
    }

    /// Pieces recognized so far for an object, in arrival order.
    pub fn recognized(&self, object_id: &str) -> &[RecognizedContentReference] {
        self.recognized
            .get(object_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn descriptor(&self, object_id: &str) -> Option<&ObjectDescriptor> {
        self.descriptors.get(object_id)
    }

    /// Whether any cache still holds an entry for the object.
    pub fn tracks(&self, object_id: &str) -> bool {
        self.recognized.contains_key(object_id)
            || self.descriptors.contains_key(object_id)
            || self.complete.contains(object_id)
            || self
                .chunk_manifests
                .keys()
                .any(|content_id| belongs_to(content_id, object_id))
    }

    /// Forget everything known about an object.
    pub fn purge(&mut self, object_id: &str) {
        self.recognized.remove(object_id);
        self.descriptors.remove(object_id);
        self.complete.remove(object_id);
        self.chunk_manifests
            .retain(|content_id, _| !belongs_to(content_id, object_id));
        debug!(object_id, "purged cached state");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::InMemoryContentStore;

    const SPACE: &str = "virginiastaging";

    fn foxml(object_id: &str, streams: &[(&str, i64)]) -> String {
        let datastreams: String = streams
            .iter()
            .map(|(ds, size)| {
                format!(
                    r#"<foxml:datastream ID="{ds}" CONTROL_GROUP="M"><foxml:datastreamVersion ID="{ds}.0" SIZE="{size}"/></foxml:datastream>"#
                )
            })
            .collect();
        format!(
            r#"<foxml:digitalObject PID="{object_id}" xmlns:foxml="info:fedora/fedora-system:def/foxml#">{datastreams}</foxml:digitalObject>"#
        )
    }

    fn piece(content_id: &str, object_id: &str, size: u64) -> RecognizedContentReference {
        RecognizedContentReference {
            content_id: content_id.to_string(),
            object_id: object_id.to_string(),
            size,
            kind: ContentKind::RepositoryObject,
        }
    }

    async fn store_with_descriptor(streams: &[(&str, i64)]) -> (InMemoryContentStore, u64) {
        let store = InMemoryContentStore::new();
        let descriptor = foxml("demo:1", streams);
        let size = descriptor.len() as u64;
        store.put(SPACE, "demo:1", descriptor).await;
        (store, size)
    }

    #[tokio::test]
    async fn test_complete_only_when_every_stream_arrived() {
        let (store, descriptor_size) =
            store_with_descriptor(&[("A", 10), ("B", 20), ("C", 30)]).await;
        let mut tracker = CompletenessTracker::new();

        assert!(!tracker
            .recognize(&store, SPACE, piece("demo:1", "demo:1", descriptor_size))
            .await
            .unwrap());
        assert!(!tracker
            .recognize(&store, SPACE, piece("demo:1+A+A.0", "demo:1", 10))
            .await
            .unwrap());
        assert!(!tracker
            .recognize(&store, SPACE, piece("demo:1+B+B.0", "demo:1", 20))
            .await
            .unwrap());
        assert!(!tracker.is_complete("demo:1"));

        assert!(tracker
            .recognize(&store, SPACE, piece("demo:1+C+C.0", "demo:1", 30))
            .await
            .unwrap());
        assert!(tracker.is_complete("demo:1"));
    }

    #[tokio::test]
    async fn test_size_mismatch_is_not_a_match() {
        let (store, descriptor_size) = store_with_descriptor(&[("A", 10)]).await;
        let mut tracker = CompletenessTracker::new();
        tracker
            .recognize(&store, SPACE, piece("demo:1", "demo:1", descriptor_size))
            .await
            .unwrap();

        assert!(!tracker
            .recognize(&store, SPACE, piece("demo:1+A+A.0", "demo:1", 11))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unknown_size_accepts_any_size() {
        let (store, descriptor_size) = store_with_descriptor(&[("A", -1)]).await;
        let mut tracker = CompletenessTracker::new();
        tracker
            .recognize(&store, SPACE, piece("demo:1", "demo:1", descriptor_size))
            .await
            .unwrap();

        // A differently named piece never satisfies the stream
        assert!(!tracker
            .recognize(&store, SPACE, piece("demo:1+B+B.0", "demo:1", 5))
            .await
            .unwrap());
        assert!(tracker
            .recognize(&store, SPACE, piece("demo:1+A+A.0", "demo:1", 987_654))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_recognition_is_idempotent() {
        let (store, descriptor_size) = store_with_descriptor(&[("A", 10), ("B", 20)]).await;
        let mut tracker = CompletenessTracker::new();
        let descriptor = piece("demo:1", "demo:1", descriptor_size);
        let a = piece("demo:1+A+A.0", "demo:1", 10);

        tracker.recognize(&store, SPACE, descriptor.clone()).await.unwrap();
        tracker.recognize(&store, SPACE, a.clone()).await.unwrap();
        let before = tracker.is_complete("demo:1");

        tracker.recognize(&store, SPACE, a).await.unwrap();
        tracker.recognize(&store, SPACE, descriptor).await.unwrap();

        assert_eq!(tracker.is_complete("demo:1"), before);
        assert_eq!(tracker.recognized("demo:1").len(), 2);
    }

    #[tokio::test]
    async fn test_reuploaded_piece_replaces_earlier_one() {
        let (store, descriptor_size) = store_with_descriptor(&[("A", 10)]).await;
        let mut tracker = CompletenessTracker::new();
        tracker
            .recognize(&store, SPACE, piece("demo:1", "demo:1", descriptor_size))
            .await
            .unwrap();

        assert!(!tracker
            .recognize(&store, SPACE, piece("demo:1+A+A.0", "demo:1", 9))
            .await
            .unwrap());
        assert!(tracker
            .recognize(&store, SPACE, piece("demo:1+A+A.0", "demo:1", 10))
            .await
            .unwrap());

        let pieces = tracker.recognized("demo:1");
        assert_eq!(pieces.len(), 2);
        assert_eq!(
            pieces
                .iter()
                .filter(|piece| piece.content_id == "demo:1+A+A.0")
                .map(|piece| piece.size)
                .collect::<Vec<_>>(),
            vec![10]
        );
    }

    #[tokio::test]
    async fn test_reuploaded_descriptor_is_read_again() {
        let (store, descriptor_size) = store_with_descriptor(&[("A", 10)]).await;
        let mut tracker = CompletenessTracker::new();
        tracker
            .recognize(&store, SPACE, piece("demo:1", "demo:1", descriptor_size))
            .await
            .unwrap();
        assert!(tracker
            .recognize(&store, SPACE, piece("demo:1+A+A.0", "demo:1", 10))
            .await
            .unwrap());

        // The new descriptor declares a second stream, so the object is no
        // longer complete
        let descriptor = foxml("demo:1", &[("A", 10), ("B", 20)]);
        let size = descriptor.len() as u64;
        store.put(SPACE, "demo:1", descriptor).await;

        assert!(!tracker
            .recognize(&store, SPACE, piece("demo:1", "demo:1", size))
            .await
            .unwrap());
        assert!(!tracker.is_complete("demo:1"));
        assert!(tracker
            .recognize(&store, SPACE, piece("demo:1+B+B.0", "demo:1", 20))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_streams_before_descriptor() {
        let (store, descriptor_size) = store_with_descriptor(&[("A", 10)]).await;
        let mut tracker = CompletenessTracker::new();

        assert!(!tracker
            .recognize(&store, SPACE, piece("demo:1+A+A.0", "demo:1", 10))
            .await
            .unwrap());
        assert!(tracker
            .recognize(&store, SPACE, piece("demo:1", "demo:1", descriptor_size))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_chunked_stream() {
        let (store, descriptor_size) = store_with_descriptor(&[("A", 3000)]).await;
        let chunk_manifest = r#"<dur:chunksManifest xmlns:dur="duracloud.org"><chunks>
            <chunk chunkId="demo:1+A+A.0.dura-chunk-0000" index="0"><byteSize>2000</byteSize></chunk>
            <chunk chunkId="demo:1+A+A.0.dura-chunk-0001" index="1"><byteSize>1000</byteSize></chunk>
        </chunks></dur:chunksManifest>"#;
        store.put(SPACE, "demo:1+A+A.0.dura-manifest", chunk_manifest).await;
        let manifest_size = chunk_manifest.len() as u64;

        let mut tracker = CompletenessTracker::new();
        for reference in [
            piece("demo:1", "demo:1", descriptor_size),
            piece("demo:1+A+A.0.dura-manifest", "demo:1", manifest_size),
            piece("demo:1+A+A.0.dura-chunk-0000", "demo:1", 2000),
        ] {
            assert!(!tracker.recognize(&store, SPACE, reference).await.unwrap());
        }

        assert!(tracker
            .recognize(&store, SPACE, piece("demo:1+A+A.0.dura-chunk-0001", "demo:1", 1000))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_aip_complete_on_arrival() {
        let store = InMemoryContentStore::new();
        let mut tracker = CompletenessTracker::new();
        let reference = RecognizedContentReference {
            content_id: "item-5.zip".to_string(),
            object_id: "hdl:1721.1/5".to_string(),
            size: 100,
            kind: ContentKind::AipPackage,
        };

        assert!(tracker.recognize(&store, SPACE, reference).await.unwrap());
        assert!(tracker.is_complete("hdl:1721.1/5"));
    }

    #[tokio::test]
    async fn test_failed_descriptor_fetch_records_nothing() {
        let store = InMemoryContentStore::new();
        let mut tracker = CompletenessTracker::new();

        assert!(tracker
            .recognize(&store, SPACE, piece("demo:1", "demo:1", 10))
            .await
            .is_err());
        assert!(!tracker.tracks("demo:1"));
    }

    #[tokio::test]
    async fn test_purge_clears_every_cache() {
        let (store, descriptor_size) = store_with_descriptor(&[("A", 3000)]).await;
        let chunk_manifest = r#"<chunksManifest><chunks><chunk chunkId="demo:1+A+A.0.dura-chunk-0000"><byteSize>3000</byteSize></chunk></chunks></chunksManifest>"#;
        store.put(SPACE, "demo:1+A+A.0.dura-manifest", chunk_manifest).await;

        let mut tracker = CompletenessTracker::new();
        tracker
            .recognize(&store, SPACE, piece("demo:1", "demo:1", descriptor_size))
            .await
            .unwrap();
        tracker
            .recognize(
                &store,
                SPACE,
                piece("demo:1+A+A.0.dura-manifest", "demo:1", chunk_manifest.len() as u64),
            )
            .await
            .unwrap();
        tracker
            .recognize(&store, SPACE, piece("demo:1+A+A.0.dura-chunk-0000", "demo:1", 3000))
            .await
            .unwrap();
        assert!(tracker.is_complete("demo:1"));

        tracker.purge("demo:1");

        assert!(!tracker.tracks("demo:1"));
        assert!(tracker.descriptor("demo:1").is_none());
        assert!(tracker.recognized("demo:1").is_empty());
    }

    #[test]
    fn test_belongs_to() {
        assert!(belongs_to("demo:1", "demo:1"));
        assert!(belongs_to("demo:1+A+A.0", "demo:1"));
        assert!(!belongs_to("demo:10+A+A.0", "demo:1"));
    }
}
