//! Staging reconciliation engine
//!
//! One [`StagingEngine`] serves one staging area. It is fed one
//! [`StagingEvent`] at a time and decides what the arrival means:
//!
//! 1. Content tagged as a manifest registers a new ingest operation
//!    (see `registrar`), then finalizes any of its objects that already
//!    arrived.
//! 2. Any other content is classified and recorded by the
//!    [`CompletenessTracker`]. When that completes an object, the index is
//!    asked which in-progress ingest is waiting for it, and the object is
//!    finalized for that ingest (see `finalizer`).
//!
//! Completeness lives in memory for the life of the engine; ingest progress
//! lives in the repository (manifest) and the index (completed count) and is
//! re-read on every completion.

use std::sync::Arc;
use tracing::{info, instrument, trace, warn};

use arca_common::types::{StagingEvent, StagingSpace};

use crate::config::EngineSettings;
use crate::error::{EngineError, IngestError, Result};
use crate::index::StatusIndex;
use crate::repository::ObjectRepository;
use crate::store::ContentStore;

pub mod classifier;
mod finalizer;
mod registrar;
pub mod status;
pub mod tracker;

pub use classifier::{Classification, ContentClassifier, ContentKind, RecognizedContentReference};
pub use status::{IngestStatus, Outcome, StatusDocument, StatusReporter};
pub use tracker::CompletenessTracker;

/// Content model of ingest operation records.
pub const INGEST_CMODEL: &str = "info:fedora/arca:ingest";

/// Content model of package records.
pub const PACKAGE_CMODEL: &str = "info:fedora/arca:package";

/// Stream of an ingest record holding its manifest.
pub const MANIFEST_STREAM: &str = "manifest";

/// Stream of a package record holding its descriptive metadata.
pub const METADATA_STREAM: &str = "metadata";

/// The services an engine works against.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ContentStore>,
    pub repository: Arc<dyn ObjectRepository>,
    pub index: Arc<dyn StatusIndex>,
}

/// What a single event caused.
#[derive(Debug)]
pub enum Disposition {
    /// The content is no longer in staging
    Missing { content_id: String },
    /// Neither a manifest nor content of a known object
    Unrecognized { content_id: String },
    /// Recorded; the object still lacks content
    Incomplete { object_id: String },
    /// The object is complete but no ingest is waiting for it yet
    AwaitingManifest { object_id: String },
    /// A manifest was registered and `finalized` of its objects ingested
    Registered {
        manifest_id: String,
        total: u64,
        finalized: u64,
    },
    Ingested {
        manifest_id: String,
        object_id: String,
        completed: u64,
        total: u64,
    },
    /// Registration failed and the failure was recorded
    ManifestFailed {
        manifest_id: Option<String>,
        error: IngestError,
    },
    /// An object failed to ingest and the failure was recorded
    ObjectFailed {
        manifest_id: String,
        object_id: String,
        error: IngestError,
    },
}

impl Disposition {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Disposition::ManifestFailed { .. } | Disposition::ObjectFailed { .. }
        )
    }
}

pub struct StagingEngine {
    space: StagingSpace,
    settings: EngineSettings,
    store: Arc<dyn ContentStore>,
    repository: Arc<dyn ObjectRepository>,
    reporter: StatusReporter,
    classifier: ContentClassifier,
    tracker: CompletenessTracker,
}

impl StagingEngine {
    /// Create the engine for `space_id`, which must name a staging space.
    pub fn new(space_id: &str, settings: &EngineSettings, collaborators: Collaborators) -> Result<Self> {
        let space = StagingSpace::parse(space_id, &settings.staging_suffix)?;
        let reporter = StatusReporter::new(collaborators.index, space.institution_id());

        info!(
            space = %space,
            institution = space.institution_id(),
            "staging engine ready"
        );

        Ok(Self {
            space,
            settings: settings.clone(),
            store: collaborators.store,
            repository: collaborators.repository,
            reporter,
            classifier: ContentClassifier::new()?,
            tracker: CompletenessTracker::new(),
        })
    }

    pub fn space(&self) -> &StagingSpace {
        &self.space
    }

    pub fn tracker(&self) -> &CompletenessTracker {
        &self.tracker
    }

    /// Handle one arrival in the staging area.
    #[instrument(skip(self, event), fields(space = %self.space, content_id = %event.content_id))]
    pub async fn notify_update(&mut self, event: &StagingEvent) -> std::result::Result<Disposition, EngineError> {
        if event.space_id != self.space.space_id() {
            return Err(IngestError::MisroutedEvent {
                expected: self.space.space_id().to_string(),
                actual: event.space_id.clone(),
            }
            .into());
        }

        let properties = match self
            .store
            .get_content_properties(self.space.space_id(), &event.content_id)
            .await
        {
            Ok(properties) => properties,
            Err(e) if e.is_not_found() => {
                warn!("content is no longer in staging");
                return Ok(Disposition::Missing {
                    content_id: event.content_id.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if classifier::is_manifest(&properties, &self.settings.manifest_tag) {
            return self.on_manifest_arrival(&event.content_id).await;
        }

        let classification = self
            .classifier
            .classify(
                &*self.store,
                self.space.space_id(),
                &event.content_id,
                &properties,
            )
            .await?;

        let reference = match classification {
            Classification::Recognized(reference) => reference,
            Classification::Unrecognized => {
                info!("content not recognized as part of any object");
                return Ok(Disposition::Unrecognized {
                    content_id: event.content_id.clone(),
                });
            }
        };

        let object_id = reference.object_id.clone();
        let complete = self
            .tracker
            .recognize(&*self.store, self.space.space_id(), reference)
            .await?;

        if !complete {
            return Ok(Disposition::Incomplete { object_id });
        }

        match self.reporter.find_waiting_manifest(&object_id).await? {
            Some(waiting) => {
                self.on_object_arrival_for_existing_manifest(
                    &object_id,
                    &waiting.id,
                    waiting.completed_object_count,
                )
                .await
            }
            None => {
                trace!(object_id = %object_id, "complete object has no waiting ingest");
                Ok(Disposition::AwaitingManifest { object_id })
            }
        }
    }
}
