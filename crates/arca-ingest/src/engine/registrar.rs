//! Manifest lifecycle
//!
//! A manifest moves RECEIVED → REGISTERED when its ingest record is
//! allocated, then through IN_PROGRESS updates to COMPLETED. FAILED can be
//! reached from any non-terminal state and is final.

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use super::finalizer::Finalized;
use super::status::Outcome;
use super::{Disposition, StagingEngine, INGEST_CMODEL, MANIFEST_STREAM, METADATA_STREAM, PACKAGE_CMODEL};
use crate::error::{CompensationError, EngineError, IngestError, Result};
use crate::formats::IngestManifest;
use crate::repository::{object_uri, HAS_MODEL, HAS_PART};

/// What a registration attempt created, so a failure can undo it.
#[derive(Debug, Default)]
struct Registration {
    ingest_id: Option<String>,
    package_ids: Vec<String>,
    manifest: Option<IngestManifest>,
    index_written: bool,
}

impl StagingEngine {
    #[instrument(skip(self))]
    pub(super) async fn on_manifest_arrival(
        &mut self,
        content_id: &str,
    ) -> std::result::Result<Disposition, EngineError> {
        info!("manifest arrived");

        let mut registration = Registration::default();
        let (manifest_id, manifest) = match self.register_manifest(content_id, &mut registration).await {
            Ok(registered) => registered,
            Err(error) => return self.compensate_registration(content_id, registration, error).await,
        };

        let total = manifest.total_objects();
        let arrived: Vec<String> = manifest
            .object_ids()
            .filter(|object_id| self.tracker.is_complete(object_id))
            .map(str::to_string)
            .collect();

        let mut completed = 0;
        for object_id in arrived {
            info!(object_id = %object_id, "object arrived before its manifest");
            match self.finalize(&manifest_id, completed, &object_id).await? {
                Finalized::Ingested { completed: now, .. } => completed = now,
                Finalized::Failed(error) => {
                    return Ok(Disposition::ObjectFailed {
                        manifest_id,
                        object_id,
                        error,
                    })
                }
            }
        }

        info!(
            manifest_id = %manifest_id,
            total,
            finalized = completed,
            "manifest registered"
        );

        Ok(Disposition::Registered {
            manifest_id,
            total,
            finalized: completed,
        })
    }

    async fn register_manifest(
        &self,
        content_id: &str,
        registration: &mut Registration,
    ) -> Result<(String, IngestManifest)> {
        let staging = self.space.space_id();
        let content = self.store.get_content(staging, content_id).await?;

        let ingest_id = self.repository.allocate_object().await?;
        registration.ingest_id = Some(ingest_id.clone());
        info!(manifest_id = %ingest_id, "allocated ingest record");

        self.repository
            .add_relationship(&ingest_id, HAS_MODEL, INGEST_CMODEL)
            .await?;
        self.repository
            .attach_content(&ingest_id, MANIFEST_STREAM, content.bytes.clone())
            .await?;

        let mut manifest = IngestManifest::from_xml(&content.bytes)?;
        manifest.id = Some(ingest_id.clone());
        registration.manifest = Some(manifest.clone());

        if let Some(existing) = manifest.package_ids().first() {
            return Err(IngestError::Unsupported(format!(
                "Updating existing package {} is not supported",
                existing
            )));
        }

        let institution = self.space.institution_id().to_string();
        for package in manifest.packages_mut() {
            let package_id = self.repository.allocate_object().await?;
            registration.package_ids.push(package_id.clone());
            package.metadata.id = Some(package_id.clone());
            package.metadata.institution = Some(institution.clone());

            self.repository
                .add_relationship(&package_id, HAS_MODEL, PACKAGE_CMODEL)
                .await?;
            for object_id in package.object_ids() {
                self.repository
                    .add_relationship(&package_id, HAS_PART, &object_uri(object_id))
                    .await?;
            }
            self.repository
                .attach_content(&package_id, METADATA_STREAM, package.metadata.to_xml()?)
                .await?;

            info!(
                package_id = %package_id,
                title = %package.metadata.title,
                "registered package"
            );
        }
        registration.manifest = Some(manifest.clone());

        self.store
            .move_content(staging, content_id, self.space.production_space_id(), &ingest_id)
            .await?;
        self.repository
            .attach_content(&ingest_id, MANIFEST_STREAM, manifest.to_xml()?)
            .await?;

        registration.index_written = true;
        self.reporter.report(&manifest, Outcome::New).await?;
        if manifest.total_objects() == 0 {
            // No object will ever arrive to finish an empty ingest
            self.reporter.report_completion(&manifest, Utc::now()).await?;
            info!(manifest_id = %ingest_id, "empty manifest completed on registration");
        }

        Ok((ingest_id, manifest))
    }

    async fn compensate_registration(
        &self,
        content_id: &str,
        registration: Registration,
        error: IngestError,
    ) -> std::result::Result<Disposition, EngineError> {
        error!(error = %error, "failed to register manifest");

        let Some(ingest_id) = registration.ingest_id.clone() else {
            // Nothing was created, so there is nothing to record it against
            return Err(error.into());
        };

        let message = format!("Unable to process manifest {}: {}", content_id, error);
        match self.undo_registration(&ingest_id, &registration, message).await {
            Ok(()) => {
                warn!(manifest_id = %ingest_id, "manifest marked as failed");
                Ok(Disposition::ManifestFailed {
                    manifest_id: Some(ingest_id),
                    error,
                })
            }
            Err(failure) => Err(CompensationError {
                original: error,
                failure,
            }
            .into()),
        }
    }

    async fn undo_registration(
        &self,
        ingest_id: &str,
        registration: &Registration,
        message: String,
    ) -> Result<()> {
        if registration.index_written {
            self.reporter.rollback().await?;
        }

        for package_id in registration.package_ids.iter().rev() {
            self.repository.purge_object(package_id).await?;
        }
        self.repository.purge_object(ingest_id).await?;

        match &registration.manifest {
            Some(manifest) => {
                self.reporter
                    .report(manifest, Outcome::Failed { completed: 0, message })
                    .await
            }
            None => {
                self.reporter
                    .report_failure_without_manifest(ingest_id, &message)
                    .await
            }
        }
    }

    /// The registered manifest, as persisted on its ingest record.
    pub(super) async fn load_manifest(&self, manifest_id: &str) -> Result<IngestManifest> {
        let bytes = self
            .repository
            .fetch_content(manifest_id, MANIFEST_STREAM)
            .await?;
        let mut manifest = IngestManifest::from_xml(&bytes)?;
        manifest.id = Some(manifest_id.to_string());
        Ok(manifest)
    }

    pub(super) async fn on_object_arrival_for_existing_manifest(
        &mut self,
        object_id: &str,
        manifest_id: &str,
        completed_so_far: u64,
    ) -> std::result::Result<Disposition, EngineError> {
        info!(
            object_id,
            manifest_id,
            completed_so_far,
            "completed object belongs to a waiting ingest"
        );

        let disposition = match self.finalize(manifest_id, completed_so_far, object_id).await? {
            Finalized::Ingested { completed, total } => Disposition::Ingested {
                manifest_id: manifest_id.to_string(),
                object_id: object_id.to_string(),
                completed,
                total,
            },
            Finalized::Failed(error) => Disposition::ObjectFailed {
                manifest_id: manifest_id.to_string(),
                object_id: object_id.to_string(),
                error,
            },
        };
        Ok(disposition)
    }
}
