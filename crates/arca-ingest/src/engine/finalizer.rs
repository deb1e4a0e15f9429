//! Object finalization
//!
//! Promotes a complete object from staging to production and advances its
//! ingest's status. Content is copied and then deleted piece by piece; a
//! crash between the two leaves the piece in both spaces and is not repaired.

use chrono::Utc;
use std::collections::HashSet;
use tracing::{error, info, instrument};

use super::status::Outcome;
use super::StagingEngine;
use crate::error::{CompensationError, IngestError, Result};
use crate::formats::IngestManifest;

/// Result of finalizing one object.
#[derive(Debug)]
pub(super) enum Finalized {
    Ingested { completed: u64, total: u64 },
    /// Failed, and the failure is recorded in the index
    Failed(IngestError),
}

impl StagingEngine {
    /// Ingest a complete object for `manifest_id`.
    ///
    /// The object's cached state is purged afterwards whatever the outcome.
    #[instrument(skip(self))]
    pub(super) async fn finalize(
        &mut self,
        manifest_id: &str,
        completed_so_far: u64,
        object_id: &str,
    ) -> std::result::Result<Finalized, CompensationError> {
        let mut manifest = None;
        let result = self
            .ingest_object(manifest_id, completed_so_far, object_id, &mut manifest)
            .await;

        let outcome = match result {
            Ok((completed, total)) => Ok(Finalized::Ingested { completed, total }),
            Err(error) => {
                error!(error = %error, "failed to ingest object");
                match self
                    .record_object_failure(
                        manifest_id,
                        completed_so_far,
                        object_id,
                        manifest.as_ref(),
                        &error,
                    )
                    .await
                {
                    Ok(()) => Ok(Finalized::Failed(error)),
                    Err(failure) => Err(CompensationError {
                        original: error,
                        failure,
                    }),
                }
            }
        };

        self.tracker.purge(object_id);
        outcome
    }

    async fn ingest_object(
        &self,
        manifest_id: &str,
        completed_so_far: u64,
        object_id: &str,
        loaded: &mut Option<IngestManifest>,
    ) -> Result<(u64, u64)> {
        let manifest: &IngestManifest = loaded.insert(self.load_manifest(manifest_id).await?);

        let package = manifest
            .package_for(object_id)
            .ok_or_else(|| IngestError::UndeclaredObject {
                manifest_id: manifest_id.to_string(),
                object_id: object_id.to_string(),
            })?;

        let staging = self.space.space_id();
        let production = self.space.production_space_id();
        let mut promoted = HashSet::new();
        for piece in self.tracker.recognized(object_id) {
            if !promoted.insert(piece.content_id.as_str()) {
                continue;
            }
            self.store
                .copy_content(staging, &piece.content_id, production, &piece.content_id)
                .await?;
            self.store.delete_content(staging, &piece.content_id).await?;
            info!(content_id = %piece.content_id, "promoted content to {}", production);
        }

        let completed = completed_so_far + 1;
        let total = manifest.total_objects();
        if completed == total {
            self.reporter.report_completion(manifest, Utc::now()).await?;
        } else {
            self.reporter
                .report(manifest, Outcome::Progress(completed))
                .await?;
        }

        info!(
            package = %package.metadata.title,
            completed,
            total,
            "ingested object"
        );

        Ok((completed, total))
    }

    async fn record_object_failure(
        &self,
        manifest_id: &str,
        completed: u64,
        object_id: &str,
        manifest: Option<&IngestManifest>,
        error: &IngestError,
    ) -> Result<()> {
        let message = format!("Failed to ingest {}: {}", object_id, error);

        self.reporter.rollback().await?;
        match manifest {
            Some(manifest) => {
                self.reporter
                    .report(manifest, Outcome::Failed { completed, message })
                    .await
            }
            None => {
                self.reporter
                    .report_failure_without_manifest(manifest_id, &message)
                    .await
            }
        }
    }
}
