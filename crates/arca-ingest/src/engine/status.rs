//! Status reporting
//!
//! Every ingest operation is visible only through its status document in
//! the index. This module builds those documents (plus one per package and
//! per object once an ingest completes) and writes them with add-then-commit.
//! Rollback is separate and is the only thing failure paths call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{IngestError, Result};
use crate::formats::IngestManifest;
use crate::index::{fields, FieldMatch, IndexDocument, StatusIndex};

pub const INGEST_RECORD: &str = "ingest";
pub const PACKAGE_RECORD: &str = "package";
pub const OBJECT_RECORD: &str = "object";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestStatus {
    InProgress,
    Completed,
    Failed,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::InProgress => "IN_PROGRESS",
            IngestStatus::Completed => "COMPLETED",
            IngestStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to an ingest operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    New,
    Progress(u64),
    Completed(DateTime<Utc>),
    /// Failed after `completed` objects had been ingested
    Failed { completed: u64, message: String },
}

/// The index record of one ingest operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    pub id: String,
    pub record_type: String,
    pub institution_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub submitting_user: Option<String>,
    pub operation_status: IngestStatus,
    #[serde(default)]
    pub completed_object_count: u64,
    #[serde(default)]
    pub object_count: u64,
    #[serde(default)]
    pub operation_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub operation_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: Option<String>,
    /// Every object the operation covers; how arriving objects find it
    #[serde(default)]
    pub included_pid: Vec<String>,
    #[serde(default)]
    pub included_package: Vec<String>,
}

impl StatusDocument {
    pub fn for_manifest(institution_id: &str, manifest: &IngestManifest, outcome: Outcome) -> Result<Self> {
        let id = manifest.id.clone().ok_or_else(|| {
            IngestError::Consistency("Cannot report on a manifest that has no id".to_string())
        })?;
        let total = manifest.total_objects();

        let (operation_status, completed, end, message) = match outcome {
            Outcome::New => (IngestStatus::InProgress, 0, None, None),
            Outcome::Progress(n) => (IngestStatus::InProgress, n, None, None),
            Outcome::Completed(at) => (IngestStatus::Completed, total, Some(at), None),
            Outcome::Failed { completed, message } => {
                (IngestStatus::Failed, completed, Some(Utc::now()), Some(message))
            }
        };

        Ok(Self {
            id,
            record_type: INGEST_RECORD.to_string(),
            institution_id: institution_id.to_string(),
            title: Some(manifest.description.name.clone()),
            submitting_user: Some(manifest.description.supplied_username.clone()),
            operation_status,
            completed_object_count: completed,
            object_count: total,
            operation_start_date: Some(manifest.description.ingest_initiated),
            operation_end_date: end,
            message,
            included_pid: manifest.object_ids().map(str::to_string).collect(),
            included_package: manifest.package_ids().into_iter().map(str::to_string).collect(),
        })
    }

    /// Failure record for an operation whose manifest could not be read.
    pub fn failed_without_manifest(operation_id: &str, institution_id: &str, message: impl Into<String>) -> Self {
        Self {
            id: operation_id.to_string(),
            record_type: INGEST_RECORD.to_string(),
            institution_id: institution_id.to_string(),
            title: None,
            submitting_user: None,
            operation_status: IngestStatus::Failed,
            completed_object_count: 0,
            object_count: 0,
            operation_start_date: None,
            operation_end_date: Some(Utc::now()),
            message: Some(message.into()),
            included_pid: Vec::new(),
            included_package: Vec::new(),
        }
    }
}

/// The index record of an ingested package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDocument {
    pub id: String,
    pub record_type: String,
    pub institution_id: String,
    pub title: String,
    pub access: Option<String>,
    pub included_pid: Vec<String>,
}

/// The index record of an ingested object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDocument {
    pub id: String,
    pub record_type: String,
    pub institution_id: String,
    pub package_id: String,
    pub title: String,
}

/// Package and object documents for every package of a completed manifest.
fn content_documents(institution_id: &str, manifest: &IngestManifest) -> Result<Vec<IndexDocument>> {
    let mut documents = Vec::new();
    for package in manifest.packages() {
        let package_id = package.metadata.id.clone().ok_or_else(|| {
            IngestError::Consistency(format!(
                "Package \"{}\" of a registered manifest has no id",
                package.metadata.title
            ))
        })?;

        documents.push(IndexDocument::from_record(&PackageDocument {
            id: package_id.clone(),
            record_type: PACKAGE_RECORD.to_string(),
            institution_id: institution_id.to_string(),
            title: package.metadata.title.clone(),
            access: package.metadata.access.clone(),
            included_pid: package.object_ids().map(str::to_string).collect(),
        })?);

        for object_id in package.object_ids() {
            documents.push(IndexDocument::from_record(&ObjectDocument {
                id: object_id.to_string(),
                record_type: OBJECT_RECORD.to_string(),
                institution_id: institution_id.to_string(),
                package_id: package_id.clone(),
                title: package.metadata.title.clone(),
            })?);
        }
    }
    Ok(documents)
}

/// Writes status documents for one institution.
#[derive(Clone)]
pub struct StatusReporter {
    index: Arc<dyn StatusIndex>,
    institution_id: String,
}

impl StatusReporter {
    pub fn new(index: Arc<dyn StatusIndex>, institution_id: impl Into<String>) -> Self {
        Self {
            index,
            institution_id: institution_id.into(),
        }
    }

    pub fn institution_id(&self) -> &str {
        &self.institution_id
    }

    /// Add every document, then commit. Stops at the first failed add
    /// without committing; the caller rolls back.
    async fn add_and_commit(&self, documents: Vec<IndexDocument>) -> Result<()> {
        for document in documents {
            debug!(id = document.id(), "adding index document");
            self.index.add(document).await?;
        }
        self.index.commit().await
    }

    #[instrument(skip(self, manifest), fields(manifest_id = ?manifest.id))]
    pub async fn report(&self, manifest: &IngestManifest, outcome: Outcome) -> Result<()> {
        let document = StatusDocument::for_manifest(&self.institution_id, manifest, outcome)?;
        self.add_and_commit(vec![IndexDocument::from_record(&document)?])
            .await
    }

    /// Write the package and object documents together with the COMPLETED
    /// status document, in one commit.
    #[instrument(skip(self, manifest), fields(manifest_id = ?manifest.id))]
    pub async fn report_completion(&self, manifest: &IngestManifest, at: DateTime<Utc>) -> Result<()> {
        let mut documents = content_documents(&self.institution_id, manifest)?;
        let status = StatusDocument::for_manifest(&self.institution_id, manifest, Outcome::Completed(at))?;
        documents.push(IndexDocument::from_record(&status)?);
        self.add_and_commit(documents).await
    }

    /// Record a failure for an operation whose manifest is unavailable.
    pub async fn report_failure_without_manifest(&self, operation_id: &str, message: &str) -> Result<()> {
        let document = StatusDocument::failed_without_manifest(operation_id, &self.institution_id, message);
        self.add_and_commit(vec![IndexDocument::from_record(&document)?])
            .await
    }

    pub async fn rollback(&self) -> Result<()> {
        self.index.rollback().await
    }

    /// The in-progress ingest of this institution that covers `object_id`.
    ///
    /// More than one match means two manifests claim the object, which is
    /// never resolved by picking one.
    #[instrument(skip(self))]
    pub async fn find_waiting_manifest(&self, object_id: &str) -> Result<Option<StatusDocument>> {
        let hits = self
            .index
            .query(&[
                FieldMatch::new(fields::RECORD_TYPE, INGEST_RECORD),
                FieldMatch::new(fields::INSTITUTION_ID, self.institution_id.as_str()),
                FieldMatch::new(fields::OPERATION_STATUS, IngestStatus::InProgress.as_str()),
                FieldMatch::new(fields::INCLUDED_PID, object_id),
            ])
            .await?;

        match hits.len() {
            0 => Ok(None),
            1 => {
                let document = hits
                    .into_iter()
                    .next()
                    .map(serde_json::from_value::<StatusDocument>)
                    .transpose();
                document.map_err(|e| IngestError::Index(format!("Unreadable status document: {}", e)))
            }
            n => {
                let ids: Vec<_> = hits
                    .iter()
                    .filter_map(|hit| hit.get(fields::ID).and_then(|id| id.as_str()))
                    .collect();
                Err(IngestError::Consistency(format!(
                    "{} in-progress ingests ({}) include object {}",
                    n,
                    ids.join(", "),
                    object_id
                )))
            }
        }
    }
}
