//! Arca Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Reconciles what arrives in an institution's staging area with what its
//! ingest manifests declare, and promotes objects to production storage once
//! every piece of them is present.
//!
//! # Overview
//!
//! - **Engine**: classification, completeness tracking, manifest lifecycle,
//!   finalization and status reporting for one staging area
//! - **Supervisor**: one sequential worker per staging area
//! - **Collaborators**: content store, object repository and status index
//!   traits, each with an HTTP/S3 adapter and an in-memory implementation
//! - **Formats**: ingest manifests, FOXML descriptors, chunk manifests, AIPs
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use arca_common::types::StagingEvent;
//! use arca_ingest::config::EngineSettings;
//! use arca_ingest::engine::{Collaborators, StagingEngine};
//! use arca_ingest::index::InMemoryIndex;
//! use arca_ingest::repository::InMemoryRepository;
//! use arca_ingest::store::InMemoryContentStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let collaborators = Collaborators {
//!         store: Arc::new(InMemoryContentStore::new()),
//!         repository: Arc::new(InMemoryRepository::default()),
//!         index: Arc::new(InMemoryIndex::new()),
//!     };
//!     let mut engine = StagingEngine::new("virginiastaging", &EngineSettings::default(), collaborators)?;
//!
//!     let disposition = engine
//!         .notify_update(&StagingEvent::new("virginiastaging", "demo:1"))
//!         .await?;
//!     println!("{:?}", disposition);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod formats;
pub mod index;
pub mod repository;
pub mod runner;
pub mod store;
pub mod supervisor;

pub use engine::{Collaborators, Disposition, StagingEngine};
pub use error::{CompensationError, EngineError, IngestError, Result};
pub use supervisor::{Supervisor, WorkerReport};
