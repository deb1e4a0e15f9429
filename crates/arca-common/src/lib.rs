//! Arca Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the Arca workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the shared error type and result alias
//! - **Types**: staging events and the staging-space naming convention
//! - **Logging**: centralized `tracing` setup used by every binary
//!
//! # Example
//!
//! ```no_run
//! use arca_common::types::{StagingEvent, StagingSpace};
//!
//! fn route(line: &str) -> arca_common::Result<()> {
//!     let event = StagingEvent::from_json_line(line)?;
//!     let space = StagingSpace::parse(&event.space_id, "staging")?;
//!     println!("{} belongs to {}", event.content_id, space.institution_id());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{ArcaError, Result};
