//! Common types used across Arca

use serde::{Deserialize, Serialize};

use crate::error::{ArcaError, Result};

/// Default suffix that marks a content-store space as a staging area.
pub const DEFAULT_STAGING_SUFFIX: &str = "staging";

/// Notification that a piece of content appeared in a staging area.
///
/// Events are transient: produced by the notification source and consumed
/// exactly once by the engine bound to `space_id`. Delivery is
/// at-least-once, so the same event may be seen more than once.
///
/// # Examples
///
/// ```rust,ignore
/// use arca_common::types::StagingEvent;
///
/// let event = StagingEvent::new("virginiastaging", "demo:1+DS1+DS1.0");
/// assert_eq!(event.content_id, "demo:1+DS1+DS1.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StagingEvent {
    /// Content-store space the content arrived in
    pub space_id: String,

    /// Opaque identifier of the content within that space
    pub content_id: String,
}

impl StagingEvent {
    pub fn new(space_id: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            space_id: space_id.into(),
            content_id: content_id.into(),
        }
    }

    /// Parse one newline-delimited JSON event.
    pub fn from_json_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

/// A staging space and the institution it belongs to.
///
/// Staging spaces are named after their institution followed by a fixed
/// suffix (`virginia` + `staging`). The institution's production space is
/// named after the institution alone.
///
/// # Examples
///
/// ```rust,ignore
/// use arca_common::types::StagingSpace;
///
/// let space = StagingSpace::parse("virginiastaging", "staging")?;
/// assert_eq!(space.institution_id(), "virginia");
/// assert_eq!(space.production_space_id(), "virginia");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagingSpace {
    space_id: String,
    institution_id: String,
}

impl StagingSpace {
    /// Validate `space_id` against the naming convention.
    pub fn parse(space_id: &str, suffix: &str) -> Result<Self> {
        match space_id.strip_suffix(suffix) {
            Some(institution) if !institution.is_empty() && !suffix.is_empty() => Ok(Self {
                space_id: space_id.to_string(),
                institution_id: institution.to_string(),
            }),
            _ => Err(ArcaError::NotStagingSpace(space_id.to_string())),
        }
    }

    /// Whether `space_id` follows the staging naming convention.
    pub fn is_staging(space_id: &str, suffix: &str) -> bool {
        Self::parse(space_id, suffix).is_ok()
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    pub fn institution_id(&self) -> &str {
        &self.institution_id
    }

    /// The space content is promoted to once ingested.
    pub fn production_space_id(&self) -> &str {
        &self.institution_id
    }
}

impl std::fmt::Display for StagingSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.space_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_staging_space() {
        let space = StagingSpace::parse("virginiastaging", DEFAULT_STAGING_SUFFIX).unwrap();
        assert_eq!(space.space_id(), "virginiastaging");
        assert_eq!(space.institution_id(), "virginia");
        assert_eq!(space.production_space_id(), "virginia");
    }

    #[test]
    fn test_reject_non_staging_space() {
        assert!(matches!(
            StagingSpace::parse("virginia", DEFAULT_STAGING_SUFFIX),
            Err(ArcaError::NotStagingSpace(_))
        ));
        // A bare suffix names no institution
        assert!(!StagingSpace::is_staging("staging", DEFAULT_STAGING_SUFFIX));
    }

    #[test]
    fn test_event_from_json_line() {
        let event = StagingEvent::from_json_line(
            r#" {"space_id":"virginiastaging","content_id":"demo:1"} "#,
        )
        .unwrap();
        assert_eq!(event, StagingEvent::new("virginiastaging", "demo:1"));
        assert!(StagingEvent::from_json_line("not json").is_err());
    }
}
