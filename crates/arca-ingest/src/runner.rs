//! Event feed for the command-line runner

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use arca_common::types::StagingEvent;

use crate::config::IngestConfig;
use crate::engine::Collaborators;
use crate::error::Result;
use crate::index::SolrIndex;
use crate::repository::RestRepository;
use crate::store::S3ContentStore;
use crate::supervisor::Supervisor;

/// Counts of what happened to the lines of an event feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub dispatched: u64,
    pub malformed: u64,
    pub rejected: u64,
}

/// Build the S3, REST and Solr adapters from configuration.
pub fn connect(config: &IngestConfig) -> Result<Collaborators> {
    Ok(Collaborators {
        store: Arc::new(S3ContentStore::new(config.content_store.clone())),
        repository: Arc::new(RestRepository::new(&config.repository)?),
        index: Arc::new(SolrIndex::new(&config.index)?),
    })
}

/// Dispatch every newline-delimited JSON event read from `reader`.
///
/// Blank lines are skipped. Malformed lines and events the supervisor
/// refuses are logged and counted, and reading continues.
pub async fn feed_events<R>(reader: R, supervisor: &mut Supervisor) -> Result<FeedSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = FeedSummary::default();
    let mut lines = reader.lines();
    let mut line_number = 0u64;

    while let Some(line) = lines.next_line().await.map_err(arca_common::ArcaError::from)? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event = match StagingEvent::from_json_line(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_number, error = %e, "skipping malformed event");
                summary.malformed += 1;
                continue;
            }
        };

        debug!(space = %event.space_id, content_id = %event.content_id, "dispatching event");
        match supervisor.dispatch(event).await {
            Ok(()) => summary.dispatched += 1,
            Err(e) => {
                warn!(line = line_number, error = %e, "event rejected");
                summary.rejected += 1;
            }
        }
    }

    Ok(summary)
}
