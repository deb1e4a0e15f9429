//! One worker per staging area
//!
//! Each staging area gets its own [`StagingEngine`] running on its own task
//! and fed through a bounded channel, so events of one area are handled
//! strictly in order while areas proceed independently. Workers are created
//! on the first event for their area.

use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use arca_common::types::StagingEvent;

use crate::config::EngineSettings;
use crate::engine::{Collaborators, Disposition, StagingEngine};
use crate::error::{EngineError, IngestError, Result};

/// What a worker did before it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub space_id: String,
    pub events_handled: u64,
    /// Events whose failure was recorded in the index
    pub recorded_failures: u64,
    /// Events that returned an error
    pub errors: u64,
    /// The error that stopped the worker, if one did
    pub fatal: Option<String>,
}

struct Worker {
    sender: mpsc::Sender<StagingEvent>,
    handle: JoinHandle<WorkerReport>,
}

pub struct Supervisor {
    settings: EngineSettings,
    collaborators: Collaborators,
    queue_depth: usize,
    workers: HashMap<String, Worker>,
}

impl Supervisor {
    pub fn new(settings: EngineSettings, collaborators: Collaborators, queue_depth: usize) -> Self {
        Self {
            settings,
            collaborators,
            queue_depth: queue_depth.max(1),
            workers: HashMap::new(),
        }
    }

    /// Route an event to the worker of its staging area.
    ///
    /// Fails when the space is not a staging space or its worker has
    /// stopped after a fatal error.
    pub async fn dispatch(&mut self, event: StagingEvent) -> Result<()> {
        if !self.workers.contains_key(&event.space_id) {
            let worker = self.spawn(&event.space_id)?;
            self.workers.insert(event.space_id.clone(), worker);
        }

        let space_id = event.space_id.clone();
        let worker = self
            .workers
            .get(&space_id)
            .ok_or_else(|| IngestError::WorkerStopped(space_id.clone()))?;

        worker
            .sender
            .send(event)
            .await
            .map_err(|_| IngestError::WorkerStopped(space_id))
    }

    fn spawn(&self, space_id: &str) -> Result<Worker> {
        let engine = StagingEngine::new(space_id, &self.settings, self.collaborators.clone())?;
        let (sender, receiver) = mpsc::channel(self.queue_depth);

        let span = tracing::info_span!("worker", space = %space_id);
        let handle = tokio::spawn(run_worker(engine, receiver).instrument(span));

        info!(space = %space_id, "started staging worker");
        Ok(Worker { sender, handle })
    }

    /// Staging areas with a worker, sorted.
    pub fn active_spaces(&self) -> Vec<String> {
        let mut spaces: Vec<_> = self.workers.keys().cloned().collect();
        spaces.sort();
        spaces
    }

    /// Close every channel, let workers drain, and collect their reports.
    pub async fn shutdown(self) -> Vec<WorkerReport> {
        let mut reports = Vec::with_capacity(self.workers.len());

        for (space_id, worker) in self.workers {
            drop(worker.sender);
            match worker.handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(space = %space_id, error = %e, "worker task failed");
                    reports.push(WorkerReport {
                        space_id,
                        fatal: Some(format!("worker task failed: {}", e)),
                        ..WorkerReport::default()
                    });
                }
            }
        }

        reports.sort_by(|a, b| a.space_id.cmp(&b.space_id));
        reports
    }
}

async fn run_worker(mut engine: StagingEngine, mut receiver: mpsc::Receiver<StagingEvent>) -> WorkerReport {
    let mut report = WorkerReport {
        space_id: engine.space().space_id().to_string(),
        ..WorkerReport::default()
    };

    while let Some(event) = receiver.recv().await {
        report.events_handled += 1;

        match engine.notify_update(&event).await {
            Ok(disposition) => {
                if disposition.is_failure() {
                    report.recorded_failures += 1;
                }
                log_disposition(&event, &disposition);
            }
            Err(EngineError::Compensation(e)) => {
                error!(
                    content_id = %event.content_id,
                    error = %e,
                    "failure could not be recorded; stopping worker"
                );
                report.fatal = Some(e.to_string());
                break;
            }
            Err(e) => {
                error!(content_id = %event.content_id, error = %e, "event failed");
                report.errors += 1;
            }
        }
    }

    debug!(events = report.events_handled, "worker finished");
    report
}

fn log_disposition(event: &StagingEvent, disposition: &Disposition) {
    match disposition {
        Disposition::ManifestFailed { manifest_id, error } => warn!(
            content_id = %event.content_id,
            manifest_id = ?manifest_id,
            error = %error,
            "manifest failed"
        ),
        Disposition::ObjectFailed {
            manifest_id,
            object_id,
            error,
        } => warn!(
            manifest_id = %manifest_id,
            object_id = %object_id,
            error = %error,
            "object failed"
        ),
        other => debug!(content_id = %event.content_id, disposition = ?other, "event handled"),
    }
}
