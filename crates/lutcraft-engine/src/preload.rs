//! Background preload of LUT cubes and thumbnails.
//!
//! Asset ids are processed in batches sized to the worker pool. After each
//! batch the observer receives the ids that finished, then a final summary.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use lutcraft_color::{apply_with_cancel, ApplyError, CancelToken, LutParser, WorkerPool};
use lutcraft_core::LutCube;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cache::{SingleFlight, SourceGeneration, SourceId, ThumbnailCache};
use crate::error::EngineError;

/// Notifications sent while a preload runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PreloadEvent {
    /// A batch finished. `ids` lists the assets that are now cached.
    Batch {
        source: Option<SourceId>,
        ids: Vec<String>,
    },
    /// An asset failed. Nothing was cached for it.
    Failed {
        asset_id: String,
        error: EngineError,
    },
    /// The preload is over.
    Finished(PreloadSummary),
}

/// Totals for one preload run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadSummary {
    pub completed: usize,
    pub failed: usize,
    /// Already cached when the preload started.
    pub skipped: usize,
    pub cancelled: bool,
    /// The source image changed while the preload was running.
    pub superseded: bool,
}

/// Handle to a running preload.
pub struct PreloadHandle {
    events: Receiver<PreloadEvent>,
    cancel: CancelToken,
    thread: Option<JoinHandle<PreloadSummary>>,
}

impl PreloadHandle {
    /// Event stream. Ends after [`PreloadEvent::Finished`].
    pub fn events(&self) -> &Receiver<PreloadEvent> {
        &self.events
    }

    /// Stop at the next cancellation check. Entries already cached stay valid.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the preload ends.
    pub fn wait(mut self) -> PreloadSummary {
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(summary)) => summary,
            Some(Err(_)) => {
                warn!("preload thread panicked");
                PreloadSummary {
                    cancelled: true,
                    ..PreloadSummary::default()
                }
            }
            None => PreloadSummary::default(),
        }
    }
}

impl std::fmt::Debug for PreloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Everything a preload needs, detached from the engine.
pub(crate) struct PreloadJob {
    pub parser: LutParser,
    pub pool: Arc<WorkerPool>,
    pub cubes: Arc<SingleFlight<LutCube>>,
    pub thumbnails: Arc<ThumbnailCache>,
    pub batch_size: usize,
}

enum Outcome {
    Done,
    Failed(EngineError),
    Cancelled,
}

impl PreloadJob {
    /// Start the preload on a background thread.
    pub fn spawn(self, asset_ids: Vec<String>) -> std::io::Result<PreloadHandle> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let thread = std::thread::Builder::new()
            .name("lutcraft-preload".into())
            .spawn(move || self.run(asset_ids, &token, &tx))?;
        Ok(PreloadHandle {
            events: rx,
            cancel,
            thread: Some(thread),
        })
    }

    /// Run the preload on the calling thread.
    pub fn run(
        &self,
        asset_ids: Vec<String>,
        cancel: &CancelToken,
        events: &Sender<PreloadEvent>,
    ) -> PreloadSummary {
        let generation = self.thumbnails.generation();
        let mut summary = PreloadSummary::default();

        let mut seen = HashSet::new();
        let pending: Vec<String> = asset_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .filter(|id| {
                let cached = match &generation {
                    Some(g) => g.thumbnails.contains(id),
                    None => self.cubes.contains(id),
                };
                if cached {
                    summary.skipped += 1;
                }
                !cached
            })
            .collect();

        info!(
            "preloading {} LUT(s) in batches of {} ({} already cached)",
            pending.len(),
            self.batch_size,
            summary.skipped
        );

        for batch in pending.chunks(self.batch_size.max(1)) {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if let Some(g) = &generation {
                if !self.thumbnails.is_current(g.id) {
                    summary.superseded = true;
                    break;
                }
            }

            let outcomes: Vec<Outcome> = self.pool.install(|| {
                batch
                    .par_iter()
                    .map(|id| self.preload_one(id, generation.as_ref(), cancel))
                    .collect()
            });

            let mut done = Vec::with_capacity(batch.len());
            for (id, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Outcome::Done => done.push(id.clone()),
                    Outcome::Failed(error) => {
                        summary.failed += 1;
                        let _ = events.send(PreloadEvent::Failed {
                            asset_id: id.clone(),
                            error,
                        });
                    }
                    Outcome::Cancelled => summary.cancelled = true,
                }
            }
            summary.completed += done.len();
            debug!("preload batch finished: {} of {}", done.len(), batch.len());
            let _ = events.send(PreloadEvent::Batch {
                source: generation.as_ref().map(|g| g.id),
                ids: done,
            });
        }

        info!(
            "preload finished: {} completed, {} failed, cancelled = {}",
            summary.completed, summary.failed, summary.cancelled
        );
        let _ = events.send(PreloadEvent::Finished(summary));
        summary
    }

    fn preload_one(
        &self,
        asset_id: &str,
        generation: Option<&SourceGeneration>,
        cancel: &CancelToken,
    ) -> Outcome {
        if cancel.is_cancelled() {
            return Outcome::Cancelled;
        }
        let cube = match self
            .cubes
            .get_or_try_insert_with(asset_id, || self.parser.parse(asset_id))
        {
            Ok(cube) => cube,
            Err(e) => {
                debug!("preload of {} failed: {}", asset_id, e);
                return Outcome::Failed(e.into());
            }
        };
        let Some(g) = generation else {
            return Outcome::Done;
        };
        // Thumbnails render one lane each; the batch supplies the parallelism.
        match g
            .thumbnails
            .get_or_try_insert_with(asset_id, || apply_with_cancel(&g.source, &cube, 1, cancel))
        {
            Ok(_) => Outcome::Done,
            Err(ApplyError::Cancelled) => Outcome::Cancelled,
            Err(e) => Outcome::Failed(e.into()),
        }
    }
}
