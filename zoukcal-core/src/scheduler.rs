//! Rebuild scheduling: one pass at startup, then one per change notification.
//!
//! Passes never overlap. A pass deletes exhausted sources while it scans, so
//! two of them racing over the same store and output is not safe.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::{ZoukError, ZoukResult};
use crate::output::Renderer;
use crate::pipeline::Pipeline;
use crate::store::{ContentStore, SourceId};

/// What the watch collaborator delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// Something under the watched roots changed.
    Changed(Vec<PathBuf>),
    /// Files under the watched roots were removed.
    Removed(Vec<PathBuf>),
    /// The watch source broke; rebuilding cannot continue.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Change,
}

/// Counts from a finished pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub occurrences: usize,
    pub months: usize,
    pub skipped: usize,
    pub retired: usize,
}

/// A pipeline plus its renderer, run one pass at a time.
pub struct Rebuilder<S, R> {
    pipeline: Pipeline<S>,
    renderer: R,
    in_flight: Mutex<()>,
    /// Sources a pass deleted itself, whose removal notices are still due.
    own_removals: Mutex<HashSet<PathBuf>>,
}

impl<S: ContentStore, R: Renderer> Rebuilder<S, R> {
    pub fn new(pipeline: Pipeline<S>, renderer: R) -> Self {
        Rebuilder {
            pipeline,
            renderer,
            in_flight: Mutex::new(()),
            own_removals: Mutex::new(HashSet::new()),
        }
    }

    /// Run a full pass and render it. Blocks while another pass is running.
    pub fn rebuild(&self) -> ZoukResult<BuildStats> {
        let _guard = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());

        let build = self.pipeline.run(Utc::now())?;
        self.note_removals(&build.retired);
        self.renderer.render(&build)?;

        let stats = BuildStats {
            occurrences: build.listing.len(),
            months: build.months.len(),
            skipped: build.skipped.len(),
            retired: build.retired.len(),
        };
        info!(
            "Regenerated: {} events in {} months ({} skipped, {} retired)",
            stats.occurrences, stats.months, stats.skipped, stats.retired
        );
        Ok(stats)
    }

    fn note_removals(&self, retired: &[SourceId]) {
        let store = self.pipeline.store();
        let mut own = self.own_removals.lock().unwrap_or_else(|e| e.into_inner());
        // Retired without delete (or a failed delete) leaves the source readable.
        own.extend(
            retired
                .iter()
                .filter(|id| store.read(id).is_err())
                .map(|id| store.locate(id)),
        );
    }

    /// True when every path is a source this rebuilder deleted; those are forgotten.
    pub fn claim_own_removals(&self, paths: &[PathBuf]) -> bool {
        let mut own = self.own_removals.lock().unwrap_or_else(|e| e.into_inner());
        if paths.is_empty() || !paths.iter().all(|p| own.contains(p)) {
            return false;
        }
        for path in paths {
            own.remove(path);
        }
        true
    }
}

/// Drives a [`Rebuilder`] from watch notifications.
pub struct Scheduler<S, R> {
    rebuilder: Arc<Rebuilder<S, R>>,
}

impl<S, R> Scheduler<S, R>
where
    S: ContentStore + 'static,
    R: Renderer + 'static,
{
    pub fn new(rebuilder: Rebuilder<S, R>) -> Self {
        Scheduler {
            rebuilder: Arc::new(rebuilder),
        }
    }

    /// Run one pass on the blocking pool.
    pub async fn rebuild(&self, trigger: Trigger) -> ZoukResult<BuildStats> {
        info!("Rebuilding ({trigger:?})");
        let rebuilder = Arc::clone(&self.rebuilder);
        tokio::task::spawn_blocking(move || rebuilder.rebuild())
            .await
            .map_err(|e| ZoukError::Output(format!("Rebuild task failed: {e}")))?
    }

    /// Rebuild once, then once per change until the watch source fails or closes.
    ///
    /// Only a failing startup pass is fatal; later failures keep the previous
    /// output in place and wait for the next change.
    pub async fn run(&self, mut signals: mpsc::Receiver<WatchSignal>) -> ZoukResult<()> {
        self.rebuild(Trigger::Startup).await?;

        while let Some(signal) = signals.recv().await {
            match signal {
                WatchSignal::Removed(paths) if self.rebuilder.claim_own_removals(&paths) => {
                    debug!("Ignoring removal of {} retired source(s)", paths.len());
                }
                WatchSignal::Changed(paths) | WatchSignal::Removed(paths) => {
                    if let Some(path) = paths.first() {
                        info!("Change detected: {}", path.display());
                    }
                    if let Err(e) = self.rebuild(Trigger::Change).await {
                        error!("Rebuild failed, keeping previous output: {e}");
                    }
                }
                WatchSignal::Failed(reason) => return Err(ZoukError::Watch(reason)),
            }
        }

        Err(ZoukError::Watch("change notifications stopped".to_string()))
    }
}
