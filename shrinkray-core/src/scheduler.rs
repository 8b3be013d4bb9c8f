//! Bounded Scheduler: drives one whole compression run.
//!
//! The enumerator sequence is consumed on the calling task and each
//! item is dispatched, in enumeration order, to a worker admitted by a
//! semaphore of `parallelism` permits. The first error wins: it cancels
//! the run token, later errors are discarded, and every already
//! dispatched worker is drained before `run` returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogApi, MarkerTags, SearchFilter, tags};
use crate::compress::{Compressor, ImageCompressor, VideoCompressor};
use crate::config::{RunConfig, ShrinkrayConfig};
use crate::enumerate::{EnumerateOptions, enumerate};
use crate::gate::{CompressionGate, Outcome};
use crate::replace::ReplacementCoordinator;
use crate::{Result, ShrinkrayError};

/// Aggregate result of a completed run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    /// Number of assets whose original was replaced.
    pub replaced: u64,
}

/// The assembled pipeline: catalog, compressors and run options.
pub struct Pipeline {
    catalog: Arc<dyn CatalogApi>,
    image: Arc<dyn Compressor>,
    video: Arc<dyn Compressor>,
    run: RunConfig,
}

impl Pipeline {
    pub fn new(catalog: Arc<dyn CatalogApi>, config: &ShrinkrayConfig) -> Self {
        Self {
            catalog,
            image: Arc::new(ImageCompressor::new(&config.image)),
            video: Arc::new(VideoCompressor::new(&config.video)),
            run: config.run.clone(),
        }
    }

    /// Pipeline with explicit compressors, for exercising the run loop
    /// without an encoder on the machine.
    pub fn with_compressors(
        catalog: Arc<dyn CatalogApi>,
        run: RunConfig,
        image: Arc<dyn Compressor>,
        video: Arc<dyn Compressor>,
    ) -> Self {
        Self {
            catalog,
            image,
            video,
            run,
        }
    }

    /// Runs the pipeline to completion or first error.
    ///
    /// # Errors
    /// - `ShrinkrayError::Configuration` - parallelism is zero
    /// - `ShrinkrayError::Cancelled` - externally cancelled with no
    ///   prior worker error
    /// - any worker or enumeration error, first one wins
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary> {
        if self.run.parallelism == 0 {
            return Err(ShrinkrayError::Configuration {
                reason: "parallelism must be at least 1".to_string(),
            });
        }

        let marker = MarkerTags::resolve(self.catalog.as_ref(), Utc::now()).await?;
        tracing::info!(
            "Run marker '{}/{}'",
            tags::MARKER_ROOT_TAG,
            tags::format_marker_timestamp(marker.run_timestamp)
        );

        let coordinator = Arc::new(ReplacementCoordinator::new(
            Arc::clone(&self.catalog),
            marker,
            self.run.force_delete,
        ));
        let gate = Arc::new(CompressionGate::new(
            Arc::clone(&self.image),
            Arc::clone(&self.video),
            self.run.diff_percent,
        ));

        let run_cancel = cancel.child_token();
        let mut assets = enumerate(
            Arc::clone(&self.catalog),
            EnumerateOptions {
                filter: SearchFilter {
                    asset_type: self.run.asset_type,
                    ids: self.run.ids.clone(),
                },
                cutoff: self.run.cutoff,
                limit: self.run.limit,
                buffer: self.run.parallelism,
            },
            run_cancel.clone(),
        );

        let semaphore = Arc::new(Semaphore::new(self.run.parallelism));
        let replaced = Arc::new(AtomicU64::new(0));
        let first_error: Arc<Mutex<Option<ShrinkrayError>>> = Arc::new(Mutex::new(None));
        let mut workers = JoinSet::new();

        loop {
            let item = tokio::select! {
                _ = run_cancel.cancelled() => break,
                item = assets.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };
            let asset = match item {
                Ok(asset) => asset,
                Err(e) => {
                    record_first_error(&first_error, &run_cancel, e.into());
                    break;
                }
            };

            // Admission before spawn keeps dispatch in enumeration order.
            let permit = tokio::select! {
                _ = run_cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let catalog = Arc::clone(&self.catalog);
            let gate = Arc::clone(&gate);
            let coordinator = Arc::clone(&coordinator);
            let replaced = Arc::clone(&replaced);
            let first_error = Arc::clone(&first_error);
            let worker_cancel = run_cancel.clone();
            workers.spawn(async move {
                let _permit = permit;
                if worker_cancel.is_cancelled() {
                    return;
                }
                match gate
                    .evaluate(catalog.as_ref(), coordinator.as_ref(), &asset)
                    .await
                {
                    Ok(Outcome::Replaced { .. }) => {
                        replaced.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("Processing '{}' failed: {e}", asset.original_file_name);
                        record_first_error(&first_error, &worker_cancel, e);
                    }
                }
            });
        }
        drop(assets);

        // Graceful drain: every dispatched worker runs to completion.
        while workers.join_next().await.is_some() {}

        let error = first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(error) = error {
            return Err(error);
        }
        if run_cancel.is_cancelled() {
            return Err(ShrinkrayError::Cancelled);
        }

        Ok(RunSummary {
            replaced: replaced.load(Ordering::Relaxed),
        })
    }
}

/// Keeps the first error, cancels the run, discards the rest.
fn record_first_error(
    slot: &Mutex<Option<ShrinkrayError>>,
    cancel: &CancellationToken,
    error: ShrinkrayError,
) {
    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.is_none() {
        *guard = Some(error);
    }
    cancel.cancel();
}
