//! Asset Enumerator: turns the paginated remote listing into a single
//! ordered, cancellable sequence of candidate assets.
//!
//! While the items of the current page are being delivered, the fetch
//! for the next page is already in flight (one page of look-ahead), so
//! network latency overlaps consumer processing without unbounded
//! buffering. Each item passes a client-side filter (trashed assets and
//! assets whose processing marker is at or after the cutoff are
//! dropped); type/id restrictions are pushed server-side through the
//! search predicate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::catalog::{Asset, CatalogApi, CatalogError, SearchFilter, SearchPage};

/// Enumeration parameters for one run.
#[derive(Debug, Clone)]
pub struct EnumerateOptions {
    /// Server-side predicate injected into every listing request.
    pub filter: SearchFilter,
    /// Assets with a marker timestamp at or after this time are skipped.
    pub cutoff: DateTime<Utc>,
    /// Stop after this many accepted items (<= 0 means unbounded).
    pub limit: i64,
    /// Capacity of the delivery channel.
    pub buffer: usize,
}

/// Starts enumerating and returns the receiving end of the sequence.
///
/// Each received item is either an accepted asset or the single error
/// that terminated the sequence. The sequence is restartable only by
/// calling again; it is not resumable mid-stream. Dropping the receiver
/// or cancelling `cancel` stops enumeration and the page prefetch.
pub fn enumerate(
    catalog: Arc<dyn CatalogApi>,
    options: EnumerateOptions,
    cancel: CancellationToken,
) -> mpsc::Receiver<Result<Asset, CatalogError>> {
    let (tx, rx) = mpsc::channel(options.buffer.max(1));
    tokio::spawn(produce(catalog, options, cancel, tx));
    rx
}

async fn produce(
    catalog: Arc<dyn CatalogApi>,
    options: EnumerateOptions,
    cancel: CancellationToken,
    tx: mpsc::Sender<Result<Asset, CatalogError>>,
) {
    // Page 1 is fetched before anything is delivered.
    let first = tokio::select! {
        _ = cancel.cancelled() => return,
        result = catalog.search_assets(&options.filter, None) => result,
    };
    let mut current = match first {
        Ok(page) => page,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            return;
        }
    };

    let mut accepted = 0i64;
    loop {
        let prefetch = spawn_prefetch(&catalog, &options.filter, current.next_page.take());

        for asset in current.items {
            if cancel.is_cancelled() || limit_reached(options.limit, accepted) {
                abort(prefetch);
                return;
            }
            if asset.is_trashed {
                continue;
            }
            if let Some(marker) = asset.marker_timestamp() {
                if marker >= options.cutoff {
                    tracing::debug!(
                        "Skipping '{}': processed at {marker}, cutoff {}",
                        asset.original_file_name,
                        options.cutoff
                    );
                    continue;
                }
            }

            if tx.send(Ok(asset)).await.is_err() {
                // Consumer went away; nothing left to deliver to.
                abort(prefetch);
                return;
            }
            accepted += 1;
        }

        let Some(mut handle) = prefetch else {
            return;
        };
        let joined = tokio::select! {
            _ = cancel.cancelled() => {
                handle.abort();
                return;
            }
            joined = &mut handle => joined,
        };
        match joined {
            Ok(Ok(page)) => current = page,
            Ok(Err(e)) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
            Err(e) if e.is_cancelled() => return,
            Err(e) => {
                let _ = tx
                    .send(Err(CatalogError::Transport {
                        reason: format!("page prefetch task failed: {e}"),
                    }))
                    .await;
                return;
            }
        }
    }
}

fn limit_reached(limit: i64, accepted: i64) -> bool {
    limit > 0 && accepted >= limit
}

/// Issues the fetch for the next page, or None on the terminal token.
fn spawn_prefetch(
    catalog: &Arc<dyn CatalogApi>,
    filter: &SearchFilter,
    token: Option<String>,
) -> Option<JoinHandle<Result<SearchPage, CatalogError>>> {
    let token = token?;
    let catalog = Arc::clone(catalog);
    let filter = filter.clone();
    Some(tokio::spawn(async move {
        catalog.search_assets(&filter, Some(&token)).await
    }))
}

fn abort(prefetch: Option<JoinHandle<Result<SearchPage, CatalogError>>>) {
    if let Some(handle) = prefetch {
        handle.abort();
    }
}
