use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::events::{RenderOutcome, RenderRequest, RenderResult};
use crate::presenter::Presenter;

/// Latest render generation requested by the session. Shared between the
/// session task (writer) and the render task (reader).
pub type LatestGeneration = Arc<AtomicU64>;

fn is_stale(latest: &AtomicU64, generation: u64) -> bool {
    generation != latest.load(Ordering::Acquire)
}

/// Decode requests one at a time on a blocking worker.
///
/// Requests that were superseded while queued are skipped without decoding,
/// and a result that became stale during decode is dropped rather than sent.
#[instrument(skip_all)]
pub async fn run<P: Presenter>(
    mut requests: Receiver<RenderRequest>,
    results: Sender<RenderResult>,
    presenter: Arc<P>,
    latest: LatestGeneration,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let request = select! {
            _ = cancel.cancelled() => break,
            maybe = requests.recv() => match maybe {
                Some(request) => request,
                None => break,
            },
        };

        if is_stale(&latest, request.generation) {
            debug!(generation = request.generation, "skipping superseded render");
            continue;
        }

        let generation = request.generation;
        let path = request.path.clone();
        let worker = {
            let presenter = Arc::clone(&presenter);
            tokio::task::spawn_blocking(move || presenter.render(&request))
        };
        let joined = select! {
            _ = cancel.cancelled() => break,
            joined = worker => joined,
        };

        let outcome = match joined {
            Ok(Ok(image)) => {
                debug!(path = %path.display(), width = image.width, height = image.height, "rendered");
                RenderOutcome::Rendered(Arc::new(image))
            }
            Ok(Err(err)) => {
                debug!(path = %path.display(), "render failed: {err}");
                RenderOutcome::Invalid(err.to_string())
            }
            Err(err) => {
                warn!(path = %path.display(), "render worker failed: {err}");
                RenderOutcome::Invalid(format!("render worker failed: {err}"))
            }
        };

        if is_stale(&latest, generation) {
            debug!(generation, "dropping render superseded during decode");
            continue;
        }
        if results
            .send(RenderResult {
                generation,
                outcome,
            })
            .await
            .is_err()
        {
            debug!("session closed; exiting render task");
            break;
        }
    }
    Ok(())
}
