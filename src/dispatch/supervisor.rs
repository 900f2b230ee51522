//! Restart policy for the dispatch worker.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::dispatch::worker::Dispatcher;
use crate::upstream::InferenceBackend;

/// Pause before respawning a worker that panicked.
const RESTART_PAUSE: Duration = Duration::from_millis(500);

/// Keep exactly one worker alive until shutdown or until the queue closes.
///
/// The queue receiver lives behind the dispatcher's shared mutex, so jobs
/// still waiting when a worker dies are picked up by its replacement.
pub(crate) async fn supervise<B: InferenceBackend>(
    dispatcher: Dispatcher<B>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let worker = tokio::spawn(dispatcher.clone().run(shutdown.resubscribe()));

        match worker.await {
            Ok(exit) => {
                tracing::info!(reason = ?exit, "Dispatcher stopped");
                return;
            }
            Err(e) if e.is_panic() => {
                dispatcher.stats.record_restart();
                tracing::error!(
                    restarts = dispatcher.stats.snapshot().restarts,
                    "Dispatcher worker panicked; restarting"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dispatcher worker cancelled");
                return;
            }
        }

        // A shutdown sent while the worker was down would be missed by the
        // replacement's fresh subscription.
        match shutdown.try_recv() {
            Ok(()) | Err(TryRecvError::Lagged(_)) | Err(TryRecvError::Closed) => {
                tracing::info!("Shutdown requested during restart; dispatcher stopped");
                return;
            }
            Err(TryRecvError::Empty) => {}
        }

        tokio::time::sleep(RESTART_PAUSE).await;
    }
}
