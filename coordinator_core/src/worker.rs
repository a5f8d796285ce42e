//! The worker loop (`JobRunner`): the task body the coordinator spawns for
//! each active worker.
//!
//! Exit-accounting uses a single [`scopeguard`] wrapping the whole body rather
//! than the source's dual normal/abnormal paths - both are explicitly
//! sanctioned, and a scopeguard gives exactly-once semantics on every exit
//! route (normal return, early return, or panic unwind) without needing to
//! distinguish them.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::coordinator::{CoordinatorAdvanced, Inner};

pub(crate) async fn run_worker(inner: Arc<Inner>, worker_id: u64, cancel_token: CancellationToken) {
    let exit_inner = inner.clone();
    let _exit_guard = scopeguard::guard((), move |()| {
        exit_inner.exit_worker(worker_id);
    });

    if cancel_token.is_cancelled() {
        return;
    }

    let advanced = CoordinatorAdvanced::new(inner.clone(), worker_id);
    let reader = inner
        .reader_factory()
        .create_reader(worker_id, advanced)
        .await;

    inner.try_install_primary(worker_id);
    debug!(worker_id, "worker started");

    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        let outcome = reader.process_message(&cancel_token).await;

        if outcome.is_removed || cancel_token.is_cancelled() {
            break;
        }
    }

    inner.clear_primary_if(worker_id);
    debug!(worker_id, "worker exiting");
}
