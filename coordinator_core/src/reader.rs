//! External collaborator contracts: the message reader, its factory, and the
//! user-supplied dispatch target. These are injected dependencies the
//! coordinator and worker loop consume but never construct themselves.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::coordinator::CoordinatorAdvanced;

/// The result of one `ProcessMessage` attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessOutcome {
    /// Whether a message was actually received and dispatched this round.
    pub is_work_done: bool,
    /// Whether this reader is stepping down and should not be invoked again.
    pub is_removed: bool,
}

impl ProcessOutcome {
    pub fn idle() -> Self {
        Self {
            is_work_done: false,
            is_removed: false,
        }
    }

    pub fn worked() -> Self {
        Self {
            is_work_done: true,
            is_removed: false,
        }
    }

    pub fn removed(is_work_done: bool) -> Self {
        Self {
            is_work_done,
            is_removed: true,
        }
    }
}

/// One end-to-end message-processing attempt, invoked in a loop by a single worker.
///
/// Implementations must not let transport errors or dispatch errors escape as
/// an `Err` unless the error represents cancellation: see the failure
/// semantics in the workspace-level design notes.
#[async_trait]
pub trait MessageReader: Send + Sync {
    async fn process_message(&self, token: &CancellationToken) -> ProcessOutcome;
}

/// Creates a [`MessageReader`] bound to a given worker id and a back-reference
/// to the coordinator's advanced interface. Must be safe to call concurrently
/// from arbitrary worker tasks.
#[async_trait]
pub trait ReaderFactory: Send + Sync {
    async fn create_reader(
        &self,
        task_id: u64,
        coordinator: CoordinatorAdvanced,
    ) -> Box<dyn MessageReader>;
}

/// The user-supplied handler invoked once a reader has obtained a message.
#[async_trait]
pub trait MessageWorker: Send + Sync {
    async fn on_do_work(&self, payload: &[u8]);
}
