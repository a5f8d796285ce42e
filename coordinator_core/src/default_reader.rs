//! The reference [`MessageReader`]/[`ReaderFactory`] pair: the concrete
//! per-message algorithm described for the reader contract, generic over any
//! [`transport_core::Transport`] and [`MessageWorker`]. Downstream crates are
//! free to implement the traits themselves instead of using this pair, but
//! this is the implementation the demo binary (and most consumers) actually use.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use transport_core::{Transport, TransportError};

use crate::coordinator::CoordinatorAdvanced;
use crate::reader::{MessageReader, MessageWorker, ProcessOutcome, ReaderFactory};

/// How long a reader sleeps after an empty receive that wasn't deemed safe to
/// step down from, before trying again. Implementation-defined per the reader
/// contract; kept short since the transport's own receive already blocks for
/// a while waiting for a message.
const IDLE_BACKOFF: Duration = Duration::from_millis(25);

pub struct DefaultMessageReader {
    transport: Arc<dyn Transport>,
    message_worker: Arc<dyn MessageWorker>,
    coordinator: CoordinatorAdvanced,
}

impl DefaultMessageReader {
    pub fn new(
        transport: Arc<dyn Transport>,
        message_worker: Arc<dyn MessageWorker>,
        coordinator: CoordinatorAdvanced,
    ) -> Self {
        Self {
            transport,
            message_worker,
            coordinator,
        }
    }
}

#[async_trait]
impl MessageReader for DefaultMessageReader {
    async fn process_message(&self, token: &CancellationToken) -> ProcessOutcome {
        let context = transport_core::TransactionContext::new(0);

        let Some(permit) = self.coordinator.wait_read_async().await else {
            return ProcessOutcome::removed(false);
        };

        let receive_result = self.transport.receive(&context, token).await;
        permit.release().await;

        let message = match receive_result {
            Ok(message) => message,
            Err(TransportError::Cancelled) => return ProcessOutcome::removed(false),
            Err(error) => {
                warn!(error = %error, "transient transport error, will retry");
                None
            }
        };

        let Some(message) = message else {
            if self.coordinator.is_safe_to_remove_reader(false) {
                return ProcessOutcome::removed(false);
            }

            tokio::time::sleep(IDLE_BACKOFF).await;
            return ProcessOutcome::idle();
        };

        self.coordinator.on_before_do_work();
        {
            let coordinator = self.coordinator.clone();
            let _after_work_guard = scopeguard::guard((), move |()| {
                coordinator.on_after_do_work();
            });
            self.message_worker.on_do_work(&message.payload).await;
        }

        if self.coordinator.is_safe_to_remove_reader(true) {
            ProcessOutcome::removed(true)
        } else {
            ProcessOutcome::worked()
        }
    }
}

/// Creates a [`DefaultMessageReader`] bound to one transport and one worker
/// for every spawned coordinator task.
pub struct DefaultReaderFactory {
    transport: Arc<dyn Transport>,
    message_worker: Arc<dyn MessageWorker>,
}

impl DefaultReaderFactory {
    pub fn new(transport: Arc<dyn Transport>, message_worker: Arc<dyn MessageWorker>) -> Self {
        Self {
            transport,
            message_worker,
        }
    }
}

#[async_trait]
impl ReaderFactory for DefaultReaderFactory {
    async fn create_reader(
        &self,
        _task_id: u64,
        coordinator: CoordinatorAdvanced,
    ) -> Box<dyn MessageReader> {
        Box::new(DefaultMessageReader::new(
            self.transport.clone(),
            self.message_worker.clone(),
            coordinator,
        ))
    }
}
