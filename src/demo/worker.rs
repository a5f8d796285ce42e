use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use coordinator_core::MessageWorker;
use tracing::info;

/// A `MessageWorker` that just logs what it received and counts how many
/// messages it has handled, standing in for whatever real dispatch logic a
/// consumer of this crate would plug in here.
#[derive(Default)]
pub struct LoggingMessageWorker {
    processed: AtomicU64,
}

impl LoggingMessageWorker {
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MessageWorker for LoggingMessageWorker {
    async fn on_do_work(&self, payload: &[u8]) {
        let count = self.processed.fetch_add(1, Ordering::AcqRel) + 1;
        let text = String::from_utf8_lossy(payload);
        info!(message_number = count, payload = %text, "processed a message");
    }
}
