use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use transport_core::{Message, QueueAddress};

/// Default channel capacity for a freshly created queue.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

struct QueueChannel {
    sender: mpsc::Sender<Message>,
    receiver: Mutex<mpsc::Receiver<Message>>,
}

/// An in-process "network": a registry of named bounded channels standing in for what a
/// real message broker would route between processes.
///
/// Multiple `InMemoryTransport` handles can share one `InMemoryBus`, each bound to a
/// different (or the same) queue address; this is what makes it possible for several
/// workers to race to receive from the same logical queue.
#[derive(Default)]
pub struct InMemoryBus {
    queues: std::sync::Mutex<HashMap<QueueAddress, Arc<QueueChannel>>>,
}

impl InMemoryBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn queue(&self, address: &QueueAddress) -> Arc<QueueChannel> {
        let mut queues = self.queues.lock().expect("in-memory bus lock poisoned");
        queues
            .entry(address.clone())
            .or_insert_with(|| {
                let (sender, receiver) = mpsc::channel(DEFAULT_QUEUE_CAPACITY);
                Arc::new(QueueChannel {
                    sender,
                    receiver: Mutex::new(receiver),
                })
            })
            .clone()
    }

    pub(crate) fn ensure_queue(&self, address: &QueueAddress) {
        self.queue(address);
    }

    pub(crate) async fn send(
        &self,
        address: &QueueAddress,
        message: Message,
    ) -> Result<(), mpsc::error::SendError<Message>> {
        let channel = self.queue(address);
        channel.sender.send(message).await
    }

    pub(crate) async fn recv_with_timeout(
        &self,
        address: &QueueAddress,
        timeout: std::time::Duration,
    ) -> Option<Message> {
        let channel = self.queue(address);
        let mut receiver = channel.receiver.lock().await;
        tokio::time::timeout(timeout, receiver.recv())
            .await
            .ok()
            .flatten()
    }

    pub(crate) fn approximate_depth(&self, address: &QueueAddress) -> u64 {
        let queues = self.queues.lock().expect("in-memory bus lock poisoned");
        queues
            .get(address)
            .map(|channel| channel.sender.max_capacity() - channel.sender.capacity())
            .unwrap_or(0) as u64
    }
}
