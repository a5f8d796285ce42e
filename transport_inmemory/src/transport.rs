use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use transport_core::{Message, QueueAddress, QueueProperties, Transport, TransportError};

use crate::bus::InMemoryBus;

/// How long a single `receive` poll waits on the bus before re-checking cancellation.
///
/// The in-memory bus itself has no native cancellation support, so `receive` drives its
/// own short-timeout poll loop and race it against the cancellation token instead.
const RECEIVE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A `Transport` handle bound to one queue address on a shared [`InMemoryBus`].
///
/// Cloning is cheap: it shares the same underlying bus and address.
#[derive(Clone)]
pub struct InMemoryTransport {
    bus: Arc<InMemoryBus>,
    address: QueueAddress,
}

impl InMemoryTransport {
    pub fn new(bus: Arc<InMemoryBus>, address: QueueAddress) -> Self {
        bus.ensure_queue(&address);
        Self { bus, address }
    }

    /// Directly publish a message onto this transport's queue, bypassing `send`'s
    /// destination-address indirection. Handy for demo/test seeding.
    pub async fn publish(&self, message: Message) -> Result<(), TransportError> {
        self.bus
            .send(&self.address, message)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn address(&self) -> &QueueAddress {
        &self.address
    }

    async fn create_queue(&self, address: &QueueAddress) -> Result<(), TransportError> {
        self.bus.ensure_queue(address);
        Ok(())
    }

    async fn send(
        &self,
        destination: &QueueAddress,
        message: Message,
        _context: &transport_core::TransactionContext,
    ) -> Result<(), TransportError> {
        self.bus
            .send(destination, message)
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn receive(
        &self,
        _context: &transport_core::TransactionContext,
        token: &CancellationToken,
    ) -> Result<Option<Message>, TransportError> {
        if token.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        tokio::select! {
            biased;

            () = token.cancelled() => Err(TransportError::Cancelled),
            message = self.bus.recv_with_timeout(&self.address, RECEIVE_POLL_INTERVAL) => {
                if message.is_some() {
                    debug!(queue = %self.address, "in-memory transport delivered a message");
                }
                Ok(message)
            }
        }
    }

    async fn get_properties(
        &self,
        _token: &CancellationToken,
    ) -> Result<QueueProperties, TransportError> {
        Ok(QueueProperties {
            approximate_depth: Some(self.bus.approximate_depth(&self.address)),
            extra: Default::default(),
        })
    }
}
