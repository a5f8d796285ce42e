//! The transport contract consumed by message readers (not by the coordinator itself).
//!
//! A `Transport` is the only thing in this repository that is allowed to know about wires,
//! brokers, or sockets. The coordinator never holds one; it is handed to `MessageReader`
//! implementations by the reader factory. See `transport_inmemory` for the one concrete
//! implementation this repository ships.

mod error;
mod message;

pub use error::TransportError;
pub use message::{Message, QueueAddress, QueueProperties, TransactionContext};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Callback hooks invoked when a transaction started around a `receive` completes.
///
/// Most transports don't have real transactions (the in-memory one doesn't), but the
/// contract is kept so that a future real broker-backed transport can slot in without
/// changing any reader code.
#[async_trait]
pub trait TransactionHooks: Send + Sync {
    async fn on_committed(&self, context: &TransactionContext);
    async fn on_aborted(&self, context: &TransactionContext);
}

/// A transport capable of sending and receiving opaque messages on a queue.
///
/// Implementations must be `Send + Sync`: the reader factory may hand the same transport
/// handle to readers running on arbitrary worker tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The queue address this transport instance is bound to.
    fn address(&self) -> &QueueAddress;

    /// Ensure the given queue exists. Implementations that have no notion of queue
    /// provisioning (e.g. the in-memory transport) may treat this as a no-op.
    async fn create_queue(&self, address: &QueueAddress) -> Result<(), TransportError>;

    /// Send a message to the given destination address.
    async fn send(
        &self,
        destination: &QueueAddress,
        message: Message,
        context: &TransactionContext,
    ) -> Result<(), TransportError>;

    /// Attempt to receive one message, honoring cancellation. Returns `None` when the
    /// queue is currently empty (not an error) or when `token` is cancelled while waiting.
    async fn receive(
        &self,
        context: &TransactionContext,
        token: &CancellationToken,
    ) -> Result<Option<Message>, TransportError>;

    /// Transport-reported properties (depth, throughput, anything implementation-specific).
    async fn get_properties(
        &self,
        token: &CancellationToken,
    ) -> Result<QueueProperties, TransportError>;
}
