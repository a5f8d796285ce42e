//! A dependency-free in-process `Transport`: the "in-memory network" used by the demo
//! binary and by `coordinator_core`'s own integration tests so neither has to talk to a
//! real broker.

mod bus;
mod transport;

pub use bus::InMemoryBus;
pub use transport::InMemoryTransport;
