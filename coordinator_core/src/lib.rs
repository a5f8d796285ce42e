//! Dynamic worker-pool coordinator for message-queue consumption.
//!
//! The [`Coordinator`] maintains up to `max_workers` concurrent workers, each
//! driving a [`MessageReader`] in a loop. One worker at a time is elected
//! *primary* - the idle prober - via a single-slot compare-and-swap cell; when
//! the primary finds work it steps down and a successor prober is spawned,
//! growing the active pool only in response to demonstrated demand. Read
//! concurrency is bounded separately by an [`AsyncBottleneck`].
//!
//! See [`Coordinator::new`] for construction, and [`default_reader`] for the
//! reference reader implementation most consumers should start from.

mod bottleneck;
mod coordinator;
pub mod default_reader;
mod error;
mod reader;
mod worker;

pub use bottleneck::{AsyncBottleneck, BottleneckPermit};
pub use coordinator::{Coordinator, CoordinatorAdvanced};
pub use error::CoordinatorError;
pub use reader::{MessageReader, MessageWorker, ProcessOutcome, ReaderFactory};
