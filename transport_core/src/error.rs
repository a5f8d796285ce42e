use miette::Diagnostic;
use thiserror::Error;

use crate::message::QueueAddress;

#[derive(Error, Debug, Diagnostic)]
pub enum TransportError {
    #[error("queue \"{address}\" does not exist and could not be created")]
    QueueUnavailable { address: QueueAddress },

    #[error("transport is closed")]
    Closed,

    #[error("transport operation was cancelled")]
    Cancelled,
}
