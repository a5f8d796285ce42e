use miette::Diagnostic;
use thiserror::Error;

/// Errors the coordinator can report synchronously. Everything that happens
/// asynchronously inside a worker (transport errors, dispatch errors) is the
/// reader's or the worker's responsibility and never surfaces here - see the
/// module-level docs on [`crate::worker`].
#[derive(Error, Debug, Diagnostic)]
pub enum CoordinatorError {
    #[error("max_workers must not be negative, got {value}")]
    NegativeMaxWorkers { value: i64 },
}
