// Engine error type.
//
// Search code itself is infallible: predicates and contours are total over
// well-formed input, and cancellation is a normal way for a run to end. Errors
// come from the edges: rejected configurations, reading persisted streams,
// and talking to a worker thread that has gone away.

use std::io;

use thiserror::Error;

use rhythm_loom_protocol::ConfigError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// The worker thread exited or its channels were closed.
    #[error("worker thread is no longer running")]
    WorkerGone,
}
