//! Error types for pool, traversal, configuration and session failures.
//!
//! Missing vertices are deliberately absent from this taxonomy: graph reads
//! and traversals report "nothing there" as empty results.

use thiserror::Error;

use crate::graph::VertexId;

/// Failures surfaced by [`crate::pool::TaskPool`].
#[derive(Debug, Error)]
pub enum PoolError {
    /// A task was submitted after `shutdown()` was requested.
    #[error("task submitted to a pool that has been shut down")]
    ShutDown,

    /// The task body panicked. The worker that ran it keeps serving the queue.
    #[error("pool task panicked: {0}")]
    TaskPanicked(String),

    /// The result channel closed before the task reported back.
    #[error("pool task result was lost before completion")]
    ResultLost,

    #[error("failed to spawn pool worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Failures raised while running a traversal.
#[derive(Debug, Error)]
pub enum TraversalError {
    /// Dijkstra relaxation enumerated a neighbor that has no edge record.
    ///
    /// Falling back to a zero weight would silently produce wrong shortest
    /// paths, so the run aborts instead.
    #[error("no edge record for neighbor {from} -> {to} during relaxation")]
    MissingEdge { from: VertexId, to: VertexId },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Invalid traversal settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be within {min}..={max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("invalid traversal config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures reported by [`crate::session::Session`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("an algorithm is already running in this session")]
    AlreadyRunning,

    #[error("graph has no vertices")]
    EmptyGraph,

    #[error("shortest path needs an end vertex; call select_end() first")]
    MissingTarget,

    #[error("failed to spawn algorithm worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("algorithm worker panicked")]
    WorkerPanicked,

    #[error(transparent)]
    Traversal(#[from] TraversalError),
}
