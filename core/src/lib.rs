//! graph-vis-core: thread-safe in-memory graph with observable traversals.
//!
//! A mutex-guarded graph store, an execution state that a worker publishes
//! progress into while an observer polls it, the sequential BFS/DFS/Dijkstra
//! algorithms, a fixed-size task pool, and a level-synchronous parallel BFS
//! built on that pool. Rendering, layout and file loading live outside this
//! crate and talk to it through [`Graph`] and [`ExecutionState`].

mod algorithms;
mod config;
mod error;
mod graph;
mod parallel;
mod pool;
mod session;
mod state;

pub use algorithms::{bfs, dfs, dijkstra, path_cost};
pub use config::{
    TraversalConfig, DEFAULT_PAUSE_POLL_MS, DEFAULT_STEP_DELAY_MS, DEFAULT_WORKERS,
};
pub use error::{ConfigError, PoolError, SessionError, TraversalError};
pub use graph::{Edge, Graph, Vertex, VertexId};
pub use parallel::{parallel_bfs, parallel_connected_components, parallel_degrees, parallel_dfs};
pub use pool::{TaskHandle, TaskPool};
pub use session::{Algorithm, RunOutcome, Session};
pub use state::{ExecutionState, StateSnapshot};
