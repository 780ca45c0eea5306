//! Traversals that fan work out over a [`TaskPool`].
//!
//! Only breadth-first search is genuinely parallel. Depth-first search and
//! connected components keep their sequential implementations: safe parallel
//! depth-first branching and concurrent union-find are out of reach of this
//! design, and the `parallel_*` entry points for them say so by delegating.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::algorithms::{self, checkpoint};
use crate::config::TraversalConfig;
use crate::error::TraversalError;
use crate::graph::{Graph, VertexId};
use crate::pool::TaskPool;
use crate::state::ExecutionState;

/// Visited set and next-level queue, guarded together so a vertex is
/// enqueued at most once no matter how many expansion tasks discover it.
#[derive(Default)]
struct Frontier {
    visited: FxHashSet<VertexId>,
    next: Vec<VertexId>,
}

/// Level-synchronous breadth-first traversal.
///
/// Every vertex of the current level becomes one pool task that looks up its
/// neighbors and claims the unvisited ones for the next level. The level is
/// fully awaited before the next one starts, so level boundaries match the
/// sequential order while the order inside a level is unspecified. Pacing is
/// applied once per level.
///
/// Absent start yields an empty result. Pool failures (including a pool
/// already shut down) are returned as [`TraversalError::Pool`].
pub fn parallel_bfs(
    graph: &Arc<Graph>,
    start: VertexId,
    state: &ExecutionState,
    pool: &TaskPool,
    config: &TraversalConfig,
) -> Result<Vec<VertexId>, TraversalError> {
    state.begin();
    parallel_bfs_started(graph, start, state, pool, config)
}

/// [`parallel_bfs`] on a state the caller already moved into running.
pub(crate) fn parallel_bfs_started(
    graph: &Arc<Graph>,
    start: VertexId,
    state: &ExecutionState,
    pool: &TaskPool,
    config: &TraversalConfig,
) -> Result<Vec<VertexId>, TraversalError> {
    let result = expand_levels(graph, start, state, pool, config);
    state.finish();
    result
}

fn expand_levels(
    graph: &Arc<Graph>,
    start: VertexId,
    state: &ExecutionState,
    pool: &TaskPool,
    config: &TraversalConfig,
) -> Result<Vec<VertexId>, TraversalError> {
    let mut order = Vec::new();
    if !graph.has_vertex(start) {
        debug!(start, "parallel bfs: start vertex not in graph");
        return Ok(order);
    }

    let frontier = Arc::new(Mutex::new(Frontier::default()));
    frontier.lock().visited.insert(start);

    let mut level = vec![start];
    let mut depth = 0usize;

    while !level.is_empty() {
        if !checkpoint(state, config) {
            debug!(start, depth, processed = order.len(), "parallel bfs: stop requested");
            break;
        }

        let mut pending = Vec::with_capacity(level.len());
        for &vertex in &level {
            order.push(vertex);
            state.mark_visited(vertex);

            let graph = Arc::clone(graph);
            let frontier = Arc::clone(&frontier);
            pending.push(pool.submit(move || {
                let neighbors = graph.neighbors(vertex);
                let mut frontier = frontier.lock();
                for neighbor in neighbors {
                    if frontier.visited.insert(neighbor) {
                        frontier.next.push(neighbor);
                    }
                }
            })?);
        }
        for handle in pending {
            handle.wait()?;
        }

        level = std::mem::take(&mut frontier.lock().next);
        trace!(depth, next_width = level.len(), "parallel bfs: level expanded");
        depth += 1;
        config.pace();
    }

    debug!(start, levels = depth, visited = order.len(), "parallel bfs: finished");
    Ok(order)
}

/// Depth-first traversal. Runs sequentially; see the module docs.
pub fn parallel_dfs(
    graph: &Graph,
    start: VertexId,
    state: &ExecutionState,
    config: &TraversalConfig,
) -> Vec<VertexId> {
    algorithms::dfs(graph, start, state, config)
}

/// Connected components. Runs sequentially; see the module docs.
pub fn parallel_connected_components(graph: &Graph) -> Vec<Vec<VertexId>> {
    graph.connected_components()
}

/// Out-degree of every vertex, computed in one pool task per chunk of
/// vertices.
pub fn parallel_degrees(
    graph: &Arc<Graph>,
    pool: &TaskPool,
) -> Result<FxHashMap<VertexId, usize>, TraversalError> {
    let vertices = graph.vertices();
    if vertices.is_empty() {
        return Ok(FxHashMap::default());
    }

    let chunk_size = vertices.len().div_ceil(pool.size());
    let handles = vertices
        .chunks(chunk_size)
        .map(|chunk| {
            let graph = Arc::clone(graph);
            let chunk = chunk.to_vec();
            pool.submit(move || {
                chunk
                    .into_iter()
                    .map(|v| (v, graph.degree(v)))
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut degrees = FxHashMap::default();
    for handle in handles {
        degrees.extend(handle.wait()?);
    }
    Ok(degrees)
}
