use std::collections::{BTreeSet, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::config::TraversalConfig;
use crate::error::TraversalError;
use crate::graph::{Graph, VertexId};
use crate::state::ExecutionState;

/// Poll point between steps: blocks while paused, then reports whether the
/// run should go on.
pub(crate) fn checkpoint(state: &ExecutionState, config: &TraversalConfig) -> bool {
    state.wait_if_paused(config.pause_poll());
    state.is_running()
}

/// Breadth-first traversal from `start`, returning vertices in dequeue order.
///
/// `state.visited` receives vertices as they are discovered, which for a FIFO
/// queue is the same order. An absent start yields an empty result. A stop
/// request ends the run at the next vertex boundary with the partial order.
pub fn bfs(
    graph: &Graph,
    start: VertexId,
    state: &ExecutionState,
    config: &TraversalConfig,
) -> Vec<VertexId> {
    state.begin();
    bfs_started(graph, start, state, config)
}

/// [`bfs`] on a state the caller already moved into running.
pub(crate) fn bfs_started(
    graph: &Graph,
    start: VertexId,
    state: &ExecutionState,
    config: &TraversalConfig,
) -> Vec<VertexId> {
    let mut order = Vec::new();

    if !graph.has_vertex(start) {
        debug!(start, "bfs: start vertex not in graph");
        state.finish();
        return order;
    }

    let mut visited: FxHashSet<VertexId> = FxHashSet::default();
    let mut queue: VecDeque<VertexId> = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);
    state.mark_visited(start);

    while !queue.is_empty() {
        if !checkpoint(state, config) {
            debug!(start, processed = order.len(), "bfs: stop requested");
            break;
        }
        let Some(current) = queue.pop_front() else {
            break;
        };
        order.push(current);
        state.set_current(current);
        trace!(vertex = current, "bfs: dequeued");

        for neighbor in graph.neighbors(current) {
            if visited.insert(neighbor) {
                queue.push_back(neighbor);
                state.mark_discovered(neighbor);
            }
        }

        config.pace();
    }

    state.finish();
    debug!(start, visited = order.len(), "bfs: finished");
    order
}

/// Depth-first traversal in recursive pre-order.
///
/// Runs on an explicit frame stack, so deep graphs cannot exhaust the worker
/// thread's stack. Same absent-start and stop handling as [`bfs`].
pub fn dfs(
    graph: &Graph,
    start: VertexId,
    state: &ExecutionState,
    config: &TraversalConfig,
) -> Vec<VertexId> {
    state.begin();
    dfs_started(graph, start, state, config)
}

pub(crate) fn dfs_started(
    graph: &Graph,
    start: VertexId,
    state: &ExecutionState,
    config: &TraversalConfig,
) -> Vec<VertexId> {
    if !graph.has_vertex(start) {
        debug!(start, "dfs: start vertex not in graph");
        state.finish();
        return Vec::new();
    }

    let mut walk = DfsWalk {
        graph,
        state,
        config,
        visited: FxHashSet::default(),
        stack: Vec::new(),
        order: Vec::new(),
    };

    if checkpoint(state, config) {
        walk.enter(start);
    }

    loop {
        let next = match walk.stack.last_mut() {
            None => break,
            Some(frame) => {
                let next = frame.neighbors.get(frame.next).copied();
                frame.next += 1;
                next
            }
        };
        match next {
            None => {
                walk.stack.pop();
            }
            Some(v) if walk.visited.contains(&v) => {}
            Some(v) => {
                if !checkpoint(state, config) {
                    debug!(start, processed = walk.order.len(), "dfs: stop requested");
                    break;
                }
                walk.enter(v);
            }
        }
    }

    state.finish();
    debug!(start, visited = walk.order.len(), "dfs: finished");
    walk.order
}

struct DfsFrame {
    neighbors: Vec<VertexId>,
    next: usize,
}

struct DfsWalk<'a> {
    graph: &'a Graph,
    state: &'a ExecutionState,
    config: &'a TraversalConfig,
    visited: FxHashSet<VertexId>,
    stack: Vec<DfsFrame>,
    order: Vec<VertexId>,
}

impl DfsWalk<'_> {
    fn enter(&mut self, v: VertexId) {
        self.visited.insert(v);
        self.order.push(v);
        self.state.mark_visited(v);
        trace!(vertex = v, depth = self.stack.len(), "dfs: entered");
        self.stack.push(DfsFrame {
            neighbors: self.graph.neighbors(v),
            next: 0,
        });
        self.config.pace();
    }
}

/// Single-pair shortest path by Dijkstra relaxation without a heap.
///
/// Each round scans the unvisited set for the minimum tentative distance,
/// O(V²) overall; the graphs this runs on are small enough for that. Among
/// equal distances the lowest vertex id is selected. The run stops as soon as
/// `end` is selected and returns the path `start..=end`; the path is empty
/// when `end` is unreachable or either endpoint is absent. Weights are
/// assumed non-negative.
///
/// A neighbor with no edge record aborts with
/// [`TraversalError::MissingEdge`].
pub fn dijkstra(
    graph: &Graph,
    start: VertexId,
    end: VertexId,
    state: &ExecutionState,
    config: &TraversalConfig,
) -> Result<Vec<VertexId>, TraversalError> {
    state.begin();
    dijkstra_started(graph, start, end, state, config)
}

pub(crate) fn dijkstra_started(
    graph: &Graph,
    start: VertexId,
    end: VertexId,
    state: &ExecutionState,
    config: &TraversalConfig,
) -> Result<Vec<VertexId>, TraversalError> {
    let result = relax_until(graph, start, end, state, config);
    if let Ok(path) = &result {
        state.set_path(path.clone());
    }
    state.finish();
    result
}

fn relax_until(
    graph: &Graph,
    start: VertexId,
    end: VertexId,
    state: &ExecutionState,
    config: &TraversalConfig,
) -> Result<Vec<VertexId>, TraversalError> {
    if !graph.has_vertex(start) || !graph.has_vertex(end) {
        debug!(start, end, "dijkstra: endpoint not in graph");
        return Ok(Vec::new());
    }

    let vertices = graph.vertices();
    let mut distances: FxHashMap<VertexId, f64> =
        vertices.iter().map(|&v| (v, f64::INFINITY)).collect();
    let mut previous: FxHashMap<VertexId, VertexId> = FxHashMap::default();
    // Ordered so the scan below meets lower ids first
    let mut unvisited: BTreeSet<VertexId> = vertices.into_iter().collect();
    distances.insert(start, 0.0);
    unvisited.insert(start);

    while !unvisited.is_empty() {
        if !checkpoint(state, config) {
            debug!(start, end, "dijkstra: stop requested");
            return Ok(Vec::new());
        }

        let mut current = None;
        let mut min_dist = f64::INFINITY;
        for &v in &unvisited {
            let d = distances.get(&v).copied().unwrap_or(f64::INFINITY);
            if d < min_dist {
                min_dist = d;
                current = Some(v);
            }
        }
        let Some(current) = current else {
            debug!(start, end, "dijkstra: end unreachable");
            return Ok(Vec::new());
        };

        unvisited.remove(&current);
        state.mark_visited(current);
        trace!(vertex = current, distance = min_dist, "dijkstra: settled");

        if current == end {
            let path = reconstruct_path(&previous, start, end);
            debug!(start, end, cost = min_dist, hops = path.len() - 1, "dijkstra: path found");
            return Ok(path);
        }

        for neighbor in graph.neighbors(current) {
            if !unvisited.contains(&neighbor) {
                continue;
            }
            let edge = graph
                .edge(current, neighbor)
                .ok_or(TraversalError::MissingEdge {
                    from: current,
                    to: neighbor,
                })?;
            let alt = min_dist + edge.weight;
            if alt < distances.get(&neighbor).copied().unwrap_or(f64::INFINITY) {
                distances.insert(neighbor, alt);
                previous.insert(neighbor, current);
            }
        }

        config.pace();
    }

    Ok(Vec::new())
}

/// Walk `previous` links back from `end`; `start` has no entry.
fn reconstruct_path(
    previous: &FxHashMap<VertexId, VertexId>,
    start: VertexId,
    end: VertexId,
) -> Vec<VertexId> {
    let mut path = vec![end];
    let mut current = end;
    while current != start {
        match previous.get(&current) {
            Some(&parent) => {
                path.push(parent);
                current = parent;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Summed weight along `path`, or `None` if a hop has no edge.
pub fn path_cost(graph: &Graph, path: &[VertexId]) -> Option<f64> {
    path.windows(2)
        .map(|pair| graph.edge(pair[0], pair[1]).map(|e| e.weight))
        .sum()
}
