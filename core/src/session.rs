//! Run control for one graph: start an algorithm on a background worker,
//! pause/resume/stop it through the shared [`ExecutionState`], and collect
//! the outcome without blocking the caller's loop.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::algorithms;
use crate::config::TraversalConfig;
use crate::error::{ConfigError, SessionError, TraversalError};
use crate::graph::{Graph, VertexId};
use crate::parallel;
use crate::pool::TaskPool;
use crate::state::ExecutionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Bfs,
    Dfs,
    Dijkstra,
    ParallelBfs,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Bfs,
        Algorithm::Dfs,
        Algorithm::Dijkstra,
        Algorithm::ParallelBfs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Bfs => "bfs",
            Algorithm::Dfs => "dfs",
            Algorithm::Dijkstra => "dijkstra",
            Algorithm::ParallelBfs => "parallel_bfs",
        }
    }
}

/// Result of one finished (or stopped) run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub algorithm: Algorithm,
    pub start: VertexId,
    pub end: Option<VertexId>,
    /// Processing order for traversals; the path for Dijkstra.
    pub order: Vec<VertexId>,
    /// Empty unless a shortest path was found.
    pub path: Vec<VertexId>,
    pub elapsed_ms: f64,
}

type Worker = JoinHandle<Result<RunOutcome, TraversalError>>;

pub struct Session {
    graph: Arc<Graph>,
    state: Arc<ExecutionState>,
    config: TraversalConfig,
    start: Option<VertexId>,
    end: Option<VertexId>,
    worker: Option<Worker>,
}

impl Session {
    pub fn new(graph: Arc<Graph>, config: TraversalConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            graph,
            state: Arc::new(ExecutionState::new()),
            config,
            start: None,
            end: None,
            worker: None,
        })
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// Shared state for observers; poll it at any rate.
    pub fn state(&self) -> Arc<ExecutionState> {
        Arc::clone(&self.state)
    }

    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    pub fn select_start(&mut self, vertex: VertexId) {
        self.start = Some(vertex);
    }

    pub fn select_end(&mut self, vertex: VertexId) {
        self.end = Some(vertex);
    }

    pub fn selected_start(&self) -> Option<VertexId> {
        self.start
    }

    pub fn selected_end(&self) -> Option<VertexId> {
        self.end
    }

    /// True while a worker exists and has not returned.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Launch `algorithm` on a dedicated worker thread.
    ///
    /// Without a selected start the smallest vertex id is used (and becomes
    /// the selection). Dijkstra additionally needs [`Session::select_end`].
    pub fn start(&mut self, algorithm: Algorithm) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }
        if let Some(stale) = self.worker.take() {
            // Finished but never collected; its outcome is superseded
            let _ = stale.join();
        }

        let start = match self.start {
            Some(start) => start,
            None => {
                let first = self
                    .graph
                    .vertices()
                    .first()
                    .copied()
                    .ok_or(SessionError::EmptyGraph)?;
                self.start = Some(first);
                first
            }
        };
        let end = match (algorithm, self.end) {
            (Algorithm::Dijkstra, None) => return Err(SessionError::MissingTarget),
            (Algorithm::Dijkstra, end) => end,
            _ => None,
        };

        let graph = Arc::clone(&self.graph);
        let state = Arc::clone(&self.state);
        let config = self.config.clone();

        info!(algorithm = algorithm.name(), start, ?end, "starting algorithm");
        // Running before the worker exists; the worker must not begin() again
        self.state.begin();
        let spawned = thread::Builder::new()
            .name(format!("graph-vis-{}", algorithm.name()))
            .spawn(move || {
                let outcome = run(algorithm, &graph, start, end, &state, &config);
                state.finish();
                outcome
            });
        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(err) => {
                self.state.finish();
                Err(SessionError::Spawn(err))
            }
        }
    }

    /// Flip pause on the running algorithm. `None` when nothing is running.
    pub fn toggle_pause(&self) -> Option<bool> {
        if !self.is_running() {
            return None;
        }
        let paused = self.state.toggle_pause();
        info!(paused, "pause toggled");
        Some(paused)
    }

    /// Ask the running algorithm to stop at its next poll point.
    pub fn stop(&self) {
        self.state.request_stop();
    }

    /// Collect the outcome if the worker has finished; never blocks.
    pub fn poll(&mut self) -> Option<Result<RunOutcome, SessionError>> {
        if self.worker.as_ref()?.is_finished() {
            self.wait()
        } else {
            None
        }
    }

    /// Block until the worker returns. `None` when nothing was started.
    pub fn wait(&mut self) -> Option<Result<RunOutcome, SessionError>> {
        let worker = self.worker.take()?;
        let outcome = match worker.join() {
            Ok(Ok(outcome)) => {
                info!(
                    algorithm = outcome.algorithm.name(),
                    processed = outcome.order.len(),
                    elapsed_ms = outcome.elapsed_ms,
                    "algorithm finished"
                );
                Ok(outcome)
            }
            Ok(Err(err)) => Err(SessionError::from(err)),
            Err(_) => Err(SessionError::WorkerPanicked),
        };
        Some(outcome)
    }

    /// Stop and join any run, clear the state and both selections.
    pub fn reset(&mut self) {
        self.state.request_stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.state.reset();
        self.start = None;
        self.end = None;
        debug!("session reset");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.state.request_stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run(
    algorithm: Algorithm,
    graph: &Arc<Graph>,
    start: VertexId,
    end: Option<VertexId>,
    state: &ExecutionState,
    config: &TraversalConfig,
) -> Result<RunOutcome, TraversalError> {
    let started = Instant::now();
    // The caller has already called `state.begin()`
    let (order, path) = match (algorithm, end) {
        (Algorithm::Bfs, _) => (
            algorithms::bfs_started(graph, start, state, config),
            Vec::new(),
        ),
        (Algorithm::Dfs, _) => (
            algorithms::dfs_started(graph, start, state, config),
            Vec::new(),
        ),
        (Algorithm::Dijkstra, Some(end)) => {
            let path = algorithms::dijkstra_started(graph, start, end, state, config)?;
            (path.clone(), path)
        }
        (Algorithm::Dijkstra, None) => (Vec::new(), Vec::new()),
        (Algorithm::ParallelBfs, _) => {
            let pool = TaskPool::new(config.workers)?;
            let order = parallel::parallel_bfs_started(graph, start, state, &pool, config)?;
            (order, Vec::new())
        }
    };

    Ok(RunOutcome {
        algorithm,
        start,
        end,
        order,
        path,
        elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{make_chain, scenario_graph};
    use std::time::Duration;

    fn session(graph: Graph, step_delay_ms: u64) -> Session {
        let config = TraversalConfig::unthrottled().with_step_delay_ms(step_delay_ms);
        Session::new(Arc::new(graph), config).unwrap()
    }

    #[test]
    fn test_bfs_run_to_completion() {
        let mut s = session(scenario_graph(), 0);
        s.select_start(1);
        s.start(Algorithm::Bfs).unwrap();
        let outcome = s.wait().unwrap().unwrap();
        assert_eq!(outcome.algorithm, Algorithm::Bfs);
        assert_eq!(outcome.order.len(), 8);
        assert!(outcome.path.is_empty());
        assert_eq!(s.state().visited_len(), 8);
        assert!(!s.is_running());
    }

    #[test]
    fn test_dijkstra_needs_end() {
        let mut s = session(scenario_graph(), 0);
        s.select_start(1);
        assert!(matches!(
            s.start(Algorithm::Dijkstra),
            Err(SessionError::MissingTarget)
        ));

        s.select_end(5);
        s.start(Algorithm::Dijkstra).unwrap();
        let outcome = s.wait().unwrap().unwrap();
        assert_eq!(outcome.path, vec![1, 2, 5]);
        assert_eq!(outcome.end, Some(5));
        assert_eq!(s.state().path(), vec![1, 2, 5]);
    }

    #[test]
    fn test_default_start_is_smallest_id() {
        let mut s = session(scenario_graph(), 0);
        s.start(Algorithm::Dfs).unwrap();
        assert_eq!(s.selected_start(), Some(1));
        assert_eq!(s.wait().unwrap().unwrap().order[0], 1);
    }

    #[test]
    fn test_empty_graph_refused() {
        let mut s = session(Graph::new(false), 0);
        assert!(matches!(s.start(Algorithm::Bfs), Err(SessionError::EmptyGraph)));
        assert!(s.wait().is_none());
    }

    #[test]
    fn test_second_start_refused_while_running() {
        let mut s = session(make_chain(200, false), 5);
        s.start(Algorithm::Bfs).unwrap();
        assert!(s.is_running());
        assert!(matches!(
            s.start(Algorithm::Dfs),
            Err(SessionError::AlreadyRunning)
        ));
        s.stop();
        let outcome = s.wait().unwrap().unwrap();
        assert!(outcome.order.len() < 200);
    }

    #[test]
    fn test_toggle_pause_and_poll() {
        let mut s = session(make_chain(30, false), 2);
        assert_eq!(s.toggle_pause(), None);

        s.start(Algorithm::ParallelBfs).unwrap();
        assert_eq!(s.toggle_pause(), Some(true));
        thread::sleep(Duration::from_millis(50));
        assert!(s.poll().is_none());
        assert_eq!(s.toggle_pause(), Some(false));

        let outcome = loop {
            if let Some(outcome) = s.poll() {
                break outcome.unwrap();
            }
            thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(outcome.order.len(), 30);
    }

    #[test]
    fn test_stop_right_after_start_is_honoured() {
        for _ in 0..20 {
            let mut s = session(make_chain(100, false), 5);
            s.start(Algorithm::Bfs).unwrap();
            s.stop();
            let outcome = s.wait().unwrap().unwrap();
            assert!(outcome.order.len() <= 1, "ran {} steps", outcome.order.len());
            assert!(!s.state().is_running());
        }
    }

    #[test]
    fn test_pause_right_after_start_holds() {
        for _ in 0..10 {
            let mut s = session(make_chain(100, false), 5);
            s.start(Algorithm::Dfs).unwrap();
            assert_eq!(s.toggle_pause(), Some(true));
            thread::sleep(Duration::from_millis(50));
            assert!(s.state().is_paused());
            assert!(s.state().visited_len() <= 1);
            assert!(s.is_running());
            s.stop();
            assert!(s.wait().unwrap().unwrap().order.len() <= 1);
        }
    }

    #[test]
    fn test_reset_does_not_wait_for_whole_run() {
        let mut s = session(make_chain(200, false), 20);
        s.start(Algorithm::Bfs).unwrap();
        let began = Instant::now();
        s.reset();
        assert!(began.elapsed() < Duration::from_secs(2));
        assert!(s.state().visited().is_empty());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut s = session(make_chain(100, false), 5);
        s.select_start(10);
        s.select_end(20);
        s.start(Algorithm::Bfs).unwrap();
        s.reset();
        assert!(!s.is_running());
        assert_eq!(s.selected_start(), None);
        assert_eq!(s.selected_end(), None);
        let snap = s.state().snapshot();
        assert!(!snap.running);
        assert!(snap.visited.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TraversalConfig::default().with_workers(0);
        assert!(Session::new(Arc::new(Graph::new(false)), config).is_err());
    }

    #[test]
    fn test_outcome_serializes() {
        let mut s = session(scenario_graph(), 0);
        s.start(Algorithm::ParallelBfs).unwrap();
        let outcome = s.wait().unwrap().unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["algorithm"], "parallel_bfs");
        assert_eq!(json["order"].as_array().unwrap().len(), 8);
    }
}
