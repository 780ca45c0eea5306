use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::graph::VertexId;

#[derive(Debug, Default)]
struct Progress {
    current: Option<VertexId>,
    visited: Vec<VertexId>,
    /// Membership index for `visited`, keeps appends O(1).
    seen: FxHashSet<VertexId>,
    path: Vec<VertexId>,
}

/// Point-in-time copy of an [`ExecutionState`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub running: bool,
    pub paused: bool,
    pub current_vertex: Option<VertexId>,
    pub visited: Vec<VertexId>,
    pub path: Vec<VertexId>,
}

/// Shared progress record of one in-flight traversal.
///
/// The `running` and `paused` flags are lock-free so an observer polling at
/// frame rate never waits on the worker. The visit sequence, current vertex
/// and path sit behind a short-held mutex. Pausing is cooperative: the worker
/// calls [`ExecutionState::wait_if_paused`] between steps and sleeps on a
/// condition variable until resumed or stopped.
///
/// One state serves one algorithm invocation at a time; algorithms call
/// [`ExecutionState::begin`], which clears everything from the previous run.
#[derive(Debug, Default)]
pub struct ExecutionState {
    running: AtomicBool,
    paused: AtomicBool,
    progress: Mutex<Progress>,
    gate: Mutex<()>,
    wake: Condvar,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear flags, current vertex, visit order and path.
    pub fn reset(&self) {
        self.running.store(false, Ordering::Release);
        self.paused.store(false, Ordering::Release);
        *self.progress.lock() = Progress::default();
        self.notify();
    }

    /// Reset and mark the state as owned by a running worker.
    pub fn begin(&self) {
        self.reset();
        self.running.store(true, Ordering::Release);
    }

    /// Natural end of a run.
    pub fn finish(&self) {
        self.running.store(false, Ordering::Release);
        self.notify();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn pause(&self) {
        self.set_paused(true);
    }

    pub fn resume(&self) {
        self.set_paused(false);
    }

    /// Flip the pause flag; returns the new value.
    pub fn toggle_pause(&self) -> bool {
        let paused = !self.paused.fetch_xor(true, Ordering::AcqRel);
        self.notify();
        paused
    }

    /// Ask the worker to stop at its next poll point.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
        self.notify();
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
        self.notify();
    }

    fn notify(&self) {
        // Taking the gate orders this wake-up after a waiter's flag check.
        let _gate = self.gate.lock();
        self.wake.notify_all();
    }

    /// Block while paused and still running.
    ///
    /// Wakes on any flag change; `poll` bounds each sleep in case a flag was
    /// flipped without going through this type.
    pub fn wait_if_paused(&self, poll: Duration) {
        let mut gate = self.gate.lock();
        while self.is_paused() && self.is_running() {
            self.wake.wait_for(&mut gate, poll);
        }
    }

    /// Make `vertex` current and append it to the visit order if new.
    pub fn mark_visited(&self, vertex: VertexId) {
        let mut progress = self.progress.lock();
        progress.current = Some(vertex);
        if progress.seen.insert(vertex) {
            progress.visited.push(vertex);
        }
    }

    /// Append `vertex` to the visit order if new, leaving the current vertex
    /// alone. Used for frontier discoveries.
    pub fn mark_discovered(&self, vertex: VertexId) {
        let mut progress = self.progress.lock();
        if progress.seen.insert(vertex) {
            progress.visited.push(vertex);
        }
    }

    pub fn set_current(&self, vertex: VertexId) {
        self.progress.lock().current = Some(vertex);
    }

    pub fn set_path(&self, path: Vec<VertexId>) {
        self.progress.lock().path = path;
    }

    pub fn current_vertex(&self) -> Option<VertexId> {
        self.progress.lock().current
    }

    pub fn visited(&self) -> Vec<VertexId> {
        self.progress.lock().visited.clone()
    }

    pub fn visited_len(&self) -> usize {
        self.progress.lock().visited.len()
    }

    pub fn is_visited(&self, vertex: VertexId) -> bool {
        self.progress.lock().seen.contains(&vertex)
    }

    pub fn path(&self) -> Vec<VertexId> {
        self.progress.lock().path.clone()
    }

    /// Flags and sequences read together; sequences are consistent with each
    /// other, flags may be one transition ahead.
    pub fn snapshot(&self) -> StateSnapshot {
        let progress = self.progress.lock();
        StateSnapshot {
            running: self.is_running(),
            paused: self.is_paused(),
            current_vertex: progress.current,
            visited: progress.visited.clone(),
            path: progress.path.clone(),
        }
    }
}
