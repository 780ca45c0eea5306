use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Caller-assigned vertex identifier.
pub type VertexId = i64;

/// A vertex record. Position is owned by the layout layer; traversals ignore it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub label: String,
    pub x: f64,
    pub y: f64,
}

/// One stored adjacency entry.
///
/// Undirected graphs store every edge twice (`a -> b` and its mirror
/// `b -> a`) with the same weight and label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: VertexId,
    pub to: VertexId,
    pub weight: f64,
    pub directed: bool,
    /// Relation type, e.g. `lecturer_of` in knowledge-graph inputs.
    pub label: Option<String>,
}

impl Edge {
    pub const DEFAULT_WEIGHT: f64 = 1.0;

    /// Deduplication key: the ordered pair for directed edges, the sorted pair
    /// for undirected ones.
    fn canonical_key(&self) -> (VertexId, VertexId) {
        if self.directed || self.from <= self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    vertices: FxHashMap<VertexId, Vertex>,
    adjacency: FxHashMap<VertexId, Vec<Edge>>,
    /// Entries `edge()` pretends not to have, for exercising callers against
    /// an adjacency list that disagrees with the edge records.
    #[cfg(test)]
    hidden: FxHashSet<(VertexId, VertexId)>,
}

impl Inner {
    fn insert_vertex(&mut self, id: VertexId, label: &str) {
        if self.vertices.contains_key(&id) {
            return;
        }
        self.vertices.insert(
            id,
            Vertex {
                id,
                label: label.to_string(),
                x: 0.0,
                y: 0.0,
            },
        );
        self.adjacency.entry(id).or_default();
    }

    /// Insert or overwrite the `from -> to` entry. Never duplicates a pair.
    fn upsert_entry(
        &mut self,
        from: VertexId,
        to: VertexId,
        weight: f64,
        directed: bool,
        label: Option<&str>,
    ) {
        debug_assert!(weight.is_finite(), "edge {from}->{to} has non-finite weight {weight}");
        let edges = self.adjacency.entry(from).or_default();
        match edges.iter_mut().find(|e| e.to == to) {
            Some(existing) => {
                existing.weight = weight;
                if let Some(label) = label {
                    existing.label = Some(label.to_string());
                }
            }
            None => edges.push(Edge {
                from,
                to,
                weight,
                directed,
                label: label.map(str::to_string),
            }),
        }
    }

    fn remove_entry(&mut self, from: VertexId, to: VertexId) {
        if let Some(edges) = self.adjacency.get_mut(&from) {
            edges.retain(|e| e.to != to);
        }
    }

    fn sorted_ids(&self) -> Vec<VertexId> {
        let mut ids: Vec<VertexId> = self.vertices.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn unique_edges(&self) -> Vec<Edge> {
        let mut seen: FxHashSet<(VertexId, VertexId)> = FxHashSet::default();
        let mut edges = Vec::new();
        for id in self.sorted_ids() {
            for edge in self.adjacency.get(&id).map(Vec::as_slice).unwrap_or(&[]) {
                if seen.insert(edge.canonical_key()) {
                    edges.push(edge.clone());
                }
            }
        }
        edges
    }
}

/// Mutable vertex/adjacency store guarded by a single mutex.
///
/// Every method takes the lock for its whole body and returns owned copies,
/// so callers can iterate results without holding anything. Lookups of
/// missing vertices or edges return empty results instead of failing.
#[derive(Debug)]
pub struct Graph {
    directed: bool,
    inner: Mutex<Inner>,
}

impl Graph {
    pub fn new(directed: bool) -> Self {
        Self {
            directed,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn directed(&self) -> bool {
        self.directed
    }

    /// Register a vertex. Re-adding an existing id keeps its current label.
    pub fn add_vertex(&self, id: VertexId, label: &str) {
        self.inner.lock().insert_vertex(id, label);
    }

    /// Add or reweight `from -> to`, creating missing endpoints with an empty
    /// label. Undirected graphs get the mirror entry in the same critical
    /// section.
    ///
    /// `weight` must be finite (checked in debug builds). Shortest paths also
    /// assume it is non-negative; that is left to the caller.
    pub fn add_edge(&self, from: VertexId, to: VertexId, weight: f64) {
        self.insert_edge(from, to, weight, None);
    }

    /// Same as [`Graph::add_edge`], also setting the relation label.
    pub fn add_labeled_edge(&self, from: VertexId, to: VertexId, weight: f64, label: &str) {
        self.insert_edge(from, to, weight, Some(label));
    }

    fn insert_edge(&self, from: VertexId, to: VertexId, weight: f64, label: Option<&str>) {
        let mut inner = self.inner.lock();
        inner.insert_vertex(from, "");
        inner.insert_vertex(to, "");
        inner.upsert_entry(from, to, weight, self.directed, label);
        if !self.directed {
            inner.upsert_entry(to, from, weight, self.directed, label);
        }
    }

    /// Bulk load `(from, to, weight)` triples under one lock acquisition.
    ///
    /// Same implicit-creation and overwrite rules as [`Graph::add_edge`].
    pub fn load_edges<I>(&self, edges: I)
    where
        I: IntoIterator<Item = (VertexId, VertexId, f64)>,
    {
        let mut inner = self.inner.lock();
        for (from, to, weight) in edges {
            inner.insert_vertex(from, "");
            inner.insert_vertex(to, "");
            inner.upsert_entry(from, to, weight, self.directed, None);
            if !self.directed {
                inner.upsert_entry(to, from, weight, self.directed, None);
            }
        }
    }

    /// Remove a vertex and every adjacency entry that points at it. O(V+E).
    pub fn remove_vertex(&self, id: VertexId) {
        let mut inner = self.inner.lock();
        inner.vertices.remove(&id);
        inner.adjacency.remove(&id);
        for edges in inner.adjacency.values_mut() {
            edges.retain(|e| e.to != id);
        }
    }

    /// Remove `from -> to` (and its mirror when undirected).
    pub fn remove_edge(&self, from: VertexId, to: VertexId) {
        let mut inner = self.inner.lock();
        inner.remove_entry(from, to);
        if !self.directed {
            inner.remove_entry(to, from);
        }
    }

    pub fn set_vertex_position(&self, id: VertexId, x: f64, y: f64) {
        if let Some(vertex) = self.inner.lock().vertices.get_mut(&id) {
            vertex.x = x;
            vertex.y = y;
        }
    }

    pub fn has_vertex(&self, id: VertexId) -> bool {
        self.inner.lock().vertices.contains_key(&id)
    }

    pub fn has_edge(&self, from: VertexId, to: VertexId) -> bool {
        self.inner
            .lock()
            .adjacency
            .get(&from)
            .is_some_and(|edges| edges.iter().any(|e| e.to == to))
    }

    /// Copy of a vertex record.
    pub fn vertex(&self, id: VertexId) -> Option<Vertex> {
        self.inner.lock().vertices.get(&id).cloned()
    }

    /// Copy of the stored `from -> to` entry, if any.
    pub fn edge(&self, from: VertexId, to: VertexId) -> Option<Edge> {
        let inner = self.inner.lock();
        #[cfg(test)]
        if inner.hidden.contains(&(from, to)) {
            return None;
        }
        inner
            .adjacency
            .get(&from)
            .and_then(|edges| edges.iter().find(|e| e.to == to).cloned())
    }

    #[cfg(test)]
    pub(crate) fn hide_edge_record(&self, from: VertexId, to: VertexId) {
        self.inner.lock().hidden.insert((from, to));
    }

    /// Outgoing neighbors in insertion order.
    pub fn neighbors(&self, id: VertexId) -> Vec<VertexId> {
        self.inner
            .lock()
            .adjacency
            .get(&id)
            .map(|edges| edges.iter().map(|e| e.to).collect())
            .unwrap_or_default()
    }

    /// All edges with undirected mirrors collapsed to one entry.
    pub fn edges(&self) -> Vec<Edge> {
        self.inner.lock().unique_edges()
    }

    /// Vertex ids in ascending order.
    pub fn vertices(&self) -> Vec<VertexId> {
        self.inner.lock().sorted_ids()
    }

    pub fn vertex_count(&self) -> usize {
        self.inner.lock().vertices.len()
    }

    /// Number of logical edges (mirrors counted once).
    pub fn edge_count(&self) -> usize {
        self.inner.lock().unique_edges().len()
    }

    /// Outgoing adjacency length; 0 for unknown vertices.
    pub fn degree(&self, id: VertexId) -> usize {
        self.inner.lock().adjacency.get(&id).map_or(0, Vec::len)
    }

    /// Edges over the maximum possible: `n(n-1)` directed, `n(n-1)/2`
    /// undirected. Zero below two vertices.
    pub fn density(&self) -> f64 {
        let inner = self.inner.lock();
        let n = inner.vertices.len();
        if n < 2 {
            return 0.0;
        }
        let max_edges = if self.directed {
            n * (n - 1)
        } else {
            n * (n - 1) / 2
        };
        inner.unique_edges().len() as f64 / max_edges as f64
    }

    /// Partition vertices into connected groups with one depth-first sweep.
    ///
    /// Directed graphs are partitioned by weak connectivity (edge direction
    /// ignored). Groups come out in first-encountered order, seeds taken in
    /// ascending id order.
    pub fn connected_components(&self) -> Vec<Vec<VertexId>> {
        let inner = self.inner.lock();

        let mut reverse: FxHashMap<VertexId, Vec<VertexId>> = FxHashMap::default();
        if self.directed {
            for edges in inner.adjacency.values() {
                for edge in edges {
                    reverse.entry(edge.to).or_default().push(edge.from);
                }
            }
        }

        let mut visited: FxHashSet<VertexId> = FxHashSet::default();
        let mut components = Vec::new();

        for seed in inner.sorted_ids() {
            if !visited.insert(seed) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![seed];
            while let Some(v) = stack.pop() {
                component.push(v);
                let outgoing = inner.adjacency.get(&v).into_iter().flatten().map(|e| e.to);
                let incoming = reverse.get(&v).into_iter().flatten().copied();
                for next in outgoing.chain(incoming) {
                    if inner.vertices.contains_key(&next) && visited.insert(next) {
                        stack.push(next);
                    }
                }
            }
            components.push(component);
        }

        components
    }

    /// Approximate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        use std::mem::size_of;

        let inner = self.inner.lock();
        let vertices_mem: usize = inner
            .vertices
            .values()
            .map(|v| size_of::<VertexId>() + size_of::<Vertex>() + v.label.capacity())
            .sum();
        let edges_mem: usize = inner
            .adjacency
            .values()
            .map(|edges| size_of::<Vec<Edge>>() + edges.capacity() * size_of::<Edge>())
            .sum();

        vertices_mem + edges_mem
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Undirected 8-vertex graph with a weighted cycle 1..5 and a triangle 6-7-8.
    pub(crate) fn scenario_graph() -> Graph {
        let g = Graph::new(false);
        g.load_edges(vec![
            (1, 2, 1.0),
            (2, 3, 2.0),
            (3, 4, 1.5),
            (4, 5, 1.0),
            (5, 1, 2.5),
            (2, 5, 1.0),
            (3, 6, 1.0),
            (6, 7, 1.0),
            (7, 8, 1.0),
            (8, 6, 1.0),
        ]);
        g
    }

    pub(crate) fn make_chain(n: VertexId, directed: bool) -> Graph {
        let g = Graph::new(directed);
        g.load_edges((0..n - 1).map(|i| (i, i + 1, 1.0)));
        g
    }

    pub(crate) fn make_star(center: VertexId, leaves: VertexId) -> Graph {
        let g = Graph::new(false);
        g.load_edges((1..=leaves).map(|i| (center, center + i, 1.0)));
        g
    }

    #[test]
    fn test_add_vertex_keeps_first_label() {
        let g = Graph::new(false);
        g.add_vertex(1, "first");
        g.add_vertex(1, "second");
        assert_eq!(g.vertex(1).unwrap().label, "first");
        assert_eq!(g.vertex_count(), 1);
    }

    #[test]
    fn test_add_edge_creates_endpoints() {
        let g = Graph::new(true);
        g.add_edge(10, 20, 3.0);
        assert!(g.has_vertex(10));
        assert!(g.has_vertex(20));
        assert_eq!(g.vertex(20).unwrap().label, "");
        assert!(g.has_edge(10, 20));
        assert!(!g.has_edge(20, 10));
    }

    #[test]
    fn test_undirected_mirror() {
        let g = Graph::new(false);
        g.add_edge(1, 2, 4.0);
        assert!(g.has_edge(1, 2));
        assert!(g.has_edge(2, 1));
        assert_eq!(g.edge(2, 1).unwrap().weight, 4.0);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_readd_overwrites_weight() {
        let g = Graph::new(false);
        g.add_edge(1, 2, 1.0);
        g.add_edge(1, 2, 7.5);
        assert_eq!(g.degree(1), 1);
        assert_eq!(g.degree(2), 1);
        assert_eq!(g.edge(1, 2).unwrap().weight, 7.5);
        assert_eq!(g.edge(2, 1).unwrap().weight, 7.5);
    }

    #[test]
    fn test_reverse_readd_is_same_undirected_edge() {
        let g = Graph::new(false);
        g.add_edge(1, 2, 1.0);
        g.add_edge(2, 1, 2.0);
        let edges = g.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].weight, 2.0);
    }

    #[test]
    fn test_labeled_edge() {
        let g = Graph::new(false);
        g.add_labeled_edge(1, 2, 1.0, "lecturer_of");
        assert_eq!(g.edge(2, 1).unwrap().label.as_deref(), Some("lecturer_of"));
        // Reweighting without a label keeps the relation type
        g.add_edge(1, 2, 2.0);
        assert_eq!(g.edge(1, 2).unwrap().label.as_deref(), Some("lecturer_of"));
    }

    #[test]
    fn test_self_loop_stored_once() {
        let g = Graph::new(false);
        g.add_edge(3, 3, 1.0);
        assert_eq!(g.degree(3), 1);
        assert_eq!(g.neighbors(3), vec![3]);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "non-finite weight")]
    fn test_nan_weight_rejected_in_debug() {
        Graph::new(false).add_edge(1, 2, f64::NAN);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "non-finite weight")]
    fn test_infinite_weight_rejected_in_bulk_load() {
        Graph::new(true).load_edges([(1, 2, 1.0), (2, 3, f64::INFINITY)]);
    }

    #[test]
    fn test_remove_edge_undirected() {
        let g = make_chain(3, false);
        g.remove_edge(1, 0);
        assert!(!g.has_edge(0, 1));
        assert!(!g.has_edge(1, 0));
        assert!(g.has_edge(1, 2));
    }

    #[test]
    fn test_remove_edge_directed_keeps_reverse() {
        let g = Graph::new(true);
        g.add_edge(1, 2, 1.0);
        g.add_edge(2, 1, 1.0);
        g.remove_edge(1, 2);
        assert!(!g.has_edge(1, 2));
        assert!(g.has_edge(2, 1));
    }

    #[test]
    fn test_remove_vertex_scenario() {
        let g = scenario_graph();
        g.remove_vertex(6);
        assert_eq!(g.vertex_count(), 7);
        assert!(!g.has_vertex(6));
        assert!(!g.has_edge(3, 6));
        assert!(!g.has_edge(7, 6));
        assert!(!g.has_edge(8, 6));
        assert_eq!(g.degree(7), 1);
        assert_eq!(g.neighbors(7), vec![8]);
        assert_eq!(g.edge_count(), 7);
    }

    #[test]
    fn test_missing_lookups_are_lenient() {
        let g = make_chain(3, false);
        assert!(g.neighbors(99).is_empty());
        assert_eq!(g.degree(99), 0);
        assert!(g.edge(0, 99).is_none());
        assert!(g.vertex(99).is_none());
        g.remove_vertex(99);
        g.remove_edge(42, 43);
        g.set_vertex_position(99, 1.0, 1.0);
        assert_eq!(g.vertex_count(), 3);
    }

    #[test]
    fn test_set_vertex_position() {
        let g = Graph::new(false);
        g.add_vertex(1, "A");
        g.set_vertex_position(1, 12.5, -3.0);
        let v = g.vertex(1).unwrap();
        assert_eq!((v.x, v.y), (12.5, -3.0));
    }

    #[test]
    fn test_vertices_sorted() {
        let g = Graph::new(false);
        for id in [5, -1, 3, 0] {
            g.add_vertex(id, "");
        }
        assert_eq!(g.vertices(), vec![-1, 0, 3, 5]);
    }

    #[test]
    fn test_density() {
        assert_eq!(Graph::new(false).density(), 0.0);

        let single = Graph::new(false);
        single.add_vertex(1, "");
        assert_eq!(single.density(), 0.0);

        let undirected = Graph::new(false);
        undirected.load_edges(vec![(1, 2, 1.0), (2, 3, 1.0), (3, 1, 1.0)]);
        assert!((undirected.density() - 1.0).abs() < 1e-12);

        let directed = Graph::new(true);
        directed.load_edges(vec![(1, 2, 1.0), (2, 3, 1.0), (3, 1, 1.0)]);
        assert!((directed.density() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_connected_components() {
        let g = scenario_graph();
        g.add_vertex(100, "isolated");
        g.add_edge(200, 201, 1.0);

        let mut components: Vec<Vec<VertexId>> = g
            .connected_components()
            .into_iter()
            .map(|mut c| {
                c.sort_unstable();
                c
            })
            .collect();
        components.sort();

        assert_eq!(
            components,
            vec![vec![1, 2, 3, 4, 5, 6, 7, 8], vec![100], vec![200, 201]]
        );
    }

    #[test]
    fn test_connected_components_directed_is_weak() {
        let g = Graph::new(true);
        g.add_edge(2, 1, 1.0);
        g.add_edge(3, 1, 1.0);
        let components = g.connected_components();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), 3);
    }

    #[test]
    fn test_star_counts() {
        let g = make_star(0, 50);
        assert_eq!(g.vertex_count(), 51);
        assert_eq!(g.edge_count(), 50);
        assert_eq!(g.degree(0), 50);
        assert!(g.memory_usage() > 0);
    }

    #[test]
    fn test_concurrent_writers() {
        use std::sync::Arc;
        use std::thread;

        let g = Arc::new(Graph::new(false));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let g = Arc::clone(&g);
                thread::spawn(move || {
                    for i in 0..100 {
                        g.add_edge(t * 1000 + i, t * 1000 + i + 1, 1.0);
                        let _ = g.edges();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(g.edge_count(), 800);
        assert_eq!(g.vertex_count(), 808);
    }

    fn edge_list() -> impl Strategy<Value = Vec<(VertexId, VertexId, f64)>> {
        prop::collection::vec((0i64..20, 0i64..20, 0.0f64..10.0), 0..60)
    }

    proptest! {
        #[test]
        fn prop_undirected_has_edge_symmetric(edges in edge_list()) {
            let g = Graph::new(false);
            g.load_edges(edges);
            for a in 0..20 {
                for b in 0..20 {
                    prop_assert_eq!(g.has_edge(a, b), g.has_edge(b, a));
                }
            }
        }

        #[test]
        fn prop_edges_one_entry_per_pair(edges in edge_list()) {
            let g = Graph::new(false);
            g.load_edges(edges.clone());
            let expected: FxHashSet<(VertexId, VertexId)> = edges
                .iter()
                .map(|&(a, b, _)| (a.min(b), a.max(b)))
                .collect();
            let listed = g.edges();
            prop_assert_eq!(listed.len(), expected.len());
            for e in listed {
                prop_assert!(expected.contains(&(e.from.min(e.to), e.from.max(e.to))));
            }
        }
    }
}
