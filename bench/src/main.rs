use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use graph_vis_core::{
    Algorithm, ExecutionState, Graph, Session, TaskPool, TraversalConfig, VertexId,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Benchmark and live-observer driver for graph-vis-core.
#[derive(Parser)]
#[command(name = "graph-vis-bench", version, about)]
struct Cli {
    /// Verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Time every algorithm, unthrottled, on generated graphs
    Bench {
        #[arg(value_enum, default_value_t = Mode::All)]
        mode: Mode,
        #[arg(default_value_t = 2_000)]
        node_count: u64,
        #[arg(long)]
        directed: bool,
        /// Pool size for parallel BFS (default: one per CPU)
        #[arg(long)]
        workers: Option<usize>,
        /// Print the results as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Run one algorithm in the background and poll its progress
    Watch {
        #[arg(value_enum)]
        algorithm: AlgorithmArg,
        #[arg(long, value_enum, default_value_t = Mode::Smallworld)]
        generator: Mode,
        #[arg(long, default_value_t = 200)]
        node_count: u64,
        #[arg(long)]
        directed: bool,
        #[arg(long)]
        start: Option<VertexId>,
        /// End vertex for dijkstra (default: last vertex)
        #[arg(long)]
        end: Option<VertexId>,
        /// Traversal config as JSON, e.g. '{"step_delay_ms": 20}'
        #[arg(long)]
        config: Option<String>,
        /// Observer refresh interval
        #[arg(long, default_value_t = 100)]
        refresh_ms: u64,
        /// Pause once this many vertices are visited, for --pause-ms
        #[arg(long)]
        pause_after: Option<usize>,
        #[arg(long, default_value_t = 500)]
        pause_ms: u64,
        /// Request a stop after this long
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Run every algorithm on the fixed 8-vertex reference graph
    Scenario,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    All,
    Lsystem,
    Scalefree,
    Smallworld,
    Random,
    Barbell,
    Dla,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    Bfs,
    Dfs,
    Dijkstra,
    ParallelBfs,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Bfs => Algorithm::Bfs,
            AlgorithmArg::Dfs => Algorithm::Dfs,
            AlgorithmArg::Dijkstra => Algorithm::Dijkstra,
            AlgorithmArg::ParallelBfs => Algorithm::ParallelBfs,
        }
    }
}

type Generator = fn(u64, bool) -> Graph;

fn generators(mode: Mode) -> Vec<(&'static str, Generator)> {
    match mode {
        Mode::Lsystem => vec![("L-system tree", gen_lsystem)],
        Mode::Scalefree => vec![("Scale-free (edge sampling)", gen_scale_free)],
        Mode::Smallworld => vec![("Small-world (Watts-Strogatz)", gen_small_world)],
        Mode::Random => vec![("Erdos-Renyi random", gen_random)],
        Mode::Barbell => vec![("Barbell (clique-bridge-clique)", gen_barbell)],
        Mode::Dla => vec![("DLA (organic branching)", gen_dla)],
        Mode::All => vec![
            ("L-system tree", gen_lsystem as Generator),
            ("Scale-free (edge sampling)", gen_scale_free),
            ("Small-world (Watts-Strogatz)", gen_small_world),
            ("Erdos-Renyi random", gen_random),
            ("Barbell (clique-bridge-clique)", gen_barbell),
            ("DLA (organic branching)", gen_dla),
        ],
    }
}

/// `watch` runs on exactly one graph.
fn single_generator(mode: Mode) -> Result<Generator> {
    if mode == Mode::All {
        bail!("watch needs a single generator, not `all`");
    }
    generators(mode)
        .into_iter()
        .next()
        .map(|(_, generate)| generate)
        .context("no generator selected")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_thread_names(true)
        .init();

    match cli.command {
        Command::Bench {
            mode,
            node_count,
            directed,
            workers,
            json,
        } => run_bench(mode, node_count, directed, workers, json),
        Command::Watch {
            algorithm,
            generator,
            node_count,
            directed,
            start,
            end,
            config,
            refresh_ms,
            pause_after,
            pause_ms,
            timeout_ms,
        } => {
            let config = match config {
                Some(json) => TraversalConfig::from_json(&json).context("--config")?,
                None => TraversalConfig::default(),
            };
            let generate = single_generator(generator)?;
            let graph = generate(node_count, directed);
            let watch = WatchOptions {
                start,
                end: end.or_else(|| graph.vertices().last().copied()),
                refresh: Duration::from_millis(refresh_ms),
                pause_after,
                pause_for: Duration::from_millis(pause_ms),
                timeout: timeout_ms.map(Duration::from_millis),
            };
            run_watch(graph, algorithm.into(), config, &watch)
        }
        Command::Scenario => run_scenario(),
    }
}

// ---------------------------------------------------------------------------
// Benchmark mode
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct BenchRow {
    generator: &'static str,
    algorithm: Algorithm,
    vertices: usize,
    edges: usize,
    visited: usize,
    path_hops: Option<usize>,
    elapsed_ms: f64,
}

fn run_bench(
    mode: Mode,
    node_count: u64,
    directed: bool,
    workers: Option<usize>,
    json: bool,
) -> Result<()> {
    if node_count < 2 {
        bail!("node_count must be at least 2, got {node_count}");
    }
    let pool = match workers {
        Some(n) => TaskPool::new(n)?,
        None => TaskPool::with_default_size()?,
    };
    let config = TraversalConfig::unthrottled();
    let mut rows = Vec::new();

    for (name, generator) in generators(mode) {
        let t = Instant::now();
        let graph = Arc::new(generator(node_count, directed));
        info!(
            generator = name,
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            memory_mb = graph.memory_usage() as f64 / 1_048_576.0,
            gen_ms = t.elapsed().as_secs_f64() * 1000.0,
            "graph generated"
        );
        rows.extend(bench_graph(name, &graph, &pool, &config)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:<32} {:>13} {:>10} {:>10} {:>10} {:>10}",
        "generator", "algorithm", "vertices", "visited", "hops", "time"
    );
    println!(
        "{:-<32} {:->13} {:->10} {:->10} {:->10} {:->10}",
        "", "", "", "", "", ""
    );
    for row in &rows {
        println!(
            "{:<32} {:>13} {:>10} {:>10} {:>10} {:>8.1}ms",
            row.generator,
            row.algorithm.name(),
            row.vertices,
            row.visited,
            row.path_hops.map_or_else(|| "-".to_string(), |h| h.to_string()),
            row.elapsed_ms
        );
    }
    Ok(())
}

fn bench_graph(
    name: &'static str,
    graph: &Arc<Graph>,
    pool: &TaskPool,
    config: &TraversalConfig,
) -> Result<Vec<BenchRow>> {
    let state = ExecutionState::new();
    let start = 0;
    let far = graph.vertex_count() as VertexId - 1;
    let mut rows = Vec::new();

    for algorithm in Algorithm::ALL {
        let t = Instant::now();
        let (visited, path_hops) = match algorithm {
            Algorithm::Bfs => (graph_vis_core::bfs(graph, start, &state, config).len(), None),
            Algorithm::Dfs => (graph_vis_core::dfs(graph, start, &state, config).len(), None),
            Algorithm::Dijkstra => {
                let path = graph_vis_core::dijkstra(graph, start, far, &state, config)?;
                (state.visited_len(), Some(path.len().saturating_sub(1)))
            }
            Algorithm::ParallelBfs => (
                graph_vis_core::parallel_bfs(graph, start, &state, pool, config)?.len(),
                None,
            ),
        };
        rows.push(BenchRow {
            generator: name,
            algorithm,
            vertices: graph.vertex_count(),
            edges: graph.edge_count(),
            visited,
            path_hops,
            elapsed_ms: t.elapsed().as_secs_f64() * 1000.0,
        });
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Watch mode: the observer side of a running algorithm
// ---------------------------------------------------------------------------

struct WatchOptions {
    start: Option<VertexId>,
    end: Option<VertexId>,
    refresh: Duration,
    pause_after: Option<usize>,
    pause_for: Duration,
    timeout: Option<Duration>,
}

fn run_watch(
    graph: Graph,
    algorithm: Algorithm,
    config: TraversalConfig,
    opts: &WatchOptions,
) -> Result<()> {
    let mut session = Session::new(Arc::new(graph), config)?;
    if let Some(start) = opts.start {
        session.select_start(start);
    }
    if let Some(end) = opts.end {
        session.select_end(end);
    }
    session.start(algorithm)?;

    let state = session.state();
    let began = Instant::now();
    let mut pause_done = false;
    let mut stop_sent = false;

    let outcome = loop {
        if let Some(outcome) = session.poll() {
            break outcome?;
        }

        let snap = state.snapshot();
        info!(
            visited = snap.visited.len(),
            current = ?snap.current_vertex,
            paused = snap.paused,
            "progress"
        );

        if let Some(threshold) = opts.pause_after {
            if !pause_done && snap.visited.len() >= threshold {
                session.toggle_pause();
                thread::sleep(opts.pause_for);
                let frozen = state.visited_len();
                if frozen != snap.visited.len() {
                    info!(before = snap.visited.len(), after = frozen, "in-flight step finished after pause");
                }
                session.toggle_pause();
                pause_done = true;
            }
        }

        if let Some(timeout) = opts.timeout {
            if !stop_sent && began.elapsed() >= timeout {
                warn!(timeout_ms = timeout.as_millis() as u64, "timeout reached, requesting stop");
                session.stop();
                stop_sent = true;
            }
        }

        thread::sleep(opts.refresh);
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Reference scenario
// ---------------------------------------------------------------------------

fn run_scenario() -> Result<()> {
    let graph = Graph::new(false);
    graph.load_edges(vec![
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
    println!(
        "{} vertices, {} edges, density {:.3}, {} component(s)",
        graph.vertex_count(),
        graph.edge_count(),
        graph.density(),
        graph.connected_components().len()
    );

    let mut session = Session::new(Arc::new(graph), TraversalConfig::unthrottled())?;
    session.select_start(1);
    session.select_end(5);

    for algorithm in Algorithm::ALL {
        session.start(algorithm)?;
        let outcome = session
            .wait()
            .context("worker vanished before reporting")??;
        match algorithm {
            Algorithm::Dijkstra => {
                let cost = graph_vis_core::path_cost(session.graph(), &outcome.path);
                println!("{:>13}: path {:?} cost {:?}", algorithm.name(), outcome.path, cost);
            }
            _ => println!("{:>13}: order {:?}", algorithm.name(), outcome.order),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Generators
//
// Every generator numbers vertices 0..node_count, so the bench can use 0 as
// the source and node_count - 1 as the Dijkstra target. Same seed, same graph.
// ---------------------------------------------------------------------------

/// 64-bit LCG; plenty for shaping benchmark graphs.
struct FastRng(u64);

impl FastRng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn step(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.0
    }

    fn next(&mut self, max: u64) -> u64 {
        (self.step() >> 33) % max
    }

    fn next_f64(&mut self) -> f64 {
        (self.step() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Edge weight in [0.5, 5.0).
    fn weight(&mut self) -> f64 {
        0.5 + self.next_f64() * 4.5
    }
}

const RELATIONS: [&str; 5] = ["IMPLIES", "SUPPORTS", "CONTRADICTS", "RELATED_TO", "REQUIRES"];

fn link(graph: &Graph, rng: &mut FastRng, from: u64, to: u64) {
    let label = RELATIONS[rng.next(RELATIONS.len() as u64) as usize];
    let weight = rng.weight();
    graph.add_labeled_edge(from as VertexId, to as VertexId, weight, label);
}

fn add_vertices(graph: &Graph, ids: std::ops::Range<u64>, label: &str) {
    for id in ids {
        graph.add_vertex(id as VertexId, label);
    }
}

/// Complete ternary tree in breadth-first numbering. BFS frontiers triple
/// every level; Dijkstra to the last leaf walks the full height.
fn gen_lsystem(node_count: u64, directed: bool) -> Graph {
    const FANOUT: u64 = 3;
    let graph = Graph::new(directed);
    let mut rng = FastRng::new(42);

    if node_count > 0 {
        graph.add_vertex(0, "Root");
    }
    for child in 1..node_count {
        graph.add_vertex(child as VertexId, "Concept");
        link(&graph, &mut rng, (child - 1) / FANOUT, child);
    }
    graph
}

/// Preferential attachment. Sampling a random endpoint from the edge list
/// favours hubs in proportion to their degree, which gives a few vertices
/// very wide neighbor lists.
fn gen_scale_free(node_count: u64, directed: bool) -> Graph {
    const LINKS_PER_VERTEX: u64 = 4;
    const CORE: u64 = 5;
    let graph = Graph::new(directed);
    let mut rng = FastRng::new(12345);
    let mut endpoints: Vec<u64> = Vec::with_capacity((node_count * LINKS_PER_VERTEX * 2) as usize);

    let core = CORE.min(node_count);
    add_vertices(&graph, 0..core, "Concept");
    for i in 0..core {
        for j in (i + 1)..core {
            link(&graph, &mut rng, i, j);
            endpoints.extend([i, j]);
        }
    }

    for v in core..node_count {
        graph.add_vertex(v as VertexId, "Concept");
        for _ in 0..LINKS_PER_VERTEX.min(v) {
            let hub = endpoints[rng.next(endpoints.len() as u64) as usize];
            if hub != v {
                link(&graph, &mut rng, hub, v);
                endpoints.extend([hub, v]);
            }
        }
    }
    graph
}

/// Ring where each vertex links its next three successors, with 5% of the
/// links redirected to a random vertex. Short average hop count despite the
/// mostly local structure.
fn gen_small_world(node_count: u64, directed: bool) -> Graph {
    const REACH: u64 = 3;
    const REWIRE: f64 = 0.05;
    let graph = Graph::new(directed);
    let mut rng = FastRng::new(67890);
    add_vertices(&graph, 0..node_count, "Concept");

    for v in 0..node_count {
        for offset in 1..=REACH {
            let mut target = (v + offset) % node_count;
            if rng.next_f64() < REWIRE {
                let shortcut = rng.next(node_count);
                if shortcut != v {
                    target = shortcut;
                }
            }
            if target != v {
                link(&graph, &mut rng, v, target);
            }
        }
    }
    graph
}

/// Uniform random pairs, about four per vertex.
fn gen_random(node_count: u64, directed: bool) -> Graph {
    let graph = Graph::new(directed);
    let mut rng = FastRng::new(54321);
    add_vertices(&graph, 0..node_count, "Concept");

    for _ in 0..node_count * 4 {
        let (from, to) = (rng.next(node_count), rng.next(node_count));
        if from != to {
            link(&graph, &mut rng, from, to);
        }
    }
    graph
}

/// Up to eight random links per member inside `offset..offset + size`.
fn dense_cluster(graph: &Graph, rng: &mut FastRng, offset: u64, size: u64, label: &str) {
    add_vertices(graph, offset..offset + size, label);
    let links = 8u64.min(size.saturating_sub(1));
    for i in 0..size {
        for _ in 0..links {
            let j = rng.next(size);
            if j != i {
                link(graph, rng, offset + i, offset + j);
            }
        }
    }
}

/// Two dense clusters joined through a single path. Every route between the
/// halves crosses the bridge, so BFS levels narrow to width one there.
fn gen_barbell(node_count: u64, directed: bool) -> Graph {
    let bridge_len = 10u64.min(node_count / 3);
    let cluster = ((node_count - bridge_len) / 2).max(1);
    let graph = Graph::new(directed);
    let mut rng = FastRng::new(99999);

    dense_cluster(&graph, &mut rng, 0, cluster, "ClusterA");
    // Path from the last vertex of cluster A through the bridge into cluster B
    let far_side = cluster + bridge_len;
    add_vertices(&graph, cluster..far_side, "Bridge");
    dense_cluster(&graph, &mut rng, far_side, cluster, "ClusterB");
    for v in cluster..=far_side {
        link(&graph, &mut rng, v - 1, v);
    }
    graph
}

/// Growth by sticking each new vertex onto one of the last thousand added,
/// plus a random older vertex one time in ten. Long, branchy and mostly
/// tree-like, with some cycles.
fn gen_dla(node_count: u64, directed: bool) -> Graph {
    const WINDOW: u64 = 1000;
    let graph = Graph::new(directed);
    let mut rng = FastRng::new(77777);

    if node_count > 0 {
        graph.add_vertex(0, "Seed");
    }
    for v in 1..node_count {
        graph.add_vertex(v as VertexId, "Concept");
        let window_start = v.saturating_sub(WINDOW);
        let anchor = window_start + rng.next(v - window_start);
        link(&graph, &mut rng, anchor, v);

        if v > 1 && rng.next(10) == 0 {
            let older = rng.next(v);
            if older != anchor {
                link(&graph, &mut rng, older, v);
            }
        }
    }
    graph
}
