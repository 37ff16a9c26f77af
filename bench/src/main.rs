use std::sync::Once;
use std::time::Instant;

use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use traverse_accel_core::{
    BfsOptions, DirectionOptimizedBfs, Graph, GraphRead, Strategy, TraversalConfig, Traverser,
};

static INIT: Once = Once::new();

/// Reads `TRAVERSE_LOG` (e.g. `traverse_accel_core=debug`), falling back to
/// `traverse_accel=info`. Logs go to stderr so `--json` output stays clean.
fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("TRAVERSE_LOG")
            .unwrap_or_else(|_| EnvFilter::new("traverse_accel=info"));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .with(filter)
            .init();
    });
}

struct Args {
    mode: String,
    node_count: u64,
    json: bool,
    config: TraversalConfig,
}

fn parse_args() -> Result<Option<Args>, String> {
    let mut positional = Vec::new();
    let mut json = false;
    let mut config = TraversalConfig::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "help" | "--help" => return Ok(None),
            "--json" => json = true,
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| format!("cannot read {}: {}", path, e))?;
                config = TraversalConfig::from_toml_str(&text).map_err(|e| e.to_string())?;
            }
            _ => positional.push(arg),
        }
    }

    let mode = positional.first().cloned().unwrap_or_else(|| "all".to_string());
    let node_count = match positional.get(1) {
        Some(s) => s.parse().map_err(|_| format!("invalid node count: {}", s))?,
        None => 1_000_000,
    };
    if node_count < 2 {
        return Err("node count must be at least 2".to_string());
    }
    Ok(Some(Args {
        mode,
        node_count,
        json,
        config,
    }))
}

fn print_help() {
    println!("Usage: traverse-accel-bench [mode] [node_count] [--json] [--config file.toml]");
    println!();
    println!("Modes:");
    println!("  all         Run all generators and benchmark each (default)");
    println!("  lsystem     Fractal branching tree (deep paths)");
    println!("  scalefree   Preferential attachment via edge sampling (hub-and-spoke)");
    println!("  smallworld  Watts-Strogatz ring lattice + shortcuts");
    println!("  random      Erdos-Renyi uniform random edges");
    println!();
    println!("Default node_count: 1000000");
    println!("Log filter: TRAVERSE_LOG (default traverse_accel=info)");
}

fn main() {
    init_tracing();

    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => {
            print_help();
            return;
        }
        Err(e) => {
            eprintln!("{}. Use --help for options.", e);
            std::process::exit(2);
        }
    };

    let generators: Vec<(&str, fn(u64) -> Graph<u64>)> = match args.mode.as_str() {
        "lsystem" => vec![("L-system tree", gen_lsystem)],
        "scalefree" => vec![("Scale-free (edge sampling)", gen_scale_free)],
        "smallworld" => vec![("Small-world (Watts-Strogatz)", gen_small_world)],
        "random" => vec![("Erdos-Renyi random", gen_random)],
        "all" => vec![
            ("L-system tree", gen_lsystem as fn(u64) -> Graph<u64>),
            ("Scale-free (edge sampling)", gen_scale_free),
            ("Small-world (Watts-Strogatz)", gen_small_world),
            ("Erdos-Renyi random", gen_random),
        ],
        other => {
            eprintln!("Unknown mode: {}. Use --help for options.", other);
            std::process::exit(2);
        }
    };

    if !args.json {
        println!("traverse-accel-bench");
        println!("====================");
        println!();
    }

    let mut failed = false;
    for (name, generator) in generators {
        let report = run_benchmark(name, generator, args.node_count, &args.config);
        failed |= !report.distances_agree;
        if args.json {
            match serde_json::to_string(&report) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::error!(error = %e, "failed to serialize report"),
            }
        } else {
            print_report(&report);
        }
    }

    if failed {
        std::process::exit(1);
    }
}

/// One generator's measurements.
#[derive(Debug, Serialize)]
struct BenchReport {
    generator: String,
    nodes: usize,
    edges: usize,
    graph_bytes: usize,
    snapshot_bytes: usize,
    generate_ms: f64,
    snapshot_ms: f64,
    baseline_ms: f64,
    optimized_ms: f64,
    visited: usize,
    levels: u32,
    top_down_levels: u32,
    bottom_up_levels: u32,
    direction_switches: u32,
    edges_examined: usize,
    distances_agree: bool,
    far_node: u64,
    far_hops: Option<u32>,
    far_ms: f64,
}

fn millis(t: Instant) -> f64 {
    t.elapsed().as_secs_f64() * 1000.0
}

fn run_benchmark(
    name: &str,
    generator: fn(u64) -> Graph<u64>,
    node_count: u64,
    config: &TraversalConfig,
) -> BenchReport {
    tracing::info!(generator = name, node_count, "generating graph");
    let t = Instant::now();
    let graph = generator(node_count);
    let generate_ms = millis(t);

    let baseline = Traverser::new(TraversalConfig {
        strategy: Strategy::Baseline,
        ..config.clone()
    });
    let optimized = Traverser::new(TraversalConfig {
        strategy: Strategy::Optimized,
        ..config.clone()
    });

    // Build the snapshot outside the timed searches.
    let t = Instant::now();
    let snapshot = optimized.compact_graph(&graph);
    let snapshot_ms = millis(t);

    let t = Instant::now();
    let base = baseline.breadth_first_search(&graph, &0, BfsOptions::new());
    let baseline_ms = millis(t);

    let t = Instant::now();
    let fast = optimized.breadth_first_search(&graph, &0, BfsOptions::new());
    let optimized_ms = millis(t);

    let distances_agree = match (&base, &fast) {
        (Ok(b), Ok(f)) => b.distance == f.distance,
        (b, f) => {
            tracing::error!(baseline = ?b.as_ref().err(), optimized = ?f.as_ref().err(), "bfs failed");
            false
        }
    };
    if !distances_agree {
        tracing::error!(generator = name, "baseline and optimized distances differ");
    }

    // Rerun on the cached snapshot for per-direction work counters.
    let stats = DirectionOptimizedBfs::new(&snapshot, config.bfs)
        .search(&0)
        .map(|r| r.stats)
        .unwrap_or_default();

    let far_node = graph.node_count() as u64 - 1;
    let t = Instant::now();
    let far_hops = optimized
        .shortest_path_bfs(&graph, &0, &far_node)
        .ok()
        .flatten()
        .map(|p| p.distance);
    let far_ms = millis(t);

    BenchReport {
        generator: name.to_string(),
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        graph_bytes: graph.memory_usage(),
        snapshot_bytes: snapshot.memory_usage(),
        generate_ms,
        snapshot_ms,
        baseline_ms,
        optimized_ms,
        visited: fast.map(|r| r.visited.len()).unwrap_or(0),
        levels: stats.levels,
        top_down_levels: stats.top_down_levels,
        bottom_up_levels: stats.bottom_up_levels,
        direction_switches: stats.direction_switches,
        edges_examined: stats.edges_examined,
        distances_agree,
        far_node,
        far_hops,
        far_ms,
    }
}

fn print_report(r: &BenchReport) {
    println!("--- {} ---", r.generator);
    println!(
        "Generated in {:.2}s: {} nodes, {} edges, ~{:.0}MB (CSR ~{:.0}MB, built in {:.1}ms)",
        r.generate_ms / 1000.0,
        r.nodes,
        r.edges,
        r.graph_bytes as f64 / 1_048_576.0,
        r.snapshot_bytes as f64 / 1_048_576.0,
        r.snapshot_ms
    );
    println!();
    println!("{:>10} {:>12} {:>10}", "engine", "visited", "time");
    println!("{:->10} {:->12} {:->10}", "", "", "");
    println!("{:>10} {:>12} {:>8.1}ms", "baseline", r.visited, r.baseline_ms);
    println!("{:>10} {:>12} {:>8.1}ms", "optimized", r.visited, r.optimized_ms);
    println!(
        "levels {} (top-down {}, bottom-up {}, {} switches), {} edges examined",
        r.levels, r.top_down_levels, r.bottom_up_levels, r.direction_switches, r.edges_examined
    );
    println!(
        "distances {}",
        if r.distances_agree { "agree" } else { "DIFFER" }
    );
    match r.far_hops {
        Some(h) => println!("Shortest path 0 -> {}: {} hops in {:.1}ms", r.far_node, h, r.far_ms),
        None => println!("Shortest path 0 -> {}: no path ({:.1}ms)", r.far_node, r.far_ms),
    }
    println!();
}

// ---------------------------------------------------------------------------
// Generators: O(n + edges), single-threaded, deterministic
// ---------------------------------------------------------------------------

/// Simple LCG for deterministic, fast pseudo-random numbers.
struct FastRng(u64);

impl FastRng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next(&mut self, max: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 33) % max
    }
    fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn with_nodes(node_count: u64) -> Graph<u64> {
    let mut graph = Graph::with_capacity(false, node_count as usize);
    for i in 0..node_count {
        graph.add_node(i);
    }
    graph
}

/// Complete ternary tree in breadth-first id order. Deep, narrow frontiers
/// keep the engine top-down until the last few levels.
fn gen_lsystem(node_count: u64) -> Graph<u64> {
    let mut graph = with_nodes(node_count);
    let branching = 3u64;
    for child in 1..node_count {
        graph.add_edge((child - 1) / branching, child);
    }
    graph
}

/// Scale-free via edge-list sampling: picking a random edge endpoint is
/// picking a node proportionally to its degree.
fn gen_scale_free(node_count: u64) -> Graph<u64> {
    let edges_per_node = 10u64;
    let mut graph = with_nodes(node_count);
    let mut rng = FastRng::new(12345);
    let mut edge_endpoints: Vec<u64> =
        Vec::with_capacity((node_count * edges_per_node * 2) as usize);

    let seed = 5u64.min(node_count);
    for i in 0..seed {
        for j in (i + 1)..seed {
            graph.add_edge(i, j);
            edge_endpoints.push(i);
            edge_endpoints.push(j);
        }
    }

    for new_node in seed..node_count {
        let attach = edges_per_node.min(new_node);
        for _ in 0..attach {
            let target = edge_endpoints[rng.next(edge_endpoints.len() as u64) as usize];
            if target != new_node {
                graph.add_edge(new_node, target);
                edge_endpoints.push(new_node);
                edge_endpoints.push(target);
            }
        }
    }

    graph
}

/// Watts-Strogatz: ring lattice with K forward neighbors, each edge rewired
/// with probability p. High clustering, short paths.
fn gen_small_world(node_count: u64) -> Graph<u64> {
    let k = 10u64;
    let p = 0.05f64;
    let mut graph = with_nodes(node_count);
    let mut rng = FastRng::new(67890);

    for i in 0..node_count {
        for j in 1..=k {
            let neighbor = (i + j) % node_count;
            if rng.next_f64() < p {
                let rewired = rng.next(node_count);
                graph.add_edge(i, if rewired != i { rewired } else { neighbor });
            } else {
                graph.add_edge(i, neighbor);
            }
        }
    }

    graph
}

/// Erdos-Renyi: ~10 uniform random edges per node, no structure.
fn gen_random(node_count: u64) -> Graph<u64> {
    let mut graph = with_nodes(node_count);
    let mut rng = FastRng::new(54321);

    for _ in 0..node_count * 10 {
        let from = rng.next(node_count);
        let to = rng.next(node_count);
        if from != to {
            graph.add_edge(from, to);
        }
    }

    graph
}
