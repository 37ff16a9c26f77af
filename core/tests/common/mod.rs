#![allow(dead_code)]

use std::collections::HashMap;

use traverse_accel_core::{Graph, GraphRead};

/// LCG for deterministic test graphs.
pub struct FastRng(u64);

impl FastRng {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next(&mut self, max: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 33) % max
    }

    pub fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Watts-Strogatz ring lattice with `k` forward neighbors per node, each
/// rewired to a random endpoint with probability `p`.
pub fn small_world(node_count: u64, k: u64, p: f64, seed: u64) -> Graph<u64> {
    let mut graph = Graph::with_capacity(false, node_count as usize);
    let mut rng = FastRng::new(seed);
    for i in 0..node_count {
        graph.add_node(i);
    }
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

pub fn build(node_count: u64, edges: &[(u64, u64)], directed: bool) -> Graph<u64> {
    let mut graph = Graph::with_capacity(directed, node_count as usize);
    for i in 0..node_count {
        graph.add_node(i);
    }
    for &(a, b) in edges {
        graph.add_edge(a, b);
    }
    graph
}

pub fn from_labels(edges: &[(&'static str, &'static str)]) -> Graph<&'static str> {
    let mut graph = Graph::new_undirected();
    for &(a, b) in edges {
        graph.add_edge(a, b);
    }
    graph
}

/// Hop distances by repeated edge relaxation, independent of any BFS.
pub fn relaxed_distances(graph: &Graph<u64>, source: u64) -> HashMap<u64, u32> {
    let mut dist: HashMap<u64, u32> = HashMap::new();
    dist.insert(source, 0);
    loop {
        let mut changed = false;
        for u in graph.nodes() {
            let Some(&du) = dist.get(u) else { continue };
            for v in graph.neighbors(u) {
                if dist.get(v).map_or(true, |&dv| du + 1 < dv) {
                    dist.insert(*v, du + 1);
                    changed = true;
                }
            }
        }
        if !changed {
            return dist;
        }
    }
}
