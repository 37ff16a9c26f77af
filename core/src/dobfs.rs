//! Direction-optimizing BFS over a [`CompactGraph`].
//!
//! Each level is expanded either top-down (push: scan the frontier's
//! outgoing rows) or bottom-up (pull: scan every unvisited node's incoming
//! row and stop at the first parent found in the frontier). The direction is
//! re-evaluated before every level from the frontier's size and out-edge
//! count. Both directions assign identical distances; only the choice among
//! equally short parents may differ.

use std::sync::atomic::{AtomicUsize, Ordering};

use bitvec::prelude::*;
use rayon::prelude::*;

use crate::compact::CompactGraph;
use crate::config::BfsConfig;
use crate::error::TraversalResult;
use crate::graph::NodeKey;

const UNREACHED: u32 = u32::MAX;
const NO_PARENT: u32 = u32::MAX;

/// One bit per CompactGraph node index.
type NodeBits = BitVec<u64, Lsb0>;

/// Expansion direction of a single BFS level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    TopDown,
    BottomUp,
}

/// Lifecycle of an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Running,
    Done,
}

/// Work counters for one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchStats {
    pub levels: u32,
    pub top_down_levels: u32,
    pub bottom_up_levels: u32,
    pub edges_examined: usize,
    pub direction_switches: u32,
}

/// Distances and parent pointers, indexed by CompactGraph node index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    distance: Vec<u32>,
    parent: Vec<u32>,
    order: Vec<u32>,
    pub stats: SearchStats,
}

impl SearchResult {
    pub fn visited_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_visited(&self, index: usize) -> bool {
        self.distance.get(index).is_some_and(|&d| d != UNREACHED)
    }

    pub fn distance(&self, index: usize) -> Option<u32> {
        self.distance.get(index).copied().filter(|&d| d != UNREACHED)
    }

    /// Parent of a visited node; `None` for sources and unvisited nodes.
    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parent
            .get(index)
            .copied()
            .filter(|&p| p != NO_PARENT)
            .map(|p| p as usize)
    }

    /// Visited node indices in discovery order. Distances never decrease
    /// along this sequence.
    pub fn order(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().map(|&i| i as usize)
    }

    /// `(index, distance)` for every visited node, in discovery order.
    pub fn distances(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.order().map(move |i| (i, self.distance[i]))
    }

    /// `(index, parent)` for every visited node, in discovery order.
    pub fn parents(&self) -> impl Iterator<Item = (usize, Option<usize>)> + '_ {
        self.order().map(move |i| (i, self.parent(i)))
    }
}

/// Hybrid push/pull BFS engine bound to one CompactGraph.
///
/// The engine keeps its scratch bit-sets between searches; call
/// [`reset`](Self::reset) (or just search again, which resets implicitly)
/// to reuse it without rebuilding the graph.
pub struct DirectionOptimizedBfs<'g, N: NodeKey> {
    graph: &'g CompactGraph<N>,
    config: BfsConfig,
    phase: SearchPhase,
    direction: Direction,
    visited: NodeBits,
    frontier_bits: NodeBits,
    frontier: Vec<u32>,
    next_frontier: Vec<u32>,
}

impl<'g, N: NodeKey> DirectionOptimizedBfs<'g, N> {
    pub fn new(graph: &'g CompactGraph<N>, config: BfsConfig) -> Self {
        let n = graph.node_count();
        Self {
            graph,
            config,
            phase: SearchPhase::Idle,
            direction: Direction::TopDown,
            visited: bitvec![u64, Lsb0; 0; n],
            frontier_bits: bitvec![u64, Lsb0; 0; n],
            frontier: Vec::new(),
            next_frontier: Vec::new(),
        }
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    /// Direction used for the most recent level.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn graph(&self) -> &'g CompactGraph<N> {
        self.graph
    }

    /// Clear all per-search state.
    pub fn reset(&mut self) {
        self.visited.fill(false);
        self.frontier_bits.fill(false);
        self.frontier.clear();
        self.next_frontier.clear();
        self.direction = Direction::TopDown;
        self.phase = SearchPhase::Idle;
    }

    /// Single-source search. Fails if `source` is not in the graph.
    pub fn search(&mut self, source: &N) -> TraversalResult<SearchResult> {
        self.search_within(std::slice::from_ref(source), None)
    }

    /// Seed every source at distance 0 as one frontier.
    ///
    /// A node reachable from several sources at the same distance gets its
    /// parent from whichever expansion reaches it first; which one that is
    /// is not specified.
    pub fn search_multiple(&mut self, sources: &[N]) -> TraversalResult<SearchResult> {
        self.search_within(sources, None)
    }

    /// Search that stops expanding after `max_depth` levels.
    pub fn search_within(
        &mut self,
        sources: &[N],
        max_depth: Option<u32>,
    ) -> TraversalResult<SearchResult> {
        let seeds = sources
            .iter()
            .map(|s| self.graph.node_to_index(s))
            .collect::<TraversalResult<Vec<usize>>>()?;

        if self.phase != SearchPhase::Idle {
            self.reset();
        }
        Ok(self.run(&seeds, max_depth))
    }

    fn run(&mut self, seeds: &[usize], max_depth: Option<u32>) -> SearchResult {
        let graph = self.graph;
        let n = graph.node_count();
        let total_edges = graph.edge_count();
        let can_pull = graph.supports_pull();

        self.phase = SearchPhase::Running;
        let mut distance = vec![UNREACHED; n];
        let mut parent = vec![NO_PARENT; n];
        let mut order: Vec<u32> = Vec::new();
        let mut stats = SearchStats::default();

        for &s in seeds {
            if !self.visited.replace(s, true) {
                distance[s] = 0;
                self.frontier.push(s as u32);
                order.push(s as u32);
            }
        }

        let mut level: u32 = 0;
        while !self.frontier.is_empty() {
            if max_depth.is_some_and(|d| level >= d) {
                break;
            }

            let chosen = self.choose_direction(can_pull, total_edges, n);
            if chosen != self.direction {
                stats.direction_switches += 1;
                tracing::trace!(
                    level,
                    frontier = self.frontier.len(),
                    ?chosen,
                    "bfs direction switch"
                );
                self.direction = chosen;
            }

            self.next_frontier.clear();
            let examined = match self.direction {
                Direction::TopDown => {
                    stats.top_down_levels += 1;
                    self.top_down_step(level, &mut distance, &mut parent)
                }
                Direction::BottomUp => {
                    stats.bottom_up_levels += 1;
                    self.bottom_up_step(level, &mut distance, &mut parent)
                }
            };
            stats.edges_examined += examined;
            order.extend_from_slice(&self.next_frontier);

            std::mem::swap(&mut self.frontier, &mut self.next_frontier);
            level += 1;
            stats.levels = level;
            debug_assert!(level as usize <= n, "bfs ran more levels than nodes");
        }

        self.phase = SearchPhase::Done;
        tracing::debug!(
            sources = seeds.len(),
            visited = order.len(),
            levels = stats.levels,
            top_down = stats.top_down_levels,
            bottom_up = stats.bottom_up_levels,
            edges_examined = stats.edges_examined,
            switches = stats.direction_switches,
            "direction-optimized bfs done"
        );

        SearchResult {
            distance,
            parent,
            order,
            stats,
        }
    }

    /// Go bottom-up when the frontier's out-edges exceed `total_edges / alpha`;
    /// come back top-down once the frontier is below `node_count / beta`.
    fn choose_direction(&self, can_pull: bool, total_edges: usize, n: usize) -> Direction {
        match self.direction {
            Direction::TopDown => {
                if !can_pull {
                    return Direction::TopDown;
                }
                let frontier_edges: usize = self
                    .frontier
                    .iter()
                    .map(|&u| self.graph.out_degree_at(u as usize))
                    .sum();
                if frontier_edges as f64 > total_edges as f64 / self.config.alpha {
                    Direction::BottomUp
                } else {
                    Direction::TopDown
                }
            }
            Direction::BottomUp => {
                if (self.frontier.len() as f64) < n as f64 / self.config.beta {
                    Direction::TopDown
                } else {
                    Direction::BottomUp
                }
            }
        }
    }

    /// Push: expand every frontier node's outgoing row. Returns edges examined.
    fn top_down_step(&mut self, level: u32, distance: &mut [u32], parent: &mut [u32]) -> usize {
        let graph = self.graph;
        let mut examined = 0;
        for &u in &self.frontier {
            let row = graph.out_row(u as usize);
            examined += row.len();
            for &v in row {
                if v == u {
                    continue;
                }
                if !self.visited.replace(v as usize, true) {
                    distance[v as usize] = level + 1;
                    parent[v as usize] = u;
                    self.next_frontier.push(v);
                }
            }
        }
        examined
    }

    /// Pull: every unvisited node looks for a frontier member among its
    /// incoming neighbors, stopping at the first hit. Returns edges examined.
    fn bottom_up_step(&mut self, level: u32, distance: &mut [u32], parent: &mut [u32]) -> usize {
        let graph = self.graph;
        let n = graph.node_count();

        self.frontier_bits.fill(false);
        for &u in &self.frontier {
            self.frontier_bits.set(u as usize, true);
        }

        let found: Vec<(u32, u32)>;
        let examined;
        if self.config.parallel && n >= self.config.parallel_threshold {
            let counter = AtomicUsize::new(0);
            let visited = &self.visited;
            let frontier_bits = &self.frontier_bits;
            found = (0..n)
                .into_par_iter()
                .filter(|&v| !visited[v])
                .filter_map(|v| {
                    let (hit, scanned) = find_frontier_parent(graph, frontier_bits, v);
                    counter.fetch_add(scanned, Ordering::Relaxed);
                    hit.map(|u| (v as u32, u))
                })
                .collect();
            examined = counter.into_inner();
        } else {
            let mut scanned_total = 0;
            let mut hits = Vec::new();
            for v in 0..n {
                if self.visited[v] {
                    continue;
                }
                let (hit, scanned) = find_frontier_parent(graph, &self.frontier_bits, v);
                scanned_total += scanned;
                if let Some(u) = hit {
                    hits.push((v as u32, u));
                }
            }
            found = hits;
            examined = scanned_total;
        }

        // Level barrier: commit discoveries only after the whole level is scanned.
        for (v, u) in found {
            self.visited.set(v as usize, true);
            distance[v as usize] = level + 1;
            parent[v as usize] = u;
            self.next_frontier.push(v);
        }
        examined
    }
}

/// First incoming neighbor of `v` that is in the frontier, plus edges scanned.
#[inline]
fn find_frontier_parent<N: NodeKey>(
    graph: &CompactGraph<N>,
    frontier_bits: &BitSlice<u64, Lsb0>,
    v: usize,
) -> (Option<u32>, usize) {
    let Some(incoming) = graph.in_row(v) else {
        return (None, 0);
    };
    for (scanned, &u) in incoming.iter().enumerate() {
        if u as usize != v && frontier_bits[u as usize] {
            return (Some(u), scanned + 1);
        }
    }
    (None, incoming.len())
}
