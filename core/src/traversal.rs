//! Size-dispatched traversal API.
//!
//! Small graphs run a plain queue-based BFS directly against the mutable
//! graph. Graphs above `optimized_threshold` nodes are snapshotted into a
//! [`CompactGraph`] (cached per graph instance) and searched with
//! [`DirectionOptimizedBfs`]; its index-keyed output is translated back into
//! the same node-keyed result shapes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::cache::CompactGraphCache;
use crate::compact::{CompactGraph, CompactOptions};
use crate::config::{Strategy, TraversalConfig};
use crate::dobfs::DirectionOptimizedBfs;
use crate::error::{TraversalError, TraversalResult};
use crate::graph::{GraphRead, NodeKey};

/// Engine selected for one traversal call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Baseline,
    Optimized,
}

/// Result of [`Traverser::breadth_first_search`].
#[derive(Debug, Clone, PartialEq)]
pub struct BfsTraversal<N: NodeKey> {
    /// Every discovered node, including ones enqueued but not yet expanded
    /// when a target stopped the search.
    pub visited: HashSet<N>,
    /// Nodes in the order they were dequeued. Distances never decrease.
    pub order: Vec<N>,
    /// BFS parent pointers; sources map to `None`.
    pub tree: HashMap<N, Option<N>>,
    /// Hop distance of every visited node.
    pub distance: HashMap<N, u32>,
}

/// A shortest path plus the predecessor map it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct PathInfo<N: NodeKey> {
    pub distance: u32,
    /// Source first, target last.
    pub path: Vec<N>,
    /// Predecessor map of the search that produced this path. Shared across
    /// all entries returned by one single-source call.
    pub predecessor: Arc<HashMap<N, Option<N>>>,
}

type VisitCallback<'a, N> = Box<dyn FnMut(&N, u32) + 'a>;

/// Optional knobs for [`Traverser::breadth_first_search`].
pub struct BfsOptions<'a, N> {
    visit_callback: Option<VisitCallback<'a, N>>,
    target_node: Option<N>,
    max_depth: Option<u32>,
}

impl<N> Default for BfsOptions<'_, N> {
    fn default() -> Self {
        Self {
            visit_callback: None,
            target_node: None,
            max_depth: None,
        }
    }
}

impl<'a, N> BfsOptions<'a, N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called as `(node, level)` once per dequeued node, in traversal order.
    pub fn on_visit(mut self, callback: impl FnMut(&N, u32) + 'a) -> Self {
        self.visit_callback = Some(Box::new(callback));
        self
    }

    /// Stop once this node is dequeued.
    pub fn target(mut self, node: N) -> Self {
        self.target_node = Some(node);
        self
    }

    /// Do not expand nodes at this depth or deeper.
    pub fn max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// Engine-independent search output: dequeue order with levels, plus the
/// parent of every discovered node.
struct Discovery<N> {
    order: Vec<(N, u32)>,
    tree: HashMap<N, Option<N>>,
}

/// Traversal dispatcher owning a CompactGraph cache.
///
/// Reuse one `Traverser` across calls to avoid rebuilding snapshots of large
/// graphs. Snapshots are not refreshed when a graph is mutated; call
/// `cache().invalidate(&graph)` after mutating.
pub struct Traverser<N: NodeKey> {
    config: TraversalConfig,
    cache: CompactGraphCache<N>,
}

impl<N: NodeKey> Traverser<N> {
    pub fn new(config: TraversalConfig) -> Self {
        let cache = CompactGraphCache::new(config.cache_capacity);
        Self { config, cache }
    }

    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    pub fn cache(&self) -> &CompactGraphCache<N> {
        &self.cache
    }

    /// Which engine a call against `graph` would use.
    pub fn engine_for<G>(&self, graph: &G) -> Engine
    where
        G: GraphRead<Node = N>,
    {
        match self.config.strategy {
            Strategy::Baseline => Engine::Baseline,
            Strategy::Optimized => Engine::Optimized,
            Strategy::Auto if graph.node_count() > self.config.optimized_threshold => {
                Engine::Optimized
            }
            Strategy::Auto => Engine::Baseline,
        }
    }

    /// Snapshot of `graph` as the optimized engine sees it, built on first use.
    pub fn compact_graph<G>(&self, graph: &G) -> Arc<CompactGraph<N>>
    where
        G: GraphRead<Node = N>,
    {
        let options = CompactOptions {
            // Directed graphs need transposed rows for bottom-up levels.
            include_reverse: graph.is_directed() && graph.edge_count() > 0,
            include_weights: false,
        };
        self.cache.get_or_build(graph, options)
    }

    /// Breadth-first search from `start`.
    pub fn breadth_first_search<G>(
        &self,
        graph: &G,
        start: &N,
        options: BfsOptions<'_, N>,
    ) -> TraversalResult<BfsTraversal<N>>
    where
        G: GraphRead<Node = N>,
    {
        self.traverse(graph, std::slice::from_ref(start), options)
    }

    /// BFS seeded from every source at level 0.
    ///
    /// When two sources reach a node at the same distance, which one becomes
    /// its tree ancestor is unspecified.
    pub fn multi_source_bfs<G>(&self, graph: &G, sources: &[N]) -> TraversalResult<BfsTraversal<N>>
    where
        G: GraphRead<Node = N>,
    {
        self.traverse(graph, sources, BfsOptions::default())
    }

    fn traverse<G>(
        &self,
        graph: &G,
        sources: &[N],
        mut options: BfsOptions<'_, N>,
    ) -> TraversalResult<BfsTraversal<N>>
    where
        G: GraphRead<Node = N>,
    {
        if let Some(target) = &options.target_node {
            require_node(graph, target)?;
        }
        let discovery = self.discover(
            graph,
            sources,
            options.target_node.as_ref(),
            options.max_depth,
        )?;

        if let Some(callback) = options.visit_callback.as_mut() {
            for (node, level) in &discovery.order {
                callback(node, *level);
            }
        }
        Ok(into_traversal(discovery))
    }

    /// Shortest unweighted path from `source` to `target`; `None` if unreachable.
    pub fn shortest_path_bfs<G>(
        &self,
        graph: &G,
        source: &N,
        target: &N,
    ) -> TraversalResult<Option<PathInfo<N>>>
    where
        G: GraphRead<Node = N>,
    {
        require_node(graph, target)?;
        let discovery = self.discover(graph, std::slice::from_ref(source), Some(target), None)?;
        if !discovery.tree.contains_key(target) {
            return Ok(None);
        }

        let path = reconstruct_path(&discovery.tree, target);
        Ok(Some(PathInfo {
            distance: (path.len() - 1) as u32,
            path,
            predecessor: Arc::new(discovery.tree),
        }))
    }

    /// Shortest paths from `source` to every reachable node, including itself.
    pub fn single_source_shortest_path_bfs<G>(
        &self,
        graph: &G,
        source: &N,
    ) -> TraversalResult<HashMap<N, PathInfo<N>>>
    where
        G: GraphRead<Node = N>,
    {
        let discovery = self.discover(graph, std::slice::from_ref(source), None, None)?;
        let predecessor = Arc::new(discovery.tree);

        Ok(discovery
            .order
            .into_iter()
            .map(|(node, level)| {
                let path = reconstruct_path(&predecessor, &node);
                debug_assert_eq!(path.len() - 1, level as usize);
                let entry = PathInfo {
                    distance: level,
                    path,
                    predecessor: Arc::clone(&predecessor),
                };
                (node, entry)
            })
            .collect())
    }

    /// Two-coloring check across every connected component.
    ///
    /// Always uses the baseline BFS: every edge must be inspected anyway,
    /// so direction switching saves nothing here.
    pub fn is_bipartite<G>(&self, graph: &G) -> TraversalResult<bool>
    where
        G: GraphRead<Node = N>,
    {
        is_bipartite(graph)
    }

    fn discover<G>(
        &self,
        graph: &G,
        sources: &[N],
        target: Option<&N>,
        max_depth: Option<u32>,
    ) -> TraversalResult<Discovery<N>>
    where
        G: GraphRead<Node = N>,
    {
        for source in sources {
            require_node(graph, source)?;
        }

        let engine = self.engine_for(graph);
        tracing::debug!(
            ?engine,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            sources = sources.len(),
            "bfs dispatch"
        );

        match engine {
            Engine::Baseline => Ok(baseline_discover(graph, sources, target, max_depth)),
            Engine::Optimized => self.optimized_discover(graph, sources, target, max_depth),
        }
    }

    fn optimized_discover<G>(
        &self,
        graph: &G,
        sources: &[N],
        target: Option<&N>,
        max_depth: Option<u32>,
    ) -> TraversalResult<Discovery<N>>
    where
        G: GraphRead<Node = N>,
    {
        let snapshot = self.compact_graph(graph);
        let mut engine = DirectionOptimizedBfs::new(&snapshot, self.config.bfs);
        let result = engine.search_within(sources, max_depth)?;

        let mut order = Vec::with_capacity(result.visited_count());
        let mut dequeued: Vec<usize> = Vec::with_capacity(result.visited_count());
        for (index, level) in result.distances() {
            let node = snapshot.index_to_node(index)?.clone();
            let reached = target == Some(&node);
            order.push((node, level));
            dequeued.push(index);
            if reached {
                break;
            }
        }

        let mut tree = HashMap::with_capacity(result.visited_count());
        if dequeued.len() == result.visited_count() {
            for (index, parent) in result.parents() {
                tree.insert(snapshot.index_to_node(index)?.clone(), parent_id(&snapshot, parent)?);
            }
            return Ok(Discovery { order, tree });
        }

        // Stopped early: keep exactly what a queue-based search would have
        // discovered by the time the target came off the queue. That is the
        // dequeued nodes plus the neighbors of every node expanded before it.
        // Nodes at the depth limit are dequeued but never expanded.
        let mut discovered: FxHashSet<usize> = FxHashSet::default();
        for &index in &dequeued {
            discovered.insert(index);
            let node = snapshot.index_to_node(index)?.clone();
            tree.insert(node, parent_id(&snapshot, result.parent(index))?);
        }
        for (&u, (_, level)) in dequeued.iter().zip(&order).take(dequeued.len() - 1) {
            if max_depth.is_some_and(|d| *level >= d) {
                continue;
            }
            for &v in snapshot.out_row(u) {
                if discovered.insert(v as usize) {
                    let node = snapshot.index_to_node(v as usize)?.clone();
                    tree.insert(node, Some(snapshot.index_to_node(u)?.clone()));
                }
            }
        }

        Ok(Discovery { order, tree })
    }
}

impl<N: NodeKey> Default for Traverser<N> {
    fn default() -> Self {
        Self::new(TraversalConfig::default())
    }
}

fn parent_id<N: NodeKey>(
    snapshot: &CompactGraph<N>,
    parent: Option<usize>,
) -> TraversalResult<Option<N>> {
    parent
        .map(|p| snapshot.index_to_node(p).cloned())
        .transpose()
}

fn require_node<G: GraphRead>(graph: &G, id: &G::Node) -> TraversalResult<()> {
    if graph.has_node(id) {
        Ok(())
    } else {
        Err(TraversalError::unknown(id))
    }
}

/// Queue-based BFS against the mutable graph.
///
/// The target check happens when a node is dequeued, not when it is
/// enqueued, so `order` ends exactly at the target.
fn baseline_discover<G>(
    graph: &G,
    sources: &[G::Node],
    target: Option<&G::Node>,
    max_depth: Option<u32>,
) -> Discovery<G::Node>
where
    G: GraphRead,
{
    let mut tree: HashMap<G::Node, Option<G::Node>> = HashMap::new();
    let mut order = Vec::new();
    let mut queue: VecDeque<(G::Node, u32)> = VecDeque::new();

    for source in sources {
        if !tree.contains_key(source) {
            tree.insert(source.clone(), None);
            queue.push_back((source.clone(), 0));
        }
    }

    while let Some((current, depth)) = queue.pop_front() {
        let reached = target == Some(&current);
        order.push((current.clone(), depth));
        if reached {
            break;
        }
        if max_depth.is_some_and(|d| depth >= d) {
            continue;
        }

        for neighbor in graph.neighbors(&current) {
            if !tree.contains_key(neighbor) {
                tree.insert(neighbor.clone(), Some(current.clone()));
                queue.push_back((neighbor.clone(), depth + 1));
            }
        }
    }

    Discovery { order, tree }
}

fn into_traversal<N: NodeKey>(discovery: Discovery<N>) -> BfsTraversal<N> {
    let Discovery { order, tree } = discovery;

    let mut distance: HashMap<N, u32> = order.iter().cloned().collect();
    // Nodes discovered but never dequeued sit one level below their parent,
    // which was always dequeued.
    for (node, parent) in &tree {
        if distance.contains_key(node) {
            continue;
        }
        if let Some(d) = parent.as_ref().and_then(|p| distance.get(p)).copied() {
            distance.insert(node.clone(), d + 1);
        }
    }

    BfsTraversal {
        visited: tree.keys().cloned().collect(),
        order: order.into_iter().map(|(node, _)| node).collect(),
        tree,
        distance,
    }
}

/// Walk parent pointers from `node` back to its source.
fn reconstruct_path<N: NodeKey>(tree: &HashMap<N, Option<N>>, node: &N) -> Vec<N> {
    let mut path = vec![node.clone()];
    let mut current = node;
    while let Some(Some(parent)) = tree.get(current) {
        path.push(parent.clone());
        current = parent;
    }
    path.reverse();
    path
}

/// Two-color each component of an undirected graph with a plain BFS.
///
/// Self-loops make a graph non-bipartite. Directed graphs are rejected with
/// [`TraversalError::DirectedGraph`].
pub fn is_bipartite<G: GraphRead>(graph: &G) -> TraversalResult<bool> {
    if graph.is_directed() {
        return Err(TraversalError::DirectedGraph);
    }

    let mut color: HashMap<&G::Node, bool> = HashMap::with_capacity(graph.node_count());
    let mut queue: VecDeque<&G::Node> = VecDeque::new();

    for start in graph.nodes() {
        if color.contains_key(start) {
            continue;
        }
        color.insert(start, false);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            let side = color[current];
            for neighbor in graph.neighbors(current) {
                match color.get(neighbor) {
                    Some(&other) if other == side => return Ok(false),
                    Some(_) => {}
                    None => {
                        color.insert(neighbor, !side);
                        queue.push_back(neighbor);
                    }
                }
            }
        }
    }

    Ok(true)
}

/// [`Traverser::breadth_first_search`] with default configuration.
///
/// Rebuilds the CompactGraph snapshot on every call for graphs above the
/// threshold; keep a [`Traverser`] to reuse it.
pub fn breadth_first_search<G: GraphRead>(
    graph: &G,
    start: &G::Node,
    options: BfsOptions<'_, G::Node>,
) -> TraversalResult<BfsTraversal<G::Node>> {
    Traverser::default().breadth_first_search(graph, start, options)
}

/// [`Traverser::shortest_path_bfs`] with default configuration.
///
/// Rebuilds the snapshot on every call for large graphs; see [`Traverser`].
pub fn shortest_path_bfs<G: GraphRead>(
    graph: &G,
    source: &G::Node,
    target: &G::Node,
) -> TraversalResult<Option<PathInfo<G::Node>>> {
    Traverser::default().shortest_path_bfs(graph, source, target)
}

/// [`Traverser::single_source_shortest_path_bfs`] with default configuration.
///
/// Rebuilds the snapshot on every call for large graphs; see [`Traverser`].
pub fn single_source_shortest_path_bfs<G: GraphRead>(
    graph: &G,
    source: &G::Node,
) -> TraversalResult<HashMap<G::Node, PathInfo<G::Node>>> {
    Traverser::default().single_source_shortest_path_bfs(graph, source)
}

/// [`Traverser::multi_source_bfs`] with default configuration.
///
/// Rebuilds the snapshot on every call for large graphs; see [`Traverser`].
pub fn multi_source_bfs<G: GraphRead>(
    graph: &G,
    sources: &[G::Node],
) -> TraversalResult<BfsTraversal<G::Node>> {
    Traverser::default().multi_source_bfs(graph, sources)
}
