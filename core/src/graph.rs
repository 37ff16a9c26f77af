use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use rustc_hash::{FxHashMap, FxHashSet};

/// Identifier types usable as graph nodes.
///
/// `index_cmp` fixes the order in which a CompactGraph assigns dense indices,
/// so construction and test output are reproducible.
pub trait NodeKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    fn index_cmp(&self, other: &Self) -> Ordering;
}

macro_rules! impl_numeric_node_key {
    ($($t:ty),*) => {
        $(
            impl NodeKey for $t {
                fn index_cmp(&self, other: &Self) -> Ordering {
                    self.cmp(other)
                }
            }
        )*
    };
}

impl_numeric_node_key!(u8, u16, u32, u64, usize, i32, i64, isize);

/// Numeric strings sort before all others, by value then lexically; the rest
/// sort lexically. Must stay a total order: `sort_by` panics otherwise.
fn str_index_cmp(a: &str, b: &str) -> Ordering {
    let parse = |s: &str| s.parse::<f64>().ok().filter(|f| f.is_finite());
    match (parse(a), parse(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

impl NodeKey for String {
    fn index_cmp(&self, other: &Self) -> Ordering {
        str_index_cmp(self, other)
    }
}

impl NodeKey for &'static str {
    fn index_cmp(&self, other: &Self) -> Ordering {
        str_index_cmp(self, other)
    }
}

/// Process-unique graph instance id. Never reused, even after the graph drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u64);

impl GraphId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        GraphId(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Identity handle used to key derived data off a graph instance without
/// owning it. `is_alive` turns false once the graph has been dropped.
#[derive(Debug, Clone)]
pub struct GraphIdentity {
    pub id: GraphId,
    alive: Weak<()>,
}

impl GraphIdentity {
    pub fn is_alive(&self) -> bool {
        self.alive.strong_count() > 0
    }
}

/// Edge metadata returned by [`GraphRead::edge`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeData {
    pub weight: Option<f64>,
}

/// Read-only view of a mutable graph, as consumed by the traversal core.
pub trait GraphRead {
    type Node: NodeKey;

    fn is_directed(&self) -> bool;

    fn node_count(&self) -> usize;

    /// Edge count; undirected edges count once.
    fn edge_count(&self) -> usize;

    fn has_node(&self, id: &Self::Node) -> bool;

    /// All nodes, in a stable order.
    fn nodes(&self) -> impl Iterator<Item = &Self::Node> + '_;

    /// Outgoing neighbors (all neighbors for undirected graphs). Empty for unknown nodes.
    fn neighbors(&self, id: &Self::Node) -> impl Iterator<Item = &Self::Node> + '_;

    /// Total degree: in + out for directed graphs.
    fn degree(&self, id: &Self::Node) -> usize;

    fn out_degree(&self, id: &Self::Node) -> usize;

    fn edge(&self, from: &Self::Node, to: &Self::Node) -> Option<EdgeData>;

    /// True if at least one edge carries an explicit weight.
    fn has_weights(&self) -> bool;

    fn identity(&self) -> GraphIdentity;
}

/// A stored adjacency entry.
#[derive(Debug, Clone, Copy)]
struct Edge {
    target: usize,
    weight: Option<f64>,
}

/// Mutable adjacency-list graph.
///
/// Undirected edges are stored in both endpoints' lists. For directed graphs
/// `outgoing[a]` holds edges from a and `incoming[b]` holds edges into b.
/// Parallel edges collapse to one; the last weight written wins.
pub struct Graph<N: NodeKey> {
    directed: bool,
    ids: Vec<N>,
    index: FxHashMap<N, usize>,
    outgoing: Vec<Vec<Edge>>,
    incoming: Vec<Vec<Edge>>,
    edge_set: FxHashSet<(usize, usize)>,
    weighted_edges: usize,
    id: GraphId,
    alive: Arc<()>,
}

impl<N: NodeKey> Graph<N> {
    pub fn new_undirected() -> Self {
        Self::with_capacity(false, 0)
    }

    pub fn new_directed() -> Self {
        Self::with_capacity(true, 0)
    }

    /// Pre-allocate for a known node count.
    pub fn with_capacity(directed: bool, node_count: usize) -> Self {
        Self {
            directed,
            ids: Vec::with_capacity(node_count),
            index: FxHashMap::with_capacity_and_hasher(node_count, Default::default()),
            outgoing: Vec::with_capacity(node_count),
            incoming: if directed {
                Vec::with_capacity(node_count)
            } else {
                Vec::new()
            },
            edge_set: FxHashSet::default(),
            weighted_edges: 0,
            id: GraphId::next(),
            alive: Arc::new(()),
        }
    }

    /// Register a node. Returns its insertion index; existing nodes are left untouched.
    pub fn add_node(&mut self, id: N) -> usize {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.ids.len();
        self.index.insert(id.clone(), idx);
        self.ids.push(id);
        self.outgoing.push(Vec::new());
        if self.directed {
            self.incoming.push(Vec::new());
        }
        idx
    }

    /// Add an unweighted edge, creating missing endpoints.
    pub fn add_edge(&mut self, from: N, to: N) {
        self.insert_edge(from, to, None);
    }

    pub fn add_weighted_edge(&mut self, from: N, to: N, weight: f64) {
        self.insert_edge(from, to, Some(weight));
    }

    fn edge_key(&self, a: usize, b: usize) -> (usize, usize) {
        if self.directed || a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    fn insert_edge(&mut self, from: N, to: N, weight: Option<f64>) {
        let a = self.add_node(from);
        let b = self.add_node(to);
        let key = self.edge_key(a, b);

        if !self.edge_set.insert(key) {
            self.set_weight(a, b, weight);
            return;
        }
        if weight.is_some() {
            self.weighted_edges += 1;
        }

        self.outgoing[a].push(Edge { target: b, weight });
        if self.directed {
            self.incoming[b].push(Edge { target: a, weight });
        } else if a != b {
            self.outgoing[b].push(Edge { target: a, weight });
        }
    }

    fn set_weight(&mut self, a: usize, b: usize, weight: Option<f64>) {
        let Some(w) = weight else { return };
        let mut newly_weighted = false;
        for e in self.outgoing[a].iter_mut().filter(|e| e.target == b) {
            newly_weighted = e.weight.is_none();
            e.weight = Some(w);
        }
        let mirror = if self.directed {
            &mut self.incoming[b]
        } else {
            &mut self.outgoing[b]
        };
        for e in mirror.iter_mut().filter(|e| e.target == a) {
            e.weight = Some(w);
        }
        if newly_weighted {
            self.weighted_edges += 1;
        }
    }

    /// Remove an edge. Returns false if it did not exist.
    ///
    /// Any CompactGraph previously cached for this graph is NOT refreshed;
    /// invalidate it through the owning cache.
    pub fn remove_edge(&mut self, from: &N, to: &N) -> bool {
        let (Some(&a), Some(&b)) = (self.index.get(from), self.index.get(to)) else {
            return false;
        };
        let key = self.edge_key(a, b);
        if !self.edge_set.remove(&key) {
            return false;
        }
        if self.outgoing[a].iter().any(|e| e.target == b && e.weight.is_some()) {
            self.weighted_edges -= 1;
        }
        self.outgoing[a].retain(|e| e.target != b);
        if self.directed {
            self.incoming[b].retain(|e| e.target != a);
        } else {
            self.outgoing[b].retain(|e| e.target != a);
        }
        true
    }

    pub fn in_degree(&self, id: &N) -> usize {
        match self.index.get(id) {
            Some(&i) if self.directed => self.incoming[i].len(),
            Some(&i) => self.outgoing[i].len(),
            None => 0,
        }
    }

    /// Approximate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        use std::mem::size_of;

        let nodes_mem = self.ids.len() * (2 * size_of::<N>() + size_of::<usize>() + 2 * size_of::<Vec<Edge>>());
        let out_edges: usize = self.outgoing.iter().map(|v| v.capacity() * size_of::<Edge>()).sum();
        let in_edges: usize = self.incoming.iter().map(|v| v.capacity() * size_of::<Edge>()).sum();
        let set_mem = self.edge_set.len() * size_of::<(usize, usize)>() * 2;

        nodes_mem + out_edges + in_edges + set_mem
    }
}

impl<N: NodeKey> GraphRead for Graph<N> {
    type Node = N;

    fn is_directed(&self) -> bool {
        self.directed
    }

    fn node_count(&self) -> usize {
        self.ids.len()
    }

    fn edge_count(&self) -> usize {
        self.edge_set.len()
    }

    fn has_node(&self, id: &N) -> bool {
        self.index.contains_key(id)
    }

    fn nodes(&self) -> impl Iterator<Item = &N> + '_ {
        self.ids.iter()
    }

    fn neighbors(&self, id: &N) -> impl Iterator<Item = &N> + '_ {
        let row: &[Edge] = match self.index.get(id) {
            Some(&i) => &self.outgoing[i],
            None => &[],
        };
        row.iter().map(move |e| &self.ids[e.target])
    }

    fn degree(&self, id: &N) -> usize {
        match self.index.get(id) {
            Some(&i) if self.directed => self.outgoing[i].len() + self.incoming[i].len(),
            Some(&i) => self.outgoing[i].len(),
            None => 0,
        }
    }

    fn out_degree(&self, id: &N) -> usize {
        self.index.get(id).map(|&i| self.outgoing[i].len()).unwrap_or(0)
    }

    fn edge(&self, from: &N, to: &N) -> Option<EdgeData> {
        let a = *self.index.get(from)?;
        let b = *self.index.get(to)?;
        self.outgoing[a]
            .iter()
            .find(|e| e.target == b)
            .map(|e| EdgeData { weight: e.weight })
    }

    fn has_weights(&self) -> bool {
        self.weighted_edges > 0
    }

    fn identity(&self) -> GraphIdentity {
        GraphIdentity {
            id: self.id,
            alive: Arc::downgrade(&self.alive),
        }
    }
}

impl<N: NodeKey> Clone for Graph<N> {
    /// The clone is a distinct graph instance with its own identity, so it
    /// never shares cache entries with the original.
    fn clone(&self) -> Self {
        Self {
            directed: self.directed,
            ids: self.ids.clone(),
            index: self.index.clone(),
            outgoing: self.outgoing.clone(),
            incoming: self.incoming.clone(),
            edge_set: self.edge_set.clone(),
            weighted_edges: self.weighted_edges,
            id: GraphId::next(),
            alive: Arc::new(()),
        }
    }
}

impl<N: NodeKey> Default for Graph<N> {
    fn default() -> Self {
        Self::new_undirected()
    }
}

impl<N: NodeKey> Debug for Graph<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("directed", &self.directed)
            .field("nodes", &self.ids.len())
            .field("edges", &self.edge_set.len())
            .finish()
    }
}
