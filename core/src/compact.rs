//! Immutable CSR (compressed sparse row) snapshot of a graph.
//!
//! Nodes are mapped to dense `u32` indices once, in `NodeKey::index_cmp`
//! order. Every row of `col_index` is sorted ascending and duplicate-free,
//! which gives O(log d) edge tests by binary search while keeping plain row
//! scans sequential.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{TraversalError, TraversalResult};
use crate::graph::{GraphRead, NodeKey};

/// Options for [`CompactGraph::from_graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CompactOptions {
    /// Build transposed rows for directed graphs, enabling bottom-up BFS.
    pub include_reverse: bool,
    /// Copy edge weights when the source graph has any.
    pub include_weights: bool,
}

/// Transposed rows: `row_start[v]..row_start[v+1]` lists the sources of edges into v.
#[derive(Debug, Clone)]
struct ReverseRows {
    row_start: Vec<usize>,
    col_index: Vec<u32>,
}

/// Immutable CSR graph. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct CompactGraph<N: NodeKey> {
    id_of: Vec<N>,
    index_of: FxHashMap<N, u32>,
    row_start: Vec<usize>,
    col_index: Vec<u32>,
    edge_weight: Option<Vec<f64>>,
    reverse: Option<ReverseRows>,
    /// Forward rows are their own transpose (undirected source).
    symmetric: bool,
}

impl<N: NodeKey> CompactGraph<N> {
    /// Build from an adjacency collection.
    ///
    /// Nodes that only appear as neighbors still get an index. Duplicate
    /// neighbors collapse. Edges missing from `weights` get weight 1.
    pub fn build<I, V, S>(
        adjacency: I,
        weights: Option<&HashMap<(N, N), f64, S>>,
        include_reverse: bool,
    ) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        V: IntoIterator<Item = N>,
        S: BuildHasher,
    {
        let weight_of = weights.map(|w| {
            move |u: &N, v: &N| w.get(&(u.clone(), v.clone())).copied().unwrap_or(1.0)
        });
        match weight_of {
            Some(f) => Self::assemble(adjacency, Some(&f), include_reverse, false),
            None => Self::assemble(adjacency, None::<&fn(&N, &N) -> f64>, include_reverse, false),
        }
    }

    /// Snapshot a mutable graph.
    ///
    /// Undirected graphs produce a symmetric snapshot: forward rows double as
    /// incoming rows, so `include_reverse` is only honored for directed graphs.
    pub fn from_graph<G>(graph: &G, options: CompactOptions) -> Self
    where
        G: GraphRead<Node = N>,
    {
        let adjacency = graph
            .nodes()
            .map(|id| (id.clone(), graph.neighbors(id).cloned().collect::<Vec<N>>()));
        let symmetric = !graph.is_directed();
        let include_reverse = options.include_reverse && !symmetric;

        if options.include_weights && graph.has_weights() {
            let weight_of = |u: &N, v: &N| {
                graph
                    .edge(u, v)
                    .and_then(|e| e.weight)
                    .unwrap_or(1.0)
            };
            Self::assemble(adjacency, Some(&weight_of), include_reverse, symmetric)
        } else {
            Self::assemble(
                adjacency,
                None::<&fn(&N, &N) -> f64>,
                include_reverse,
                symmetric,
            )
        }
    }

    fn assemble<I, V, F>(
        adjacency: I,
        weight_of: Option<&F>,
        include_reverse: bool,
        symmetric: bool,
    ) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        V: IntoIterator<Item = N>,
        F: Fn(&N, &N) -> f64,
    {
        let started = Instant::now();

        let entries: Vec<(N, Vec<N>)> = adjacency
            .into_iter()
            .map(|(src, nbrs)| (src, nbrs.into_iter().collect()))
            .collect();

        // Phase 1: deterministic index assignment over sources and neighbors
        let mut seen: FxHashSet<&N> = FxHashSet::default();
        for (src, nbrs) in &entries {
            seen.insert(src);
            seen.extend(nbrs.iter());
        }
        let mut id_of: Vec<N> = seen.into_iter().cloned().collect();
        id_of.sort_by(|a, b| a.index_cmp(b));
        assert!(
            id_of.len() <= u32::MAX as usize,
            "compact graph supports at most u32::MAX nodes"
        );

        let mut index_of: FxHashMap<N, u32> =
            FxHashMap::with_capacity_and_hasher(id_of.len(), Default::default());
        for (i, id) in id_of.iter().enumerate() {
            index_of.insert(id.clone(), i as u32);
        }

        // Phase 2: per-row target indices, sorted and deduplicated
        let n = id_of.len();
        let mut rows: Vec<Vec<u32>> = vec![Vec::new(); n];
        for (src, nbrs) in &entries {
            let row = &mut rows[index_of[src] as usize];
            row.extend(nbrs.iter().map(|v| index_of[v]));
        }
        drop(entries);

        let total: usize = rows.iter().map(|r| r.len()).sum();
        let mut row_start = Vec::with_capacity(n + 1);
        let mut col_index = Vec::with_capacity(total);
        let mut edge_weight = weight_of.map(|_| Vec::with_capacity(total));
        row_start.push(0);

        for (i, mut row) in rows.into_iter().enumerate() {
            row.sort_unstable();
            row.dedup();
            if let (Some(weights), Some(f)) = (edge_weight.as_mut(), weight_of) {
                let u = &id_of[i];
                weights.extend(row.iter().map(|&j| f(u, &id_of[j as usize])));
            }
            col_index.extend_from_slice(&row);
            row_start.push(col_index.len());
        }

        // Phase 3: optional transpose. Sources are visited in ascending
        // order, so every reverse row comes out sorted.
        let reverse = include_reverse.then(|| transpose(n, &row_start, &col_index));

        let graph = CompactGraph {
            id_of,
            index_of,
            row_start,
            col_index,
            edge_weight,
            reverse,
            symmetric,
        };

        #[cfg(debug_assertions)]
        graph.check_invariants();

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            reverse = graph.reverse.is_some(),
            symmetric,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "built compact graph"
        );

        graph
    }

    /// Assert the CSR invariants. Violations are builder bugs.
    pub fn check_invariants(&self) {
        let n = self.id_of.len();
        assert_eq!(self.row_start.len(), n + 1, "row_start must have n+1 entries");
        assert_eq!(self.row_start[0], 0, "row_start must begin at 0");
        assert_eq!(self.row_start[n], self.col_index.len(), "row_start must end at edge count");
        for i in 0..n {
            let row = self.out_row(i);
            assert!(
                row.windows(2).all(|w| w[0] < w[1]),
                "row {} is not strictly ascending",
                i
            );
            assert!(row.iter().all(|&j| (j as usize) < n), "row {} has out-of-range target", i);
        }
        if let Some(weights) = &self.edge_weight {
            assert_eq!(weights.len(), self.col_index.len(), "edge_weight must parallel col_index");
        }
        if let Some(rev) = &self.reverse {
            assert_eq!(
                rev.col_index.len(),
                self.col_index.len(),
                "reverse rows must hold every edge"
            );
            for v in 0..n {
                let incoming = &rev.col_index[rev.row_start[v]..rev.row_start[v + 1]];
                assert!(incoming.windows(2).all(|w| w[0] < w[1]));
                for &u in incoming {
                    assert!(
                        self.out_row(u as usize).binary_search(&(v as u32)).is_ok(),
                        "reverse edge {} <- {} has no forward counterpart",
                        v,
                        u
                    );
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.id_of.len()
    }

    /// Number of stored CSR entries (undirected edges count once per endpoint).
    pub fn edge_count(&self) -> usize {
        self.col_index.len()
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    pub fn has_reverse(&self) -> bool {
        self.reverse.is_some()
    }

    pub fn has_weights(&self) -> bool {
        self.edge_weight.is_some()
    }

    /// True when incoming rows are available, i.e. bottom-up BFS is possible.
    pub fn supports_pull(&self) -> bool {
        self.symmetric || self.reverse.is_some()
    }

    pub fn has_node(&self, id: &N) -> bool {
        self.index_of.contains_key(id)
    }

    pub fn node_to_index(&self, id: &N) -> TraversalResult<usize> {
        self.index_of
            .get(id)
            .map(|&i| i as usize)
            .ok_or_else(|| TraversalError::unknown(id))
    }

    pub fn index_to_node(&self, index: usize) -> TraversalResult<&N> {
        self.id_of.get(index).ok_or(TraversalError::IndexOutOfRange {
            index,
            len: self.id_of.len(),
        })
    }

    /// Node ids in index order.
    pub fn nodes(&self) -> impl Iterator<Item = &N> + '_ {
        self.id_of.iter()
    }

    /// Outgoing target indices of node `index`.
    ///
    /// Panics on an out-of-range index; callers inside the crate only pass
    /// indices obtained from this graph.
    #[inline]
    pub fn out_row(&self, index: usize) -> &[u32] {
        &self.col_index[self.row_start[index]..self.row_start[index + 1]]
    }

    /// Incoming source indices of node `index`, if the snapshot supports pull.
    #[inline]
    pub fn in_row(&self, index: usize) -> Option<&[u32]> {
        match &self.reverse {
            Some(rev) => Some(&rev.col_index[rev.row_start[index]..rev.row_start[index + 1]]),
            None if self.symmetric => Some(self.out_row(index)),
            None => None,
        }
    }

    #[inline]
    pub fn out_degree_at(&self, index: usize) -> usize {
        self.row_start[index + 1] - self.row_start[index]
    }

    /// Lazily iterate `id`'s neighbors. Empty for unknown nodes.
    pub fn neighbors(&self, id: &N) -> Neighbors<'_, N> {
        let row = match self.index_of.get(id) {
            Some(&i) => self.out_row(i as usize),
            None => &[],
        };
        Neighbors {
            graph: self,
            row: row.iter(),
        }
    }

    /// Out-degree of `id`; 0 for unknown nodes.
    pub fn out_degree(&self, id: &N) -> usize {
        self.index_of
            .get(id)
            .map(|&i| self.out_degree_at(i as usize))
            .unwrap_or(0)
    }

    /// In-degree of `id`, or `None` when the snapshot has no incoming rows.
    pub fn in_degree(&self, id: &N) -> Option<usize> {
        let &i = self.index_of.get(id)?;
        self.in_row(i as usize).map(|r| r.len())
    }

    /// Position of edge u -> v inside `col_index`, by binary search over u's row.
    fn edge_position(&self, u: &N, v: &N) -> Option<usize> {
        let &ui = self.index_of.get(u)?;
        let &vi = self.index_of.get(v)?;
        let start = self.row_start[ui as usize];
        self.out_row(ui as usize)
            .binary_search(&vi)
            .ok()
            .map(|offset| start + offset)
    }

    /// O(log out_degree(u)). False when either node is unknown.
    pub fn has_edge(&self, u: &N, v: &N) -> bool {
        self.edge_position(u, v).is_some()
    }

    /// Weight of u -> v; 1.0 for unweighted snapshots, `None` if the edge is absent.
    pub fn edge_weight(&self, u: &N, v: &N) -> Option<f64> {
        let pos = self.edge_position(u, v)?;
        Some(self.edge_weight.as_ref().map_or(1.0, |w| w[pos]))
    }

    /// Approximate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        use std::mem::size_of;

        let ids = self.id_of.len() * (2 * size_of::<N>() + size_of::<u32>());
        let rows = self.row_start.len() * size_of::<usize>();
        let cols = self.col_index.len() * size_of::<u32>();
        let weights = self.edge_weight.as_ref().map_or(0, |w| w.len() * size_of::<f64>());
        let reverse = self.reverse.as_ref().map_or(0, |r| {
            r.row_start.len() * size_of::<usize>() + r.col_index.len() * size_of::<u32>()
        });

        ids + rows + cols + weights + reverse
    }
}

/// Count in-degrees, prefix-sum, then scatter sources into their slots.
fn transpose(n: usize, row_start: &[usize], col_index: &[u32]) -> ReverseRows {
    let mut in_start = vec![0usize; n + 1];
    for &v in col_index {
        in_start[v as usize + 1] += 1;
    }
    for i in 1..=n {
        in_start[i] += in_start[i - 1];
    }

    let mut cursor = in_start.clone();
    let mut in_col = vec![0u32; col_index.len()];
    for u in 0..n {
        for &v in &col_index[row_start[u]..row_start[u + 1]] {
            let slot = &mut cursor[v as usize];
            in_col[*slot] = u as u32;
            *slot += 1;
        }
    }

    ReverseRows {
        row_start: in_start,
        col_index: in_col,
    }
}

/// Iterator over a CompactGraph row, yielding node ids.
///
/// Holds only a slice iterator, so it is cheap to clone and never touches
/// the graph's state.
#[derive(Debug, Clone)]
pub struct Neighbors<'a, N: NodeKey> {
    graph: &'a CompactGraph<N>,
    row: std::slice::Iter<'a, u32>,
}

impl<'a, N: NodeKey> Iterator for Neighbors<'a, N> {
    type Item = &'a N;

    fn next(&mut self) -> Option<&'a N> {
        self.row.next().map(|&i| &self.graph.id_of[i as usize])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.row.size_hint()
    }
}

impl<N: NodeKey> ExactSizeIterator for Neighbors<'_, N> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn adjacency(pairs: &[(&'static str, &[&'static str])]) -> Vec<(&'static str, Vec<&'static str>)> {
        pairs.iter().map(|(k, v)| (*k, v.to_vec())).collect()
    }

    fn build(pairs: &[(&'static str, &[&'static str])], reverse: bool) -> CompactGraph<&'static str> {
        CompactGraph::build(adjacency(pairs), None::<&HashMap<_, f64>>, reverse)
    }

    #[test]
    fn test_index_assignment_sorted() {
        let g = build(&[("c", &["a"]), ("b", &["z"])], false);
        let ids: Vec<_> = g.nodes().copied().collect();
        assert_eq!(ids, vec!["a", "b", "c", "z"]);
        assert_eq!(g.node_to_index(&"z").unwrap(), 3);
        assert_eq!(*g.index_to_node(1).unwrap(), "b");
    }

    #[test]
    fn test_numeric_strings_sort_numerically() {
        let adj = vec![
            ("10".to_string(), vec!["9".to_string()]),
            ("2".to_string(), vec![]),
        ];
        let g = CompactGraph::build(adj, None::<&HashMap<_, f64>>, false);
        let ids: Vec<_> = g.nodes().cloned().collect();
        assert_eq!(ids, vec!["2", "9", "10"]);
    }

    #[test]
    fn test_mixed_numeric_and_text_ids_order_is_total() {
        let adj: Vec<(String, Vec<String>)> = (0..200)
            .flat_map(|i| {
                [
                    (i.to_string(), vec![format!("{}x", i)]),
                    (format!("{}x", i), vec![]),
                ]
            })
            .collect();
        let g = CompactGraph::build(adj.clone(), None::<&HashMap<_, f64>>, false);
        let ids: Vec<String> = g.nodes().cloned().collect();

        let mut expected: Vec<String> = (0..200).map(|i| i.to_string()).collect();
        let mut text: Vec<String> = (0..200).map(|i| format!("{}x", i)).collect();
        text.sort();
        expected.extend(text);
        assert_eq!(ids, expected);

        let again = CompactGraph::build(adj.into_iter().rev(), None::<&HashMap<_, f64>>, false);
        assert!(again.nodes().eq(g.nodes()));
    }

    #[test]
    fn test_rows_sorted_and_deduplicated() {
        let g = build(&[("a", &["d", "b", "c", "b"])], false);
        assert_eq!(g.out_row(0), &[1, 2, 3]);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.out_degree(&"a"), 3);
        g.check_invariants();
    }

    #[test]
    fn test_has_edge() {
        let g = build(&[("a", &["b", "c"]), ("b", &["c"])], false);
        assert!(g.has_edge(&"a", &"b"));
        assert!(g.has_edge(&"b", &"c"));
        assert!(!g.has_edge(&"b", &"a"));
        assert!(!g.has_edge(&"c", &"a"));
        assert!(!g.has_edge(&"a", &"ghost"));
        assert!(!g.has_edge(&"ghost", &"a"));
    }

    #[test]
    fn test_neighbors_reiterable() {
        let g = build(&[("a", &["c", "b"])], false);
        let first: Vec<_> = g.neighbors(&"a").copied().collect();
        let second: Vec<_> = g.neighbors(&"a").copied().collect();
        assert_eq!(first, vec!["b", "c"]);
        assert_eq!(first, second);
        assert_eq!(g.neighbors(&"a").len(), 2);
        assert_eq!(g.neighbors(&"nope").count(), 0);
    }

    #[test]
    fn test_reverse_is_transpose() {
        let g = build(&[("a", &["c"]), ("b", &["c", "a"])], true);
        assert!(g.has_reverse());
        assert!(g.supports_pull());
        let c = g.node_to_index(&"c").unwrap();
        assert_eq!(g.in_row(c).unwrap(), &[0, 1]);
        assert_eq!(g.in_degree(&"a"), Some(1));
        assert_eq!(g.in_degree(&"b"), Some(0));
        g.check_invariants();
    }

    #[test]
    fn test_no_reverse_no_pull() {
        let g = build(&[("a", &["b"])], false);
        assert!(!g.supports_pull());
        assert!(g.in_row(0).is_none());
        assert_eq!(g.in_degree(&"b"), None);
    }

    #[test]
    fn test_weights_default_to_one() {
        let mut weights = HashMap::new();
        weights.insert(("a", "b"), 2.5);
        let g = CompactGraph::build(adjacency(&[("a", &["b", "c"])]), Some(&weights), false);
        assert!(g.has_weights());
        assert_eq!(g.edge_weight(&"a", &"b"), Some(2.5));
        assert_eq!(g.edge_weight(&"a", &"c"), Some(1.0));
        assert_eq!(g.edge_weight(&"b", &"a"), None);
    }

    #[test]
    fn test_unweighted_edge_weight_is_one() {
        let g = build(&[("a", &["b"])], false);
        assert_eq!(g.edge_weight(&"a", &"b"), Some(1.0));
    }

    #[test]
    fn test_index_errors() {
        let g = build(&[("a", &["b"])], false);
        assert_eq!(
            g.node_to_index(&"x"),
            Err(TraversalError::UnknownNode("\"x\"".to_string()))
        );
        assert_eq!(
            g.index_to_node(5),
            Err(TraversalError::IndexOutOfRange { index: 5, len: 2 })
        );
    }

    #[test]
    fn test_empty_adjacency() {
        let g = build(&[], true);
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.edge_count(), 0);
        g.check_invariants();
    }

    #[test]
    fn test_from_undirected_graph_is_symmetric() {
        let mut graph: Graph<u32> = Graph::new_undirected();
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);
        let g = CompactGraph::from_graph(
            &graph,
            CompactOptions {
                include_reverse: true,
                include_weights: false,
            },
        );
        assert!(g.is_symmetric());
        assert!(!g.has_reverse());
        assert!(g.supports_pull());
        assert!(g.has_edge(&1, &0));
        assert_eq!(g.in_row(1).unwrap(), &[0, 2]);
    }

    #[test]
    fn test_from_directed_graph_with_weights() {
        let mut graph: Graph<u32> = Graph::new_directed();
        graph.add_weighted_edge(0, 1, 3.0);
        graph.add_edge(1, 2);
        let g = CompactGraph::from_graph(
            &graph,
            CompactOptions {
                include_reverse: true,
                include_weights: true,
            },
        );
        assert!(!g.is_symmetric());
        assert!(g.has_reverse());
        assert_eq!(g.edge_weight(&0, &1), Some(3.0));
        assert_eq!(g.edge_weight(&1, &2), Some(1.0));
        assert!(!g.has_edge(&1, &0));
    }

    #[test]
    fn test_memory_usage_nonzero() {
        let g = build(&[("a", &["b"])], true);
        assert!(g.memory_usage() > 0);
    }
}
