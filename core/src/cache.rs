//! Side table from graph instances to their CompactGraph snapshots.
//!
//! Entries are keyed by graph identity, not content: mutating a graph does
//! not refresh its snapshot. Call [`CompactGraphCache::invalidate`] after
//! mutating a graph that has already been traversed through the optimized
//! engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::sync::Cache;

use crate::compact::{CompactGraph, CompactOptions};
use crate::graph::{GraphId, GraphIdentity, GraphRead, NodeKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    graph: GraphId,
    options: CompactOptions,
}

#[derive(Clone)]
struct CacheEntry<N: NodeKey> {
    snapshot: Arc<CompactGraph<N>>,
    identity: GraphIdentity,
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

/// Thread-safe cache of CompactGraph snapshots.
///
/// Concurrent first requests for the same graph coalesce: one caller builds,
/// the others wait for its result. A snapshot is only published once fully
/// built.
pub struct CompactGraphCache<N: NodeKey> {
    cache: Cache<CacheKey, CacheEntry<N>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<N: NodeKey> CompactGraphCache<N> {
    pub fn new(capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .build();
        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached snapshot for `graph`, building it on first use.
    pub fn get_or_build<G>(&self, graph: &G, options: CompactOptions) -> Arc<CompactGraph<N>>
    where
        G: GraphRead<Node = N>,
    {
        let identity = graph.identity();
        let key = CacheKey {
            graph: identity.id,
            options,
        };

        let mut built = false;
        let entry = self.cache.get_with(key, || {
            built = true;
            tracing::debug!(
                graph = identity.id.as_u64(),
                nodes = graph.node_count(),
                "compact graph cache miss"
            );
            CacheEntry {
                snapshot: Arc::new(CompactGraph::from_graph(graph, options)),
                identity: identity.clone(),
            }
        });

        if built {
            self.misses.fetch_add(1, Ordering::Relaxed);
            self.prune_dropped();
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        entry.snapshot
    }

    /// Cached snapshot for `graph`, without building.
    pub fn get<G>(&self, graph: &G, options: CompactOptions) -> Option<Arc<CompactGraph<N>>>
    where
        G: GraphRead<Node = N>,
    {
        let key = CacheKey {
            graph: graph.identity().id,
            options,
        };
        self.cache.get(&key).map(|e| e.snapshot)
    }

    /// Drop every snapshot derived from `graph`.
    pub fn invalidate<G>(&self, graph: &G)
    where
        G: GraphRead<Node = N>,
    {
        let id = graph.identity().id;
        for include_reverse in [false, true] {
            for include_weights in [false, true] {
                self.cache.invalidate(&CacheKey {
                    graph: id,
                    options: CompactOptions {
                        include_reverse,
                        include_weights,
                    },
                });
            }
        }
    }

    /// Evict entries whose source graph has been dropped.
    pub fn prune_dropped(&self) {
        let dead: Vec<CacheKey> = self
            .cache
            .iter()
            .filter(|(_, entry)| !entry.identity.is_alive())
            .map(|(key, _)| *key)
            .collect();
        for key in &dead {
            self.cache.invalidate(key);
        }
        if !dead.is_empty() {
            tracing::debug!(pruned = dead.len(), "pruned snapshots of dropped graphs");
        }
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
        }
    }
}

impl<N: NodeKey> Default for CompactGraphCache<N> {
    fn default() -> Self {
        Self::new(crate::config::TraversalConfig::default().cache_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn graph() -> Graph<u32> {
        let mut g = Graph::new_undirected();
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        g
    }

    #[test]
    fn test_second_request_hits() {
        let cache = CompactGraphCache::new(8);
        let g = graph();
        let a = cache.get_or_build(&g, CompactOptions::default());
        let b = cache.get_or_build(&g, CompactOptions::default());
        assert!(Arc::ptr_eq(&a, &b));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_distinct_graphs_distinct_entries() {
        let cache = CompactGraphCache::new(8);
        let g = graph();
        let h = g.clone();
        let a = cache.get_or_build(&g, CompactOptions::default());
        let b = cache.get_or_build(&h, CompactOptions::default());
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_mutation_is_not_observed_until_invalidate() {
        let cache = CompactGraphCache::new(8);
        let mut g = graph();
        let before = cache.get_or_build(&g, CompactOptions::default());
        assert!(!before.has_node(&9));

        g.add_edge(2, 9);
        let stale = cache.get_or_build(&g, CompactOptions::default());
        assert!(!stale.has_node(&9));

        cache.invalidate(&g);
        let fresh = cache.get_or_build(&g, CompactOptions::default());
        assert!(fresh.has_node(&9));
    }

    #[test]
    fn test_get_without_build() {
        let cache = CompactGraphCache::new(8);
        let g = graph();
        assert!(cache.get(&g, CompactOptions::default()).is_none());
        cache.get_or_build(&g, CompactOptions::default());
        assert!(cache.get(&g, CompactOptions::default()).is_some());
    }

    #[test]
    fn test_clear() {
        let cache = CompactGraphCache::new(8);
        let g = graph();
        cache.get_or_build(&g, CompactOptions::default());
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_dropped_graph_pruned() {
        let cache = CompactGraphCache::new(8);
        let g = graph();
        cache.get_or_build(&g, CompactOptions::default());
        drop(g);
        let other = graph();
        cache.get_or_build(&other, CompactOptions::default());
        cache.prune_dropped();
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_concurrent_first_build_coalesces() {
        let cache = CompactGraphCache::new(8);
        let g = graph();
        let snapshots: Vec<Arc<CompactGraph<u32>>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| cache.get_or_build(&g, CompactOptions::default())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(snapshots.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.stats().misses, 1);
    }
}
