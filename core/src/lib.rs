//! traverse-accel-core: size-aware BFS for in-memory graphs.
//!
//! Small graphs are searched with a plain queue-based BFS over the mutable
//! [`Graph`]. Above a node-count threshold the graph is frozen into a
//! [`CompactGraph`] (CSR) snapshot, cached per graph instance, and searched
//! with a direction-optimizing BFS that switches between top-down and
//! bottom-up expansion per level. Both engines return the same result shapes.
//! No I/O and no global state; the bench crate drives it end to end.

mod cache;
mod compact;
mod config;
mod dobfs;
mod error;
mod graph;
mod traversal;

pub use cache::{CacheStats, CompactGraphCache};
pub use compact::{CompactGraph, CompactOptions, Neighbors};
pub use config::{BfsConfig, Strategy, TraversalConfig, DEFAULT_OPTIMIZED_THRESHOLD};
pub use dobfs::{Direction, DirectionOptimizedBfs, SearchPhase, SearchResult, SearchStats};
pub use error::{ConfigError, TraversalError, TraversalResult};
pub use graph::{EdgeData, Graph, GraphId, GraphIdentity, GraphRead, NodeKey};
pub use traversal::{
    breadth_first_search, is_bipartite, multi_source_bfs, shortest_path_bfs,
    single_source_shortest_path_bfs, BfsOptions, BfsTraversal, Engine, PathInfo, Traverser,
};

