//! End-to-end traversal scenarios through the public dispatcher API.

mod common;

use std::collections::{HashMap, HashSet};

use traverse_accel_core::{
    breadth_first_search, is_bipartite, shortest_path_bfs, single_source_shortest_path_bfs,
    BfsOptions, Engine, Graph, GraphRead, Strategy, TraversalConfig, TraversalError, Traverser,
};

use common::{from_labels, small_world};

fn forced(strategy: Strategy) -> Traverser<&'static str> {
    Traverser::new(TraversalConfig {
        strategy,
        ..TraversalConfig::default()
    })
}

#[test]
fn path_graph_order_and_tree() {
    let g = from_labels(&[("a", "b"), ("b", "c"), ("c", "d")]);
    let expected_tree: HashMap<_, _> = [("a", None), ("b", Some("a")), ("c", Some("b")), ("d", Some("c"))]
        .into_iter()
        .collect();

    let r = breadth_first_search(&g, &"a", BfsOptions::new()).unwrap();
    assert_eq!(r.order, vec!["a", "b", "c", "d"]);
    assert_eq!(r.tree, expected_tree);

    let fast = forced(Strategy::Optimized)
        .breadth_first_search(&g, &"a", BfsOptions::new())
        .unwrap();
    assert_eq!(fast.order, vec!["a", "b", "c", "d"]);
    assert_eq!(fast.tree, expected_tree);
}

#[test]
fn star_shortest_path_through_hub() {
    let g = from_labels(&[("center", "a"), ("center", "b"), ("center", "c")]);
    for strategy in [Strategy::Baseline, Strategy::Optimized] {
        let p = forced(strategy)
            .shortest_path_bfs(&g, &"a", &"b")
            .unwrap()
            .unwrap();
        assert_eq!(p.distance, 2);
        assert_eq!(p.path, vec!["a", "center", "b"]);
    }
}

#[test]
fn disconnected_single_source_excludes_other_component() {
    let g = from_labels(&[("a", "b"), ("c", "d")]);
    let all = single_source_shortest_path_bfs(&g, &"a").unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.contains_key("a") && all.contains_key("b"));
    assert!(!all.contains_key("c") && !all.contains_key("d"));
    assert!(shortest_path_bfs(&g, &"a", &"d").unwrap().is_none());
}

#[test]
fn triangle_and_square_bipartiteness() {
    let triangle = from_labels(&[("a", "b"), ("b", "c"), ("c", "a")]);
    let square = from_labels(&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")]);
    assert!(!is_bipartite(&triangle).unwrap());
    assert!(is_bipartite(&square).unwrap());
}

#[test]
fn directed_graph_rejected_by_bipartite_check() {
    let mut g = Graph::new_directed();
    g.add_edge("a", "b");
    assert_eq!(is_bipartite(&g), Err(TraversalError::DirectedGraph));
}

#[test]
fn large_small_world_matches_baseline_on_truncated_subgraph() {
    let g = small_world(100_000, 5, 0.05, 67890);
    let traverser = Traverser::default();
    assert_eq!(traverser.engine_for(&g), Engine::Optimized);

    let full = traverser.breadth_first_search(&g, &0, BfsOptions::new()).unwrap();
    assert_eq!(full.visited.len(), g.node_count());

    // Any prefix of BFS order induces a subgraph with unchanged distances
    // from the source.
    let kept: HashSet<u64> = full.order.iter().take(2_000).copied().collect();
    let mut sub = Graph::new_undirected();
    for &u in &full.order[..2_000] {
        sub.add_node(u);
        for &v in g.neighbors(&u) {
            if kept.contains(&v) {
                sub.add_edge(u, v);
            }
        }
    }
    assert_eq!(traverser.engine_for(&sub), Engine::Baseline);

    let truncated = traverser.breadth_first_search(&sub, &0, BfsOptions::new()).unwrap();
    assert_eq!(truncated.visited.len(), 2_000);
    for (node, d) in &truncated.distance {
        assert_eq!(full.distance[node], *d, "node {}", node);
    }

    // One snapshot built, reused by the second large call.
    traverser.shortest_path_bfs(&g, &0, &50_000).unwrap().unwrap();
    let stats = traverser.cache().stats();
    assert_eq!((stats.misses, stats.hits), (1, 1));
}

#[test]
fn single_node_graph() {
    let mut g: Graph<&'static str> = Graph::new_undirected();
    g.add_node("only");
    for strategy in [Strategy::Baseline, Strategy::Optimized] {
        let r = forced(strategy)
            .breadth_first_search(&g, &"only", BfsOptions::new())
            .unwrap();
        assert_eq!(r.visited, HashSet::from(["only"]));
        assert_eq!(r.order, vec!["only"]);
        assert_eq!(r.tree, HashMap::from([("only", None)]));
    }
}

#[test]
fn empty_graph_has_no_valid_source() {
    let g: Graph<&'static str> = Graph::new_undirected();
    let err = breadth_first_search(&g, &"x", BfsOptions::new()).unwrap_err();
    assert_eq!(err, TraversalError::UnknownNode("\"x\"".to_string()));
    assert!(is_bipartite(&g).unwrap());
}

#[test]
fn stale_snapshot_until_invalidated() {
    let traverser = forced(Strategy::Optimized);
    let mut g = from_labels(&[("a", "b")]);
    assert_eq!(
        traverser.breadth_first_search(&g, &"a", BfsOptions::new()).unwrap().order.len(),
        2
    );

    g.add_edge("b", "c");
    let stale = traverser.breadth_first_search(&g, &"a", BfsOptions::new()).unwrap();
    assert_eq!(stale.order.len(), 2);

    traverser.cache().invalidate(&g);
    let fresh = traverser.breadth_first_search(&g, &"a", BfsOptions::new()).unwrap();
    assert_eq!(fresh.order, vec!["a", "b", "c"]);
}

#[test]
fn config_from_toml_drives_dispatch() {
    let config = TraversalConfig::from_toml_str(
        r#"
        optimized_threshold = 2
        [bfs]
        alpha = 4.0
        "#,
    )
    .unwrap();
    let traverser: Traverser<&'static str> = Traverser::new(config);
    let g = from_labels(&[("a", "b"), ("b", "c")]);
    assert_eq!(traverser.engine_for(&g), Engine::Optimized);
    assert_eq!(traverser.config().bfs.beta, 20.0);
}
