use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use brandes::{
    strategy_for, AdjacencyGraph, Betweenness, BetweennessConfig, Cancellation, Centrality, Error, Graph,
    RunStatus,
};
use proptest::prelude::*;

/// Directed cycle `0 -> 1 -> .. -> n-1 -> 0`, implemented outside the crate.
#[derive(Debug, Clone, Copy)]
struct Ring {
    n: usize,
}

impl Graph for Ring {
    fn upper_node_id_bound(&self) -> usize {
        self.n
    }

    fn is_directed(&self) -> bool {
        true
    }

    fn for_out_edges<F: FnMut(usize, f64)>(&self, node: usize, mut f: F) {
        f((node + 1) % self.n, 1.0);
    }

    fn for_in_edges<F: FnMut(usize, f64)>(&self, node: usize, mut f: F) {
        f((node + self.n - 1) % self.n, 1.0);
    }
}

/// Forwards to `inner` and raises `signal` on the `limit`-th out-edge scan.
struct CancelAfter<'a> {
    inner: &'a AdjacencyGraph,
    signal: Cancellation,
    scans: AtomicUsize,
    limit: usize,
}

impl Graph for CancelAfter<'_> {
    fn upper_node_id_bound(&self) -> usize {
        self.inner.upper_node_id_bound()
    }

    fn has_node(&self, node: usize) -> bool {
        self.inner.has_node(node)
    }

    fn is_directed(&self) -> bool {
        self.inner.is_directed()
    }

    fn is_weighted(&self) -> bool {
        self.inner.is_weighted()
    }

    fn for_out_edges<F: FnMut(usize, f64)>(&self, node: usize, f: F) {
        if self.scans.fetch_add(1, Ordering::Relaxed) + 1 == self.limit {
            self.signal.cancel();
        }
        self.inner.for_out_edges(node, f);
    }

    fn for_in_edges<F: FnMut(usize, f64)>(&self, node: usize, f: F) {
        self.inner.for_in_edges(node, f);
    }

    fn weight(&self, u: usize, v: usize) -> Option<f64> {
        self.inner.weight(u, v)
    }
}

fn build(n: usize, pairs: &[(usize, usize, u8)], directed: bool, weighted: bool) -> AdjacencyGraph {
    let mut g = AdjacencyGraph::new(n, directed, weighted);
    for &(a, b, w) in pairs {
        let (u, v) = (a % n, b % n);
        if u != v && !g.has_edge(u, v) {
            g.add_edge(u, v, f64::from(w)).unwrap();
        }
    }
    g.index_edges();
    g
}

/// Betweenness by enumerating every shortest path of every pair.
fn brute_force(g: &AdjacencyGraph) -> (Vec<f64>, HashMap<usize, f64>) {
    let mut nodes = vec![0.0; g.upper_node_id_bound()];
    let mut edges: HashMap<usize, f64> = HashMap::new();
    let mut sssp = strategy_for(g);
    for s in g.nodes() {
        sssp.set_source(s);
        sssp.run(g);
        for t in g.nodes().into_iter().filter(|&t| t != s) {
            let paths = sssp.paths(t);
            if paths.is_empty() {
                continue;
            }
            let share = 1.0 / paths.len() as f64;
            for path in &paths {
                for &x in &path[1..path.len() - 1] {
                    nodes[x] += share;
                }
                for hop in path.windows(2) {
                    let id = g.edge_id(hop[0], hop[1]).unwrap();
                    *edges.entry(id).or_default() += share;
                }
            }
        }
    }
    if !g.is_directed() {
        nodes.iter_mut().for_each(|x| *x /= 2.0);
        edges.values_mut().for_each(|x| *x /= 2.0);
    }
    (nodes, edges)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

fn edge_config() -> BetweennessConfig {
    BetweennessConfig { compute_edge_centrality: true, ..Default::default() }
}

#[test]
fn directed_ring_is_uniform() {
    let ring = Ring { n: 5 };
    let mut bc = Betweenness::new(&ring, BetweennessConfig::default()).unwrap();
    assert_eq!(bc.run().unwrap(), RunStatus::Completed);
    // Pairs at cycle distance d have d - 1 interior nodes: 1 + 2 + 3 per node.
    assert_eq!(bc.scores(false).unwrap(), vec![6.0; 5]);
    assert_eq!(bc.centralization().unwrap(), 0.0);

    let mut normalized = Betweenness::new(&ring, BetweennessConfig { normalized: true, ..Default::default() }).unwrap();
    normalized.run().unwrap();
    assert_eq!(normalized.top_k(2).unwrap(), vec![(0, 0.5), (1, 0.5)]);
}

#[test]
fn ring_without_edge_ids_cannot_score_edges() {
    let ring = Ring { n: 4 };
    assert!(matches!(Betweenness::new(&ring, edge_config()), Err(Error::Configuration(_))));
}

#[test]
fn reads_before_run_fail() {
    let g = build(4, &[(0, 1, 1), (1, 2, 1), (2, 3, 1)], false, false);
    let mut bc = Betweenness::new(&g, BetweennessConfig::default()).unwrap();
    assert!(matches!(bc.score(0), Err(Error::NotRun)));
    assert!(matches!(bc.ranking(), Err(Error::NotRun)));
    assert!(matches!(bc.length_scale_scores(false), Err(Error::NotRun)));
    bc.run().unwrap();
    assert_eq!(bc.scores(true).unwrap(), vec![0.0, 2.0, 2.0, 0.0]);
    assert!(matches!(bc.scores(true), Err(Error::NotRun)));
}

#[test]
fn cancelling_mid_run_stops_every_worker() {
    let n = 400;
    let edges: Vec<(usize, usize)> = (1..n).map(|i| (i - 1, i)).collect();
    let path = AdjacencyGraph::from_edges(n, false, &edges).unwrap();
    let signal = Cancellation::new();
    let limit = 5_000;
    let g = CancelAfter { inner: &path, signal: signal.clone(), scans: AtomicUsize::new(0), limit };

    let config = BetweennessConfig { num_threads: Some(4), ..Default::default() };
    let mut bc = Betweenness::new(&g, config).unwrap().with_cancellation(signal.clone());
    assert_eq!(bc.run().unwrap(), RunStatus::Cancelled);
    assert!(!bc.has_run());
    assert!(matches!(bc.scores(false), Err(Error::NotRun)));

    // A full run scans n edge lists per source; each worker finishes at most its current source.
    let scans = g.scans.load(Ordering::Relaxed);
    assert!(scans >= limit);
    assert!(scans <= limit + 4 * n, "{scans} scans after cancelling at {limit}");
    assert!(scans < n * n);
}

#[test]
fn rerun_after_graph_change_uses_new_graph() {
    let mut g = build(4, &[(0, 1, 1), (1, 2, 1), (2, 3, 1)], false, false);
    {
        let mut bc = Betweenness::new(&g, BetweennessConfig::default()).unwrap();
        bc.run().unwrap();
        assert_eq!(bc.score(1).unwrap(), 2.0);
    }
    g.add_edge(0, 3, 1.0).unwrap();
    let mut bc = Betweenness::new(&g, BetweennessConfig::default()).unwrap();
    bc.run().unwrap();
    // A 4-cycle: each node brokers half of its opposite pair.
    assert_eq!(bc.scores(false).unwrap(), vec![0.5; 4]);
}

#[test]
fn weighted_scores_match_enumeration() {
    let g = build(
        6,
        &[(0, 1, 2), (1, 2, 2), (0, 3, 1), (3, 2, 3), (2, 4, 1), (4, 5, 1), (1, 5, 4), (3, 4, 5)],
        false,
        true,
    );
    let mut bc = Betweenness::new(&g, edge_config()).unwrap();
    bc.run().unwrap();
    let (nodes, edges) = brute_force(&g);
    for (v, expected) in nodes.iter().enumerate() {
        assert!(close(bc.score(v).unwrap(), *expected), "node {v}");
    }
    let edge_scores = bc.edge_scores().unwrap();
    for (id, expected) in edges {
        assert!(close(edge_scores[id], expected), "edge {id}");
    }
}

#[cfg(feature = "petgraph")]
#[test]
fn petgraph_path_graph() {
    let mut pg: petgraph::graph::UnGraph<(), ()> = petgraph::graph::UnGraph::new_undirected();
    let ids: Vec<_> = (0..5).map(|_| pg.add_node(())).collect();
    for w in ids.windows(2) {
        pg.add_edge(w[0], w[1], ());
    }
    let mut bc = Betweenness::new(&pg, edge_config()).unwrap();
    bc.run().unwrap();
    assert_eq!(bc.scores(false).unwrap(), vec![0.0, 3.0, 4.0, 3.0, 0.0]);
    assert_eq!(bc.edge_scores().unwrap(), vec![4.0, 6.0, 6.0, 4.0]);
}

fn graph_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize, u8)>, bool)> {
    (
        2usize..10,
        prop::collection::vec((0usize..10, 0usize..10, 1u8..5), 0..24),
        any::<bool>(),
    )
}

proptest! {
    // Node and edge scores agree with explicit path enumeration.
    #[test]
    fn prop_matches_path_enumeration((n, pairs, directed) in graph_strategy(), weighted in any::<bool>()) {
        let g = build(n, &pairs, directed, weighted);
        let mut bc = Betweenness::new(&g, edge_config()).unwrap();
        bc.run().unwrap();
        let (nodes, edges) = brute_force(&g);
        let scores = bc.scores(false).unwrap();
        for v in 0..n {
            prop_assert!(close(scores[v], nodes[v]), "node {}: {} vs {}", v, scores[v], nodes[v]);
        }
        let edge_scores = bc.edge_scores().unwrap();
        for (id, expected) in edges {
            prop_assert!(close(edge_scores[id], expected), "edge {}", id);
        }
    }

    // Every shortest path has one more edge than interior nodes, so the totals differ
    // by the number of connected pairs.
    #[test]
    fn prop_edge_total_exceeds_node_total_by_pairs((n, pairs, directed) in graph_strategy()) {
        let g = build(n, &pairs, directed, false);
        let mut bc = Betweenness::new(&g, edge_config()).unwrap();
        bc.run().unwrap();
        let node_total: f64 = bc.scores(false).unwrap().iter().sum();
        let edge_total: f64 = bc.edge_scores().unwrap().iter().sum();

        let mut sssp = strategy_for(&g);
        let mut reachable = 0usize;
        for s in 0..n {
            sssp.set_source(s);
            sssp.run(&g);
            reachable += (0..n).filter(|&t| t != s && sssp.distance(t).is_finite()).count();
        }
        let pairs = if directed { reachable as f64 } else { reachable as f64 / 2.0 };
        prop_assert!(close(edge_total - node_total, pairs), "{} - {} vs {}", edge_total, node_total, pairs);
    }

    #[test]
    fn prop_thread_count_does_not_change_scores((n, pairs, directed) in graph_strategy(), weighted in any::<bool>()) {
        let g = build(n, &pairs, directed, weighted);
        let single = BetweennessConfig { compute_edge_centrality: true, num_threads: Some(1), ..Default::default() };
        let many = BetweennessConfig { num_threads: Some(4), ..single };

        let mut a = Betweenness::new(&g, single).unwrap();
        let mut b = Betweenness::new(&g, many).unwrap();
        a.run().unwrap();
        b.run().unwrap();
        let compared = [
            (a.scores(false).unwrap(), b.scores(false).unwrap()),
            (a.edge_scores().unwrap(), b.edge_scores().unwrap()),
            (a.length_scale_scores(false).unwrap(), b.length_scale_scores(false).unwrap()),
        ];
        for (x, y) in &compared {
            prop_assert_eq!(x.len(), y.len());
            for (p, q) in x.iter().zip(y) {
                prop_assert!(close(*p, *q), "{} vs {}", p, q);
            }
        }
    }

    #[test]
    fn prop_normalization_divides_by_pair_count((n, pairs, directed) in graph_strategy()) {
        let g = build(n, &pairs, directed, false);
        let mut raw = Betweenness::new(&g, BetweennessConfig::default()).unwrap();
        let mut normalized = Betweenness::new(&g, BetweennessConfig { normalized: true, ..Default::default() }).unwrap();
        raw.run().unwrap();
        normalized.run().unwrap();
        prop_assert_eq!(normalized.maximum().unwrap(), 1.0);

        let nf = n as f64;
        let mut divisor = (nf - 1.0) * (nf - 2.0);
        if !directed {
            divisor /= 2.0;
        }
        for v in 0..n {
            let r = raw.score(v).unwrap();
            let expected = if divisor > 0.0 { r / divisor } else { r };
            prop_assert!(close(normalized.score(v).unwrap(), expected));
            if n > 2 {
                prop_assert!(r <= raw.maximum().unwrap() + 1e-9);
            }
        }
    }
}
