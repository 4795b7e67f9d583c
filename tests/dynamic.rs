use brandes::sssp::same_distance;
use brandes::{
    AdjacencyGraph, Bfs, BucketFrontier, Dijkstra, DynBfs, DynDijkstra, DynamicSssp, Error, Frontier, Graph,
    GraphEvent, HeapFrontier, ShortestPathTree, Sssp,
};
use proptest::prelude::*;

/// A random edit, resolved against the graph when it is applied.
#[derive(Debug, Clone)]
enum Edit {
    Add(usize, usize, u8),
    Remove(usize),
    Reweight(usize, u8),
    Bump(usize, i8),
    DropNode(usize),
    Restore(usize),
    NewNode,
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        3 => (0usize..16, 0usize..16, 1u8..6).prop_map(|(u, v, w)| Edit::Add(u, v, w)),
        3 => any::<usize>().prop_map(Edit::Remove),
        1 => (any::<usize>(), 1u8..6).prop_map(|(i, w)| Edit::Reweight(i, w)),
        1 => (any::<usize>(), -3i8..4).prop_map(|(i, d)| Edit::Bump(i, d)),
        1 => any::<usize>().prop_map(Edit::DropNode),
        1 => any::<usize>().prop_map(Edit::Restore),
        1 => Just(Edit::NewNode),
    ]
}

fn edge_list(g: &AdjacencyGraph) -> Vec<(usize, usize)> {
    let mut edges = Vec::new();
    for u in g.nodes() {
        g.for_out_edges(u, |v, _| {
            if g.is_directed() || u < v {
                edges.push((u, v));
            }
        });
    }
    edges
}

/// Apply `edits` to `g` and return the events that took effect, in order.
///
/// Later edits may touch an edge or node an earlier one already changed.
fn apply_edits(g: &mut AdjacencyGraph, edits: &[Edit], source: usize) -> Vec<GraphEvent> {
    let mut batch = Vec::new();
    for edit in edits {
        let n = g.upper_node_id_bound();
        let edges = edge_list(g);
        let pick = |i: usize| (!edges.is_empty()).then(|| edges[i % edges.len()]);
        let event = match *edit {
            Edit::Add(a, b, w) => GraphEvent::EdgeAddition { u: a % n, v: b % n, w: f64::from(w) },
            Edit::Remove(i) => match pick(i) {
                Some((u, v)) => GraphEvent::EdgeRemoval { u, v },
                None => continue,
            },
            Edit::Reweight(i, w) => match pick(i) {
                Some((u, v)) => GraphEvent::EdgeWeightUpdate { u, v, w: f64::from(w) },
                None => continue,
            },
            Edit::Bump(i, d) => match pick(i) {
                Some((u, v)) => GraphEvent::EdgeWeightIncrement { u, v, w: f64::from(d) },
                None => continue,
            },
            Edit::DropNode(a) if a % n == source => continue,
            Edit::DropNode(a) => GraphEvent::NodeRemoval { u: a % n },
            Edit::Restore(a) => GraphEvent::NodeAddition { u: a % n },
            Edit::NewNode => GraphEvent::NodeAddition { u: n },
        };
        if g.apply(&event).is_ok() {
            batch.push(event);
        }
    }
    batch
}

fn build(n: usize, pairs: &[(usize, usize, u8)], directed: bool, weighted: bool) -> AdjacencyGraph {
    let mut g = AdjacencyGraph::new(n, directed, weighted);
    for &(a, b, w) in pairs {
        let (u, v) = (a % n, b % n);
        if u != v && !g.has_edge(u, v) {
            g.add_edge(u, v, f64::from(w)).unwrap();
        }
    }
    g
}

fn fresh_tree<S: Sssp<AdjacencyGraph>>(mut s: S, g: &AdjacencyGraph) -> ShortestPathTree {
    s.run(g);
    s.tree().clone()
}

fn tree_mismatch(dynamic: &ShortestPathTree, fresh: &ShortestPathTree) -> Option<String> {
    for v in 0..fresh.upper_node_id_bound() {
        if !same_distance(dynamic.distance(v), fresh.distance(v)) {
            return Some(format!("distance of {v}: {} vs {}", dynamic.distance(v), fresh.distance(v)));
        }
        let mut expected = fresh.predecessors(v).to_vec();
        expected.sort_unstable();
        if dynamic.predecessors(v) != expected.as_slice() {
            return Some(format!("predecessors of {v}: {:?} vs {expected:?}", dynamic.predecessors(v)));
        }
        if !dynamic.number_of_paths(v).approx_eq(&fresh.number_of_paths(v), 1e-9) {
            return Some(format!(
                "paths of {v}: {} vs {}",
                dynamic.number_of_paths(v),
                fresh.number_of_paths(v)
            ));
        }
    }
    let order = dynamic.nodes_sorted_by_distance();
    let mut reached: Vec<usize> = fresh.nodes_sorted_by_distance().to_vec();
    reached.sort_unstable();
    let mut listed = order.to_vec();
    listed.sort_unstable();
    if listed != reached {
        return Some(format!("order lists {order:?}"));
    }
    if order.windows(2).any(|w| dynamic.distance(w[0]) > dynamic.distance(w[1])) {
        return Some(format!("order not sorted: {order:?}"));
    }
    None
}

/// Run `rounds` of edits, checking the repaired tree against a fresh one after each.
fn check_rounds<F, S, C>(mut g: AdjacencyGraph, rounds: &[Vec<Edit>], fresh: C) -> Result<(), TestCaseError>
where
    F: Frontier,
    S: Sssp<AdjacencyGraph>,
    C: Fn() -> S,
{
    let source = 0;
    let mut dynamic = DynamicSssp::<F>::new(source);
    dynamic.run(&g).unwrap();
    prop_assert!(tree_mismatch(dynamic.tree(), &fresh_tree(fresh(), &g)).is_none());

    for edits in rounds {
        let batch = apply_edits(&mut g, edits, source);
        let before = dynamic.tree().clone();
        dynamic.update(&g, &batch).unwrap();
        let expected = fresh_tree(fresh(), &g);
        if let Some(why) = tree_mismatch(dynamic.tree(), &expected) {
            return Err(TestCaseError::fail(format!("{why}\nbatch: {batch:?}")));
        }
        if !dynamic.modified() {
            prop_assert!(tree_mismatch(&before, &expected).is_none(), "unmodified but tree changed: {:?}", batch);
        }
    }
    Ok(())
}

#[test]
fn removing_a_node_mid_path_reroutes() {
    let mut g = AdjacencyGraph::from_edges(6, true, &[(0, 1), (1, 2), (2, 3), (0, 4), (4, 5), (5, 3)]).unwrap();
    let mut d = DynBfs::new(0);
    d.run(&g).unwrap();
    assert_eq!(d.tree().number_of_paths(3).to_f64(), 2.0);

    g.remove_node(2).unwrap();
    d.update(&g, &[GraphEvent::NodeRemoval { u: 2 }]).unwrap();
    assert_eq!(d.tree().distance(3), 3.0);
    assert_eq!(d.tree().predecessors(3), &[5]);
    assert_eq!(d.tree().number_of_paths(3).to_f64(), 1.0);
}

#[test]
fn weighted_decrease_then_increase_round_trips() {
    let mut g = AdjacencyGraph::from_weighted_edges(4, false, &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0), (0, 3, 5.0)])
        .unwrap();
    let mut d = DynDijkstra::new(0);
    d.run(&g).unwrap();
    let initial = d.tree().clone();

    g.set_weight(0, 3, 0.5).unwrap();
    d.update(&g, &[GraphEvent::EdgeWeightUpdate { u: 0, v: 3, w: 0.5 }]).unwrap();
    assert_eq!(d.tree().distance(2), 1.5);
    assert_eq!(d.tree().predecessors(2), &[3]);

    g.set_weight(0, 3, 5.0).unwrap();
    d.update(&g, &[GraphEvent::EdgeWeightUpdate { u: 0, v: 3, w: 5.0 }]).unwrap();
    assert!(tree_mismatch(d.tree(), &initial).is_none());
}

#[test]
fn batch_is_validated_before_any_change() {
    let mut g = AdjacencyGraph::from_edges(3, false, &[(0, 1), (1, 2)]).unwrap();
    let mut d = DynBfs::new(0);
    d.run(&g).unwrap();
    let before = d.tree().clone();

    g.remove_edge(1, 2).unwrap();
    let batch = [GraphEvent::EdgeRemoval { u: 1, v: 2 }, GraphEvent::EdgeAddition { u: 0, v: 2, w: 1.0 }];
    assert!(matches!(d.update(&g, &batch), Err(Error::Precondition(_))));
    assert!(tree_mismatch(d.tree(), &before).is_none());
}

fn initial_graph() -> impl Strategy<Value = (usize, Vec<(usize, usize, u8)>, bool)> {
    (
        2usize..12,
        prop::collection::vec((0usize..12, 0usize..12, 1u8..6), 0..30),
        any::<bool>(),
    )
}

fn rounds() -> impl Strategy<Value = Vec<Vec<Edit>>> {
    prop::collection::vec(prop::collection::vec(edit_strategy(), 1..8), 1..4)
}

proptest! {
    #[test]
    fn prop_dyn_bfs_matches_recompute((n, pairs, directed) in initial_graph(), rounds in rounds()) {
        let g = build(n, &pairs, directed, false);
        check_rounds::<BucketFrontier, _, _>(g, &rounds, || Bfs::new(0))?;
    }

    #[test]
    fn prop_dyn_dijkstra_matches_recompute((n, pairs, directed) in initial_graph(), rounds in rounds()) {
        let g = build(n, &pairs, directed, true);
        check_rounds::<HeapFrontier, _, _>(g, &rounds, || Dijkstra::new(0))?;
    }

    // On unit weights both frontiers build the same tree.
    #[test]
    fn prop_frontiers_agree_on_unit_weights((n, pairs, directed) in initial_graph()) {
        let g = build(n, &pairs, directed, false);
        let mut a = DynBfs::new(0);
        let mut b = DynDijkstra::new(0);
        a.run(&g).unwrap();
        b.run(&g).unwrap();
        prop_assert!(tree_mismatch(a.tree(), b.tree()).is_none());
        prop_assert_eq!(a.max_distance(), b.max_distance());
    }
}
