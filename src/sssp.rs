//! Single-source shortest paths with path counting.
//!
//! Both strategies record, for one source: distances, shortest-path counts, predecessor
//! lists, and the order in which nodes were settled. That is everything Brandes'
//! backward pass needs, and it is also the state [`crate::dynamic`] keeps up to date.
//!
//! Notes:
//! - `Bfs` ignores weights (every edge has length 1); `Dijkstra` requires positive weights.
//! - Two distances are "the same" when they agree up to [`DISTANCE_REL_TOL`]; static and
//!   dynamic code share [`same_distance`] so they agree on predecessor sets.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use ordered_float::OrderedFloat;

use crate::graph::Graph;
use crate::path_count::PathCount;

pub const DISTANCE_REL_TOL: f64 = 1e-12;

pub fn same_distance(a: f64, b: f64) -> bool {
    if !a.is_finite() || !b.is_finite() {
        return a == b;
    }
    (a - b).abs() <= DISTANCE_REL_TOL * a.abs().max(b.abs()).max(1.0)
}

/// Shortest-path DAG rooted at one source.
#[derive(Debug, Clone)]
pub struct ShortestPathTree {
    pub(crate) source: usize,
    pub(crate) distances: Vec<f64>,
    pub(crate) paths: Vec<PathCount>,
    pub(crate) predecessors: Vec<Vec<usize>>,
    pub(crate) order: Vec<usize>,
}

impl ShortestPathTree {
    pub fn new(source: usize) -> Self {
        Self {
            source,
            distances: Vec::new(),
            paths: Vec::new(),
            predecessors: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Size every per-node vector to `n` and clear it, keeping allocations.
    pub(crate) fn reset(&mut self, n: usize) {
        self.distances.clear();
        self.distances.resize(n, f64::INFINITY);
        self.paths.clear();
        self.paths.resize(n, PathCount::zero());
        self.predecessors.truncate(n);
        for p in &mut self.predecessors {
            p.clear();
        }
        self.predecessors.resize_with(n, Vec::new);
        self.order.clear();
    }

    /// Grow per-node vectors to `n` with unreached entries. Never shrinks.
    pub(crate) fn grow(&mut self, n: usize) {
        if n > self.distances.len() {
            self.distances.resize(n, f64::INFINITY);
            self.paths.resize(n, PathCount::zero());
            self.predecessors.resize_with(n, Vec::new);
        }
    }

    pub fn source(&self) -> usize {
        self.source
    }

    pub fn upper_node_id_bound(&self) -> usize {
        self.distances.len()
    }

    /// `f64::INFINITY` when `t` is unreachable.
    pub fn distance(&self, t: usize) -> f64 {
        self.distances.get(t).copied().unwrap_or(f64::INFINITY)
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    pub fn is_reached(&self, t: usize) -> bool {
        self.distance(t).is_finite()
    }

    pub fn number_of_paths(&self, v: usize) -> PathCount {
        self.paths.get(v).copied().unwrap_or_default()
    }

    pub fn predecessors(&self, t: usize) -> &[usize] {
        self.predecessors.get(t).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reached nodes by non-decreasing distance; the source comes first.
    ///
    /// Iterate in reverse for the non-increasing order of the dependency pass.
    pub fn nodes_sorted_by_distance(&self) -> &[usize] {
        &self.order
    }

    /// Every shortest path from the source to `t`, each listed source first.
    ///
    /// The result has [`number_of_paths`](Self::number_of_paths) entries, which can be
    /// exponential in the graph size.
    pub fn paths(&self, t: usize) -> Vec<Vec<usize>> {
        if !self.is_reached(t) {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut stack = vec![vec![t]];
        while let Some(mut partial) = stack.pop() {
            let Some(&head) = partial.last() else { continue };
            if head == self.source {
                partial.reverse();
                out.push(partial);
                continue;
            }
            for &p in self.predecessors(head) {
                let mut next = partial.clone();
                next.push(p);
                stack.push(next);
            }
        }
        out
    }

    /// Rebuild the settle order from distances (ties by node id).
    pub(crate) fn rebuild_order(&mut self) {
        self.order.clear();
        self.order.extend((0..self.distances.len()).filter(|&v| self.distances[v].is_finite()));
        let dist = &self.distances;
        self.order.sort_by(|&a, &b| OrderedFloat(dist[a]).cmp(&OrderedFloat(dist[b])).then(a.cmp(&b)));
    }
}

/// Capability interface of a shortest-path strategy.
///
/// An instance is reused across sources: `set_source` then `run`.
pub trait Sssp<G: Graph> {
    fn set_source(&mut self, source: usize);

    fn run(&mut self, graph: &G);

    fn tree(&self) -> &ShortestPathTree;

    fn distance(&self, t: usize) -> f64 {
        self.tree().distance(t)
    }

    fn number_of_paths(&self, v: usize) -> PathCount {
        self.tree().number_of_paths(v)
    }

    fn predecessors(&self, t: usize) -> &[usize] {
        self.tree().predecessors(t)
    }

    fn nodes_sorted_by_distance(&self) -> &[usize] {
        self.tree().nodes_sorted_by_distance()
    }

    fn paths(&self, t: usize) -> Vec<Vec<usize>> {
        self.tree().paths(t)
    }
}

/// Pick Dijkstra for weighted graphs and BFS otherwise.
pub fn strategy_for<'g, G: Graph + 'g>(graph: &G) -> Box<dyn Sssp<G> + Send + 'g> {
    if graph.is_weighted() {
        Box::new(Dijkstra::new(0))
    } else {
        Box::new(Bfs::new(0))
    }
}

/// Breadth-first search; every edge has length 1.
#[derive(Debug, Clone)]
pub struct Bfs {
    tree: ShortestPathTree,
    queue: VecDeque<usize>,
}

impl Bfs {
    pub fn new(source: usize) -> Self {
        Self { tree: ShortestPathTree::new(source), queue: VecDeque::new() }
    }

    pub fn into_tree(self) -> ShortestPathTree {
        self.tree
    }
}

impl<G: Graph> Sssp<G> for Bfs {
    fn set_source(&mut self, source: usize) {
        self.tree.source = source;
    }

    fn run(&mut self, graph: &G) {
        let s = self.tree.source;
        self.tree.reset(graph.upper_node_id_bound());
        if !graph.has_node(s) {
            return;
        }
        let ShortestPathTree { distances, paths, predecessors, order, .. } = &mut self.tree;
        let queue = &mut self.queue;
        queue.clear();

        distances[s] = 0.0;
        paths[s] = PathCount::one();
        queue.push_back(s);

        while let Some(u) = queue.pop_front() {
            order.push(u);
            let next = distances[u] + 1.0;
            let pu = paths[u];
            graph.for_out_edges(u, |v, _| {
                if distances[v].is_infinite() {
                    distances[v] = next;
                    queue.push_back(v);
                }
                if distances[v] == next {
                    paths[v] += pu;
                    predecessors[v].push(u);
                }
            });
        }
    }

    fn tree(&self) -> &ShortestPathTree {
        &self.tree
    }
}

/// Dijkstra's algorithm with a lazy-deletion binary heap.
#[derive(Debug, Clone)]
pub struct Dijkstra {
    tree: ShortestPathTree,
    heap: BinaryHeap<Reverse<(OrderedFloat<f64>, usize)>>,
    settled: Vec<bool>,
}

impl Dijkstra {
    pub fn new(source: usize) -> Self {
        Self { tree: ShortestPathTree::new(source), heap: BinaryHeap::new(), settled: Vec::new() }
    }

    pub fn into_tree(self) -> ShortestPathTree {
        self.tree
    }
}

impl<G: Graph> Sssp<G> for Dijkstra {
    fn set_source(&mut self, source: usize) {
        self.tree.source = source;
    }

    fn run(&mut self, graph: &G) {
        let n = graph.upper_node_id_bound();
        let s = self.tree.source;
        self.tree.reset(n);
        self.settled.clear();
        self.settled.resize(n, false);
        self.heap.clear();
        if !graph.has_node(s) {
            return;
        }
        let ShortestPathTree { distances, paths, predecessors, order, .. } = &mut self.tree;
        let settled = &mut self.settled;
        let heap = &mut self.heap;

        distances[s] = 0.0;
        paths[s] = PathCount::one();
        heap.push(Reverse((OrderedFloat(0.0), s)));

        while let Some(Reverse((_, u))) = heap.pop() {
            if settled[u] {
                continue;
            }
            settled[u] = true;
            order.push(u);
            let du = distances[u];
            let pu = paths[u];
            graph.for_out_edges(u, |v, w| {
                if settled[v] {
                    return;
                }
                let nd = du + w;
                if same_distance(nd, distances[v]) {
                    paths[v] += pu;
                    predecessors[v].push(u);
                } else if nd < distances[v] {
                    distances[v] = nd;
                    paths[v] = pu;
                    predecessors[v].clear();
                    predecessors[v].push(u);
                    heap.push(Reverse((OrderedFloat(nd), v)));
                }
            });
        }
    }

    fn tree(&self) -> &ShortestPathTree {
        &self.tree
    }
}
