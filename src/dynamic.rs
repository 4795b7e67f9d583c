//! Single-source shortest paths kept valid across graph edits.
//!
//! [`DynamicSssp`] owns one [`ShortestPathTree`]. After [`DynamicSssp::run`] builds it,
//! [`DynamicSssp::update`] repairs it for a batch of [`GraphEvent`]s, touching only nodes
//! whose distance, predecessors or path count can change.
//!
//! Public invariants:
//! - After `update`, the tree equals a from-scratch build on the edited graph: same
//!   distances (up to [`same_distance`]), same predecessor sets, same path counts up to
//!   summation order.
//! - The graph handed to `update` already contains the batch.
//! - Predecessor lists are kept sorted by node id.
//!
//! An update runs in three passes:
//! 1. Increases. Nodes whose every predecessor was lost (edge removed, weight raised,
//!    predecessor removed or itself affected) become unreachable for now. Candidates are
//!    visited in old-distance order so a predecessor is decided before its successors.
//! 2. Relaxation. A Dijkstra-style wavefront ([`Frontier`]) starts from the affected nodes'
//!    best surviving in-neighbors and from the tails of added or lightened edges.
//! 3. Recount. Predecessors and path counts are recomputed over the touched region in
//!    increasing distance; changes spread to shortest-path successors.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use ordered_float::OrderedFloat;
use tracing::debug;

use crate::graph::{Graph, GraphEvent};
use crate::path_count::PathCount;
use crate::sssp::{same_distance, ShortestPathTree};
use crate::{Error, Result};

/// Per-node state of the current update; every node starts `Unaffected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    #[default]
    Unaffected,
    /// Distance may move; waiting in the frontier.
    Tentative,
    /// Settled by the relaxation of this update.
    Finalized,
}

/// Priority structure of the relaxation wavefront.
pub trait Frontier: Default {
    /// Every edge counts as length 1, whatever its weight.
    const UNIT_LENGTHS: bool;

    fn length(weight: f64) -> f64 {
        if Self::UNIT_LENGTHS {
            1.0
        } else {
            weight
        }
    }

    fn clear(&mut self);

    fn push(&mut self, distance: f64, node: usize);

    /// Smallest distance first.
    fn pop(&mut self) -> Option<(f64, usize)>;

    fn is_empty(&self) -> bool;
}

/// BFS layers: one bucket per integer distance.
#[derive(Debug, Clone, Default)]
pub struct BucketFrontier {
    buckets: Vec<Vec<usize>>,
    cursor: usize,
    len: usize,
}

impl Frontier for BucketFrontier {
    const UNIT_LENGTHS: bool = true;

    fn clear(&mut self) {
        self.buckets.iter_mut().for_each(Vec::clear);
        self.cursor = 0;
        self.len = 0;
    }

    fn push(&mut self, distance: f64, node: usize) {
        let layer = distance as usize;
        if layer >= self.buckets.len() {
            self.buckets.resize_with(layer + 1, Vec::new);
        }
        self.buckets[layer].push(node);
        self.cursor = self.cursor.min(layer);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<(f64, usize)> {
        while self.cursor < self.buckets.len() {
            if let Some(node) = self.buckets[self.cursor].pop() {
                self.len -= 1;
                return Some((self.cursor as f64, node));
            }
            self.cursor += 1;
        }
        None
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Binary heap with lazy deletion, for weighted graphs.
#[derive(Debug, Clone, Default)]
pub struct HeapFrontier {
    heap: BinaryHeap<Reverse<(OrderedFloat<f64>, usize)>>,
}

impl Frontier for HeapFrontier {
    const UNIT_LENGTHS: bool = false;

    fn clear(&mut self) {
        self.heap.clear();
    }

    fn push(&mut self, distance: f64, node: usize) {
        self.heap.push(Reverse((OrderedFloat(distance), node)));
    }

    fn pop(&mut self) -> Option<(f64, usize)> {
        self.heap.pop().map(|Reverse((d, v))| (d.into_inner(), v))
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Dynamic BFS: unit edge lengths.
pub type DynBfs = DynamicSssp<BucketFrontier>;

/// Dynamic Dijkstra: positive edge weights.
pub type DynDijkstra = DynamicSssp<HeapFrontier>;

#[derive(Debug, Clone)]
pub struct DynamicSssp<F: Frontier> {
    tree: ShortestPathTree,
    state: Vec<NodeState>,
    frontier: F,
    // Dedup marks for the two ordered passes, cleared through `marked`.
    queued: Vec<bool>,
    marked: Vec<usize>,
    // Nodes whose state left `Unaffected`, for the reset at the next batch.
    touched: Vec<usize>,
    // Distances before this batch of every node whose distance moved.
    previous: Vec<(usize, f64)>,
    max_distance: f64,
    modified: bool,
    has_run: bool,
}

impl<F: Frontier> DynamicSssp<F> {
    pub fn new(source: usize) -> Self {
        Self {
            tree: ShortestPathTree::new(source),
            state: Vec::new(),
            frontier: F::default(),
            queued: Vec::new(),
            marked: Vec::new(),
            touched: Vec::new(),
            previous: Vec::new(),
            max_distance: 0.0,
            modified: false,
            has_run: false,
        }
    }

    pub fn source(&self) -> usize {
        self.tree.source
    }

    pub fn tree(&self) -> &ShortestPathTree {
        &self.tree
    }

    pub fn into_tree(self) -> ShortestPathTree {
        self.tree
    }

    /// Whether the last `run` or `update` changed any distance, predecessor or path count.
    pub fn modified(&self) -> bool {
        self.modified
    }

    /// Largest finite distance from the source, as of the last `run` or `update`.
    ///
    /// Reported only. Relaxation stops when the frontier runs dry, not at this distance,
    /// since an increase can push nodes past it.
    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    /// State a node ended the last update in.
    pub fn state(&self, v: usize) -> NodeState {
        self.state.get(v).copied().unwrap_or_default()
    }

    /// Build the tree from scratch.
    pub fn run<G: Graph>(&mut self, graph: &G) -> Result<()> {
        let s = self.tree.source;
        if !graph.has_node(s) {
            return Err(Error::Precondition(format!("source {s} is not in the graph")));
        }
        let n = graph.upper_node_id_bound();
        self.tree.reset(n);
        self.state.clear();
        self.state.resize(n, NodeState::Unaffected);
        self.queued.clear();
        self.queued.resize(n, false);
        self.marked.clear();
        self.touched.clear();
        self.previous.clear();

        self.tree.distances[s] = 0.0;
        self.frontier.clear();
        self.frontier.push(0.0, s);
        let mut region = Vec::new();
        self.relax(graph, &mut region);
        self.recount(graph, region);

        self.finish();
        self.modified = true;
        self.has_run = true;
        debug!(source = s, reached = self.tree.order.len(), max_distance = self.max_distance, "built shortest-path tree");
        Ok(())
    }

    pub fn update_event<G: Graph>(&mut self, graph: &G, event: GraphEvent) -> Result<()> {
        self.update(graph, &[event])
    }

    /// Repair the tree for `batch`, which `graph` already reflects.
    ///
    /// The whole batch is validated before anything changes; an inconsistent event is an
    /// [`Error::Precondition`] and leaves the tree as it was. Events may touch the same edge
    /// or node more than once: only the last event on each edge or node is checked against
    /// `graph`, and a node event also overrides earlier events on that node's edges.
    pub fn update<G: Graph>(&mut self, graph: &G, batch: &[GraphEvent]) -> Result<()> {
        if !self.has_run {
            return Err(Error::Precondition("update() called before run()".to_string()));
        }
        let directed = graph.is_directed();
        let overridden = superseded(directed, batch);
        for (event, &skip) in batch.iter().zip(&overridden) {
            self.check_ids(graph, event)?;
            if !skip {
                self.check_event(graph, event)?;
            }
        }

        let n = graph.upper_node_id_bound();
        self.tree.grow(n);
        if self.state.len() < n {
            self.state.resize(n, NodeState::Unaffected);
            self.queued.resize(n, false);
        }
        for v in self.touched.drain(..) {
            self.state[v] = NodeState::Unaffected;
        }
        self.previous.clear();
        self.modified = false;

        let mut candidates = Vec::new();
        let mut lightened = Vec::new();
        let mut removed = Vec::new();
        for event in batch {
            match *event {
                GraphEvent::NodeAddition { .. } => {}
                GraphEvent::NodeRemoval { u } => removed.push(u),
                GraphEvent::EdgeAddition { u, v, .. } => lightened.extend(arcs(directed, u, v)),
                GraphEvent::EdgeRemoval { u, v } => candidates.extend(arcs(directed, u, v).map(|(_, head)| head)),
                GraphEvent::EdgeWeightUpdate { u, v, .. } | GraphEvent::EdgeWeightIncrement { u, v, .. } => {
                    // Either direction is possible; both checks are cheap.
                    candidates.extend(arcs(directed, u, v).map(|(_, head)| head));
                    lightened.extend(arcs(directed, u, v));
                }
            }
        }

        let mut region = Vec::new();
        let affected = self.detect_increases(graph, &candidates, &removed, &mut region);
        self.seed(graph, &affected, &lightened);
        self.relax(graph, &mut region);
        let region_size = region.len();
        self.recount(graph, region);

        let d = &self.tree.distances;
        self.modified |= self.previous.iter().any(|&(v, old)| !same_distance(old, d[v]));
        if self.modified {
            self.finish();
        }
        debug!(
            events = batch.len(),
            affected = affected.len(),
            region = region_size,
            modified = self.modified,
            "applied update batch"
        );
        Ok(())
    }

    /// Checks that hold for every event, whatever follows it in the batch.
    fn check_ids<G: Graph>(&self, graph: &G, event: &GraphEvent) -> Result<()> {
        let bound = graph.upper_node_id_bound();
        let (u, v) = match *event {
            GraphEvent::NodeAddition { u } => (u, u),
            GraphEvent::NodeRemoval { u } => {
                if u == self.tree.source {
                    return Err(Error::Precondition(format!("source {u} cannot be removed")));
                }
                (u, u)
            }
            GraphEvent::EdgeAddition { u, v, .. }
            | GraphEvent::EdgeRemoval { u, v }
            | GraphEvent::EdgeWeightUpdate { u, v, .. }
            | GraphEvent::EdgeWeightIncrement { u, v, .. } => (u, v),
        };
        match [u, v].into_iter().find(|&x| x >= bound) {
            Some(x) => Err(Error::Precondition(format!("event names node {x} beyond id bound {bound}"))),
            None => Ok(()),
        }
    }

    /// The final graph must agree with `event`, the last one on its edge or node.
    fn check_event<G: Graph>(&self, graph: &G, event: &GraphEvent) -> Result<()> {
        let edge_weight = |u: usize, v: usize| -> Result<f64> {
            let w = graph
                .weight(u, v)
                .ok_or_else(|| Error::Precondition(format!("edge ({u}, {v}) is not in the graph")))?;
            if F::UNIT_LENGTHS && w != 1.0 {
                return Err(Error::Precondition(format!("BFS tree cannot take weight {w} on ({u}, {v})")));
            }
            Ok(w)
        };

        match *event {
            GraphEvent::NodeAddition { u } => {
                if !graph.has_node(u) {
                    return Err(Error::Precondition(format!("added node {u} is not in the graph")));
                }
            }
            GraphEvent::NodeRemoval { u } => {
                if graph.has_node(u) {
                    return Err(Error::Precondition(format!("removed node {u} is still in the graph")));
                }
            }
            GraphEvent::EdgeAddition { u, v, w } | GraphEvent::EdgeWeightUpdate { u, v, w } => {
                let actual = edge_weight(u, v)?;
                if graph.is_weighted() && !same_distance(actual, w) {
                    return Err(Error::Precondition(format!(
                        "edge ({u}, {v}) has weight {actual}, event says {w}"
                    )));
                }
            }
            GraphEvent::EdgeWeightIncrement { u, v, .. } => {
                edge_weight(u, v)?;
            }
            GraphEvent::EdgeRemoval { u, v } => {
                if graph.has_edge(u, v) {
                    return Err(Error::Precondition(format!("removed edge ({u}, {v}) is still in the graph")));
                }
            }
        }
        Ok(())
    }

    /// Pass 1. Returns the nodes that lost every shortest path; their distance is now infinite.
    fn detect_increases<G: Graph>(
        &mut self,
        graph: &G,
        candidates: &[usize],
        removed: &[usize],
        region: &mut Vec<usize>,
    ) -> Vec<usize> {
        let mut heap = BinaryHeap::new();
        let mut affected = Vec::new();

        for &u in removed {
            if !self.tree.distances[u].is_finite() {
                continue;
            }
            // The graph no longer lists u's edges, so find its successors by their predecessor lists.
            for w in 0..self.tree.predecessors.len() {
                if self.tree.predecessors[w].contains(&u) {
                    self.enqueue(&mut heap, w);
                }
            }
            self.mark_affected(u);
            affected.push(u);
            region.push(u);
        }
        for &v in candidates {
            self.enqueue(&mut heap, v);
        }

        let mut successors = Vec::new();
        while let Some(Reverse((_, v))) = heap.pop() {
            region.push(v);
            if v == self.tree.source || self.state[v] != NodeState::Unaffected || self.has_valid_predecessor(graph, v) {
                continue;
            }
            self.mark_affected(v);
            affected.push(v);

            successors.clear();
            graph.for_out_edges(v, |w, _| successors.push(w));
            for &w in &successors {
                if self.tree.predecessors[w].contains(&v) {
                    self.enqueue(&mut heap, w);
                }
            }
        }
        self.clear_marks();
        affected
    }

    /// Some old predecessor still reaches `v` at its old distance through an intact edge.
    fn has_valid_predecessor<G: Graph>(&self, graph: &G, v: usize) -> bool {
        let d = &self.tree.distances;
        self.tree.predecessors[v].iter().any(|&p| {
            self.state[p] == NodeState::Unaffected
                && graph.has_node(p)
                && graph.weight(p, v).is_some_and(|w| same_distance(d[p] + F::length(w), d[v]))
        })
    }

    fn enqueue(&mut self, heap: &mut BinaryHeap<Reverse<(OrderedFloat<f64>, usize)>>, v: usize) {
        let d = self.tree.distances[v];
        if self.queued[v] || !d.is_finite() {
            return;
        }
        self.queued[v] = true;
        self.marked.push(v);
        heap.push(Reverse((OrderedFloat(d), v)));
    }

    fn clear_marks(&mut self) {
        for v in self.marked.drain(..) {
            self.queued[v] = false;
        }
    }

    fn mark_affected(&mut self, v: usize) {
        self.previous.push((v, self.tree.distances[v]));
        self.tree.distances[v] = f64::INFINITY;
        self.set_state(v, NodeState::Tentative);
    }

    fn set_state(&mut self, v: usize, state: NodeState) {
        if self.state[v] == NodeState::Unaffected {
            self.touched.push(v);
        }
        self.state[v] = state;
    }

    /// Pass 2 seeds: best surviving entry into each affected node, and every lightened arc.
    fn seed<G: Graph>(&mut self, graph: &G, affected: &[usize], lightened: &[(usize, usize)]) {
        self.frontier.clear();
        for &x in affected {
            if !graph.has_node(x) {
                continue;
            }
            let (d, state) = (&self.tree.distances, &self.state);
            let mut best = f64::INFINITY;
            graph.for_in_edges(x, |u, w| {
                if state[u] == NodeState::Unaffected && d[u].is_finite() {
                    best = best.min(d[u] + F::length(w));
                }
            });
            if best.is_finite() {
                self.tree.distances[x] = best;
                self.frontier.push(best, x);
            }
        }
        for &(u, _) in lightened {
            let du = self.tree.distances[u];
            if du.is_finite() {
                self.frontier.push(du, u);
            }
        }
    }

    /// Pass 2. Settles the frontier in distance order; every settled node joins `region`,
    /// as does every node that gains an equally short path.
    fn relax<G: Graph>(&mut self, graph: &G, region: &mut Vec<usize>) {
        let mut lowered = Vec::new();
        while let Some((dv, v)) = self.frontier.pop() {
            if self.state[v] == NodeState::Finalized || (dv > self.tree.distances[v] && !same_distance(dv, self.tree.distances[v])) {
                continue;
            }
            self.set_state(v, NodeState::Finalized);
            region.push(v);

            let du = self.tree.distances[v];
            let (d, state) = (&self.tree.distances, &self.state);
            lowered.clear();
            graph.for_out_edges(v, |x, w| {
                if state[x] == NodeState::Finalized {
                    return;
                }
                let nd = du + F::length(w);
                if same_distance(nd, d[x]) {
                    region.push(x);
                } else if nd < d[x] {
                    lowered.push((x, nd));
                }
            });
            for &(x, nd) in &lowered {
                // Several arcs from v may reach x; keep the shortest.
                if nd >= self.tree.distances[x] {
                    continue;
                }
                if self.state[x] == NodeState::Unaffected {
                    self.previous.push((x, self.tree.distances[x]));
                }
                self.tree.distances[x] = nd;
                self.set_state(x, NodeState::Tentative);
                self.frontier.push(nd, x);
            }
        }
    }

    /// Pass 3. Recompute predecessors and path counts for `region` in increasing distance.
    fn recount<G: Graph>(&mut self, graph: &G, region: Vec<usize>) {
        let mut heap = BinaryHeap::new();
        for v in region {
            self.enqueue_any(&mut heap, v);
        }

        let mut scratch = Vec::new();
        let mut successors = Vec::new();
        while let Some(Reverse((_, v))) = heap.pop() {
            if !self.recount_node(graph, v, &mut scratch) {
                continue;
            }
            self.modified = true;

            let d = &self.tree.distances;
            let dv = d[v];
            successors.clear();
            graph.for_out_edges(v, |x, w| {
                if dv.is_finite() && same_distance(dv + F::length(w), d[x]) {
                    successors.push(x);
                }
            });
            // Successors that lost v were already queued by the increase pass.
            for &x in &successors {
                self.enqueue_any(&mut heap, x);
            }
        }
        self.clear_marks();
    }

    /// Like `enqueue`, but unreachable nodes are queued too (they sort last).
    fn enqueue_any(&mut self, heap: &mut BinaryHeap<Reverse<(OrderedFloat<f64>, usize)>>, v: usize) {
        if self.queued[v] {
            return;
        }
        self.queued[v] = true;
        self.marked.push(v);
        heap.push(Reverse((OrderedFloat(self.tree.distances[v]), v)));
    }

    /// Returns whether `v`'s predecessors or path count changed.
    fn recount_node<G: Graph>(&mut self, graph: &G, v: usize, preds: &mut Vec<usize>) -> bool {
        preds.clear();
        let d = &self.tree.distances;
        let dv = d[v];
        let sigma = if !graph.has_node(v) || !dv.is_finite() {
            PathCount::zero()
        } else if v == self.tree.source {
            PathCount::one()
        } else {
            graph.for_in_edges(v, |u, w| {
                if d[u].is_finite() && same_distance(d[u] + F::length(w), dv) {
                    preds.push(u);
                }
            });
            preds.sort_unstable();
            preds.dedup();
            preds.iter().map(|&u| self.tree.paths[u]).sum()
        };

        let changed = self.tree.predecessors[v] != *preds || self.tree.paths[v] != sigma;
        if changed {
            self.tree.predecessors[v].clone_from(preds);
            self.tree.paths[v] = sigma;
        }
        changed
    }

    fn finish(&mut self) {
        self.tree.rebuild_order();
        let d = &self.tree.distances;
        self.max_distance = self.tree.order.last().map_or(0.0, |&v| d[v]);
    }
}

/// For each event, whether a later event in `batch` overrides it: a later event on the same
/// edge or node, or a later node event on one of the edge's endpoints.
fn superseded(directed: bool, batch: &[GraphEvent]) -> Vec<bool> {
    let mut edges = HashSet::new();
    let mut nodes = HashSet::new();
    let mut skip = vec![false; batch.len()];
    for (i, event) in batch.iter().enumerate().rev() {
        skip[i] = match *event {
            GraphEvent::NodeAddition { u } | GraphEvent::NodeRemoval { u } => !nodes.insert(u),
            GraphEvent::EdgeAddition { u, v, .. }
            | GraphEvent::EdgeRemoval { u, v }
            | GraphEvent::EdgeWeightUpdate { u, v, .. }
            | GraphEvent::EdgeWeightIncrement { u, v, .. } => {
                let key = if directed { (u, v) } else { (u.min(v), u.max(v)) };
                !edges.insert(key) || nodes.contains(&u) || nodes.contains(&v)
            }
        };
    }
    skip
}

/// The arcs an edge `{u, v}` contributes: one if directed, both otherwise.
fn arcs(directed: bool, u: usize, v: usize) -> impl Iterator<Item = (usize, usize)> {
    std::iter::once((u, v)).chain((!directed).then_some((v, u)))
}
