//! Graph adapter trait and an in-tree adjacency-list graph.
//!
//! Algorithms in this crate only talk to [`Graph`]; [`AdjacencyGraph`] is the mutable
//! implementation used by callers that need edits (dynamic shortest paths) or edge ids.
//!
//! Public invariants:
//! - Node ids are dense `0..upper_node_id_bound()`, possibly with holes left by removals.
//! - Undirected graphs report every edge from both endpoints, with the same edge id.
//! - Unweighted graphs report weight `1.0` for every edge.

use crate::{Error, Result};

pub trait Graph {
    /// One past the largest node id that may exist.
    fn upper_node_id_bound(&self) -> usize;

    fn has_node(&self, node: usize) -> bool {
        node < self.upper_node_id_bound()
    }

    fn number_of_nodes(&self) -> usize {
        (0..self.upper_node_id_bound()).filter(|&u| self.has_node(u)).count()
    }

    /// Present node ids in ascending order.
    fn nodes(&self) -> Vec<usize> {
        (0..self.upper_node_id_bound()).filter(|&u| self.has_node(u)).collect()
    }

    fn is_directed(&self) -> bool;

    fn is_weighted(&self) -> bool {
        false
    }

    /// Call `f(target, weight)` for every edge leaving `node`.
    fn for_out_edges<F: FnMut(usize, f64)>(&self, node: usize, f: F);

    /// Call `f(source, weight)` for every edge entering `node`.
    fn for_in_edges<F: FnMut(usize, f64)>(&self, node: usize, f: F);

    fn weight(&self, u: usize, v: usize) -> Option<f64> {
        let mut found = None;
        self.for_out_edges(u, |x, w| {
            if x == v && found.is_none() {
                found = Some(w);
            }
        });
        found
    }

    fn has_edge(&self, u: usize, v: usize) -> bool {
        self.weight(u, v).is_some()
    }

    fn has_edge_ids(&self) -> bool {
        false
    }

    fn upper_edge_id_bound(&self) -> usize {
        0
    }

    fn edge_id(&self, _u: usize, _v: usize) -> Option<usize> {
        None
    }
}

/// A single graph edit, in the order the caller applied it.
///
/// Weight fields carry the new weight, except for `EdgeWeightIncrement` where `w` is the delta.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GraphEvent {
    NodeAddition { u: usize },
    NodeRemoval { u: usize },
    EdgeAddition { u: usize, v: usize, w: f64 },
    EdgeRemoval { u: usize, v: usize },
    EdgeWeightUpdate { u: usize, v: usize, w: f64 },
    EdgeWeightIncrement { u: usize, v: usize, w: f64 },
}

#[derive(Debug, Clone, Copy)]
struct Adjacent {
    node: usize,
    weight: f64,
    id: usize,
}

const UNINDEXED: usize = usize::MAX;

/// Adjacency-list graph with stable node ids and optional edge ids.
///
/// Edge ids are assigned by [`AdjacencyGraph::index_edges`]; edges added afterwards receive
/// fresh ids, and ids of removed edges are not reused.
#[derive(Debug, Clone)]
pub struct AdjacencyGraph {
    directed: bool,
    weighted: bool,
    exists: Vec<bool>,
    out_adj: Vec<Vec<Adjacent>>,
    // Only populated for directed graphs.
    in_adj: Vec<Vec<Adjacent>>,
    edges_indexed: bool,
    next_edge_id: usize,
    edge_count: usize,
}

impl AdjacencyGraph {
    pub fn new(n: usize, directed: bool, weighted: bool) -> Self {
        Self {
            directed,
            weighted,
            exists: vec![true; n],
            out_adj: vec![Vec::new(); n],
            in_adj: if directed { vec![Vec::new(); n] } else { Vec::new() },
            edges_indexed: false,
            next_edge_id: 0,
            edge_count: 0,
        }
    }

    /// Unweighted graph from `(u, v)` pairs.
    pub fn from_edges(n: usize, directed: bool, edges: &[(usize, usize)]) -> Result<Self> {
        let mut g = Self::new(n, directed, false);
        for &(u, v) in edges {
            g.add_edge(u, v, 1.0)?;
        }
        Ok(g)
    }

    /// Weighted graph from `(u, v, w)` triples.
    pub fn from_weighted_edges(n: usize, directed: bool, edges: &[(usize, usize, f64)]) -> Result<Self> {
        let mut g = Self::new(n, directed, true);
        for &(u, v, w) in edges {
            g.add_edge(u, v, w)?;
        }
        Ok(g)
    }

    pub fn number_of_edges(&self) -> usize {
        self.edge_count
    }

    /// Append a new node and return its id.
    pub fn add_node(&mut self) -> usize {
        let u = self.exists.len();
        self.exists.push(true);
        self.out_adj.push(Vec::new());
        if self.directed {
            self.in_adj.push(Vec::new());
        }
        u
    }

    /// Bring back a previously removed id, with no edges.
    pub fn restore_node(&mut self, u: usize) -> Result<()> {
        match self.exists.get(u) {
            None => Err(Error::NodeOutOfBounds(u, self.exists.len())),
            Some(true) => Err(Error::InvalidParameter(format!("node {u} already exists"))),
            Some(false) => {
                self.exists[u] = true;
                Ok(())
            }
        }
    }

    /// Remove `u` together with all incident edges. The id stays reserved.
    pub fn remove_node(&mut self, u: usize) -> Result<()> {
        self.check_node(u)?;
        let outs: Vec<usize> = self.out_adj[u].iter().map(|a| a.node).collect();
        for v in outs {
            self.remove_edge(u, v)?;
        }
        if self.directed {
            let ins: Vec<usize> = self.in_adj[u].iter().map(|a| a.node).collect();
            for v in ins {
                self.remove_edge(v, u)?;
            }
        }
        self.exists[u] = false;
        Ok(())
    }

    pub fn add_edge(&mut self, u: usize, v: usize, w: f64) -> Result<()> {
        self.check_node(u)?;
        self.check_node(v)?;
        if u == v {
            return Err(Error::InvalidParameter(format!("self loop on node {u}")));
        }
        if self.has_edge(u, v) {
            return Err(Error::InvalidParameter(format!("edge ({u}, {v}) already exists")));
        }
        let weight = self.checked_weight(w)?;
        let id = if self.edges_indexed {
            self.next_edge_id += 1;
            self.next_edge_id - 1
        } else {
            UNINDEXED
        };
        self.out_adj[u].push(Adjacent { node: v, weight, id });
        if self.directed {
            self.in_adj[v].push(Adjacent { node: u, weight, id });
        } else {
            self.out_adj[v].push(Adjacent { node: u, weight, id });
        }
        self.edge_count += 1;
        Ok(())
    }

    pub fn remove_edge(&mut self, u: usize, v: usize) -> Result<()> {
        self.check_node(u)?;
        self.check_node(v)?;
        let pos = self.out_adj[u]
            .iter()
            .position(|a| a.node == v)
            .ok_or_else(|| Error::InvalidParameter(format!("edge ({u}, {v}) does not exist")))?;
        self.out_adj[u].swap_remove(pos);
        let back = if self.directed { &mut self.in_adj[v] } else { &mut self.out_adj[v] };
        if let Some(pos) = back.iter().position(|a| a.node == u) {
            back.swap_remove(pos);
        }
        self.edge_count -= 1;
        Ok(())
    }

    pub fn set_weight(&mut self, u: usize, v: usize, w: f64) -> Result<()> {
        self.check_node(u)?;
        self.check_node(v)?;
        let weight = self.checked_weight(w)?;
        let mut found = false;
        for a in self.out_adj[u].iter_mut().filter(|a| a.node == v) {
            a.weight = weight;
            found = true;
        }
        if !found {
            return Err(Error::InvalidParameter(format!("edge ({u}, {v}) does not exist")));
        }
        let back = if self.directed { &mut self.in_adj[v] } else { &mut self.out_adj[v] };
        for a in back.iter_mut().filter(|a| a.node == u) {
            a.weight = weight;
        }
        Ok(())
    }

    pub fn increase_weight(&mut self, u: usize, v: usize, delta: f64) -> Result<()> {
        let w = self
            .weight(u, v)
            .ok_or_else(|| Error::InvalidParameter(format!("edge ({u}, {v}) does not exist")))?;
        self.set_weight(u, v, w + delta)
    }

    /// Assign edge ids `0..number_of_edges()`. Idempotent.
    pub fn index_edges(&mut self) {
        if self.edges_indexed {
            return;
        }
        let mut next = 0;
        for u in 0..self.out_adj.len() {
            for i in 0..self.out_adj[u].len() {
                let v = self.out_adj[u][i].node;
                // Undirected edges are stored twice; the smaller endpoint names both copies.
                if !self.directed && v < u {
                    continue;
                }
                self.out_adj[u][i].id = next;
                let back = if self.directed { &mut self.in_adj[v] } else { &mut self.out_adj[v] };
                for a in back.iter_mut().filter(|a| a.node == u) {
                    a.id = next;
                }
                next += 1;
            }
        }
        self.next_edge_id = next;
        self.edges_indexed = true;
    }

    /// Apply one edit. This is the mutation side of [`GraphEvent`].
    pub fn apply(&mut self, event: &GraphEvent) -> Result<()> {
        match *event {
            GraphEvent::NodeAddition { u } => {
                if u == self.exists.len() {
                    self.add_node();
                    Ok(())
                } else {
                    self.restore_node(u)
                }
            }
            GraphEvent::NodeRemoval { u } => self.remove_node(u),
            GraphEvent::EdgeAddition { u, v, w } => self.add_edge(u, v, w),
            GraphEvent::EdgeRemoval { u, v } => self.remove_edge(u, v),
            GraphEvent::EdgeWeightUpdate { u, v, w } => self.set_weight(u, v, w),
            GraphEvent::EdgeWeightIncrement { u, v, w } => self.increase_weight(u, v, w),
        }
    }

    pub fn apply_all(&mut self, batch: &[GraphEvent]) -> Result<()> {
        batch.iter().try_for_each(|e| self.apply(e))
    }

    fn check_node(&self, u: usize) -> Result<()> {
        if u >= self.exists.len() {
            return Err(Error::NodeOutOfBounds(u, self.exists.len()));
        }
        if !self.exists[u] {
            return Err(Error::InvalidParameter(format!("node {u} was removed")));
        }
        Ok(())
    }

    fn checked_weight(&self, w: f64) -> Result<f64> {
        if !self.weighted {
            return Ok(1.0);
        }
        if !w.is_finite() || w <= 0.0 {
            return Err(Error::InvalidWeight(w));
        }
        Ok(w)
    }
}

impl Graph for AdjacencyGraph {
    fn upper_node_id_bound(&self) -> usize {
        self.exists.len()
    }

    fn has_node(&self, node: usize) -> bool {
        self.exists.get(node).copied().unwrap_or(false)
    }

    fn is_directed(&self) -> bool {
        self.directed
    }

    fn is_weighted(&self) -> bool {
        self.weighted
    }

    fn for_out_edges<F: FnMut(usize, f64)>(&self, node: usize, mut f: F) {
        if let Some(adj) = self.out_adj.get(node) {
            for a in adj {
                f(a.node, a.weight);
            }
        }
    }

    fn for_in_edges<F: FnMut(usize, f64)>(&self, node: usize, mut f: F) {
        let adj = if self.directed { self.in_adj.get(node) } else { self.out_adj.get(node) };
        if let Some(adj) = adj {
            for a in adj {
                f(a.node, a.weight);
            }
        }
    }

    fn weight(&self, u: usize, v: usize) -> Option<f64> {
        self.out_adj.get(u)?.iter().find(|a| a.node == v).map(|a| a.weight)
    }

    fn has_edge_ids(&self) -> bool {
        self.edges_indexed
    }

    fn upper_edge_id_bound(&self) -> usize {
        if self.edges_indexed {
            self.next_edge_id
        } else {
            0
        }
    }

    fn edge_id(&self, u: usize, v: usize) -> Option<usize> {
        if !self.edges_indexed {
            return None;
        }
        self.out_adj.get(u)?.iter().find(|a| a.node == v).map(|a| a.id)
    }
}

/// `petgraph` graphs are treated as unweighted; edge ids are `EdgeIndex::index()`.
///
/// Self loops are skipped. Parallel edges count as distinct shortest paths.
#[cfg(feature = "petgraph")]
impl<N, E, Ty, Ix> Graph for petgraph::Graph<N, E, Ty, Ix>
where
    Ty: petgraph::EdgeType,
    Ix: petgraph::graph::IndexType,
{
    fn upper_node_id_bound(&self) -> usize {
        self.node_count()
    }

    fn is_directed(&self) -> bool {
        Ty::is_directed()
    }

    fn for_out_edges<F: FnMut(usize, f64)>(&self, node: usize, mut f: F) {
        let a = petgraph::graph::NodeIndex::new(node);
        let nbrs = if Ty::is_directed() {
            self.neighbors_directed(a, petgraph::Direction::Outgoing)
        } else {
            self.neighbors(a)
        };
        for b in nbrs {
            if b != a {
                f(b.index(), 1.0);
            }
        }
    }

    fn for_in_edges<F: FnMut(usize, f64)>(&self, node: usize, mut f: F) {
        let a = petgraph::graph::NodeIndex::new(node);
        let nbrs = if Ty::is_directed() {
            self.neighbors_directed(a, petgraph::Direction::Incoming)
        } else {
            self.neighbors(a)
        };
        for b in nbrs {
            if b != a {
                f(b.index(), 1.0);
            }
        }
    }

    fn has_edge_ids(&self) -> bool {
        true
    }

    fn upper_edge_id_bound(&self) -> usize {
        self.edge_count()
    }

    fn edge_id(&self, u: usize, v: usize) -> Option<usize> {
        self.find_edge(petgraph::graph::NodeIndex::new(u), petgraph::graph::NodeIndex::new(v))
            .map(|e| e.index())
    }
}
