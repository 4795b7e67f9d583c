//! Betweenness centrality (Brandes), parallel over sources.
//!
//! Public invariants:
//! - Output vectors are indexed by node id (edge id for edge scores), sized to the id bounds.
//! - Disconnected graphs are allowed; unreachable pairs contribute 0.
//! - Undirected graphs count every unordered pair once.
//!
//! Notes:
//! - Unweighted graphs use BFS, weighted graphs Dijkstra; one strategy instance per worker,
//!   reused across all sources that worker takes.
//! - Workers pull sources from a shared counter, so expensive sources (dense regions) do not
//!   pile up on one thread. Each worker owns its scratch buffers; the per-worker partial
//!   vectors are summed per node id after every worker has finished.
//! - Path-count ratios `σ_sp / σ_st` are narrowed to `f64` only after the division.
//! - Normalization divides node scores by `(n-1)(n-2)` and edge scores by `n(n-1)`, both
//!   halved for undirected graphs. Length-scaled scores are never normalized.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

use crate::centrality::{Centrality, CentralityScores, RunStatus};
use crate::graph::Graph;
use crate::path_count::PathCount;
use crate::signal::Cancellation;
use crate::sssp::{strategy_for, Sssp};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BetweennessConfig {
    /// Divide by the number of node pairs so scores lie in `[0, 1]`.
    pub normalized: bool,
    /// Also score edges. Requires the graph to carry edge ids.
    pub compute_edge_centrality: bool,
    /// Worker count; `None` uses the ambient rayon pool.
    pub num_threads: Option<usize>,
}

/// Betweenness centrality of every node (and optionally every edge) of a graph.
pub struct Betweenness<'g, G: Graph> {
    graph: &'g G,
    config: BetweennessConfig,
    cancellation: Cancellation,
    results: CentralityScores,
}

/// Buffers owned by one worker for the whole run.
struct Scratch<'g, G: Graph> {
    sssp: Box<dyn Sssp<G> + Send + 'g>,
    dependency: Vec<f64>,
    // Σ over shortest-path descendants t of σ_st / d(s,t), weighted by DAG path multiplicity.
    downstream: Vec<PathCount>,
    partial: Partial,
}

/// What a worker contributes to the reduction.
struct Partial {
    node_scores: Vec<f64>,
    edge_scores: Vec<f64>,
    length_scaled: Vec<f64>,
}

impl<'g, G: Graph + 'g> Scratch<'g, G> {
    fn new(graph: &G, edge_bound: usize) -> Self {
        let n = graph.upper_node_id_bound();
        Self {
            sssp: strategy_for(graph),
            dependency: vec![0.0; n],
            downstream: vec![PathCount::zero(); n],
            partial: Partial {
                node_scores: vec![0.0; n],
                edge_scores: vec![0.0; edge_bound],
                length_scaled: vec![0.0; n],
            },
        }
    }

    /// Add the dependencies of source `s`. Returns early once `signal` stops.
    fn accumulate(&mut self, graph: &G, s: usize, edge_centrality: bool, signal: &Cancellation) {
        if !signal.is_running() {
            return;
        }
        self.sssp.set_source(s);
        self.sssp.run(graph);
        if !signal.is_running() {
            return;
        }

        let tree = self.sssp.tree();
        let order = tree.nodes_sorted_by_distance();
        for &v in order {
            self.dependency[v] = 0.0;
            self.downstream[v] = PathCount::zero();
        }

        for &t in order.iter().rev() {
            let sigma_t = tree.number_of_paths(t);
            let weight = 1.0 + self.dependency[t];
            let through_t = if t == s {
                PathCount::zero()
            } else {
                sigma_t.scaled(1.0 / tree.distance(t)) + self.downstream[t]
            };

            for &p in tree.predecessors(t) {
                let c = tree.number_of_paths(p).ratio(&sigma_t) * weight;
                self.dependency[p] += c;
                if edge_centrality {
                    if let Some(slot) = graph.edge_id(p, t).and_then(|e| self.partial.edge_scores.get_mut(e)) {
                        *slot += c;
                    }
                }
                self.downstream[p] += through_t;
            }

            if t != s {
                self.partial.node_scores[t] += self.dependency[t];
                // Every shortest path s -> .. -> t -> .. -> x passes t as an interior node.
                self.partial.length_scaled[t] += (sigma_t * self.downstream[t]).to_f64();
            }
        }
    }
}

impl<'g, G: Graph + Sync + 'g> Betweenness<'g, G> {
    /// Fails with [`Error::Configuration`] when edge scores are requested on a graph
    /// without edge ids.
    pub fn new(graph: &'g G, config: BetweennessConfig) -> Result<Self> {
        if config.compute_edge_centrality && !graph.has_edge_ids() {
            return Err(Error::Configuration(
                "edge centrality requires edge ids; index the graph's edges first".to_string(),
            ));
        }
        if config.num_threads == Some(0) {
            return Err(Error::InvalidParameter("num_threads must be at least 1".to_string()));
        }
        Ok(Self {
            graph,
            config,
            cancellation: Cancellation::new(),
            results: CentralityScores::new(config.normalized, config.compute_edge_centrality),
        })
    }

    /// Poll `cancellation` before each source and once more after its shortest-path search.
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    pub fn config(&self) -> &BetweennessConfig {
        &self.config
    }

    pub fn graph(&self) -> &'g G {
        self.graph
    }

    /// Compute all scores. A cancelled run returns `RunStatus::Cancelled` and leaves the
    /// store not-run; previous results are discarded either way.
    pub fn run(&mut self) -> Result<RunStatus> {
        self.results.invalidate();
        match self.config.num_threads {
            #[cfg(feature = "parallel")]
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| Error::ThreadPool(e.to_string()))?;
                pool.install(|| self.run_inner())
            }
            _ => self.run_inner(),
        }
    }

    fn run_inner(&mut self) -> Result<RunStatus> {
        let graph = self.graph;
        let z = graph.upper_node_id_bound();
        let edge_bound = if self.config.compute_edge_centrality { graph.upper_edge_id_bound() } else { 0 };
        let sources = graph.nodes();

        let parts = self.accumulate_sources(&sources, edge_bound);
        if !self.cancellation.is_running() {
            warn!(sources = sources.len(), "betweenness run cancelled; partial scores dropped");
            return Ok(RunStatus::Cancelled);
        }

        debug!(workers = parts.len(), "adding per-worker scores");
        let mut scores = reduce(&parts, z, |p| p.node_scores.as_slice());
        let mut edge_scores = reduce(&parts, edge_bound, |p| p.edge_scores.as_slice());
        let length_scaled = reduce(&parts, z, |p| p.length_scaled.as_slice());

        if !graph.is_directed() {
            // Each unordered pair was reached from both of its endpoints.
            scores.iter_mut().chain(edge_scores.iter_mut()).for_each(|x| *x /= 2.0);
        }

        if self.config.normalized {
            let n = sources.len() as f64;
            let mut pairs = (n - 1.0) * (n - 2.0);
            let mut edge_pairs = n * (n - 1.0);
            if !graph.is_directed() {
                pairs /= 2.0;
                edge_pairs /= 2.0;
            }
            if pairs > 0.0 {
                scores.iter_mut().for_each(|x| *x /= pairs);
            }
            if edge_pairs > 0.0 {
                edge_scores.iter_mut().for_each(|x| *x /= edge_pairs);
            }
        }

        self.results.complete(sources, scores, edge_scores, length_scaled);
        Ok(RunStatus::Completed)
    }

    #[cfg(feature = "parallel")]
    fn accumulate_sources(&self, sources: &[usize], edge_bound: usize) -> Vec<Partial> {
        use rayon::prelude::*;

        let workers = rayon::current_num_threads().clamp(1, sources.len().max(1));
        debug!(
            workers,
            node_bound = self.graph.upper_node_id_bound(),
            edge_bound,
            "allocating per-worker scratch"
        );
        let mut slots: Vec<Scratch<'g, G>> = (0..workers).map(|_| Scratch::new(self.graph, edge_bound)).collect();

        let graph = self.graph;
        let signal = &self.cancellation;
        let edges = self.config.compute_edge_centrality;
        let next = AtomicUsize::new(0);
        slots.par_iter_mut().for_each(|slot| {
            while signal.is_running() {
                let Some(&s) = sources.get(next.fetch_add(1, Ordering::Relaxed)) else {
                    break;
                };
                slot.accumulate(graph, s, edges, signal);
            }
        });

        slots.into_iter().map(|slot| slot.partial).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn accumulate_sources(&self, sources: &[usize], edge_bound: usize) -> Vec<Partial> {
        debug!(node_bound = self.graph.upper_node_id_bound(), edge_bound, "allocating scratch");
        let mut slot = Scratch::new(self.graph, edge_bound);
        let next = AtomicUsize::new(0);
        while self.cancellation.is_running() {
            let Some(&s) = sources.get(next.fetch_add(1, Ordering::Relaxed)) else {
                break;
            };
            slot.accumulate(self.graph, s, self.config.compute_edge_centrality, &self.cancellation);
        }
        vec![slot.partial]
    }
}

/// Sum one vector across all workers, slot by slot.
fn reduce<F>(parts: &[Partial], len: usize, pick: F) -> Vec<f64>
where
    F: Fn(&Partial) -> &[f64] + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..len).into_par_iter().map(|i| parts.iter().map(|p| pick(p)[i]).sum()).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..len).map(|i| parts.iter().map(|p| pick(p)[i]).sum()).collect()
    }
}

impl<'g, G: Graph + Sync + 'g> Centrality for Betweenness<'g, G> {
    fn run(&mut self) -> Result<RunStatus> {
        Betweenness::run(self)
    }

    fn results(&self) -> &CentralityScores {
        &self.results
    }

    fn results_mut(&mut self) -> &mut CentralityScores {
        &mut self.results
    }

    /// 1 when normalized, otherwise the number of (ordered, for directed graphs) pairs of
    /// other nodes: `(n-1)(n-2)`, halved for undirected graphs.
    fn maximum(&self) -> Result<f64> {
        if self.config.normalized {
            return Ok(1.0);
        }
        let n = self.graph.number_of_nodes() as f64;
        if n < 3.0 {
            return Ok(0.0);
        }
        let pairs = (n - 1.0) * (n - 2.0);
        Ok(if self.graph.is_directed() { pairs } else { pairs / 2.0 })
    }
}
