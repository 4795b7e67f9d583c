//! `brandes`: betweenness centrality and dynamic shortest-path trees.
//!
//! Two engines share one shortest-path data model ([`ShortestPathTree`]):
//! - [`Betweenness`] runs one SSSP per source in parallel and accumulates Brandes
//!   dependencies into node, edge, and length-scaled scores.
//! - [`DynBfs`] / [`DynDijkstra`] keep a single-source tree valid across batches of
//!   [`GraphEvent`]s without rebuilding it.
//!
//! Public invariants (must not drift):
//! - **Node order**: score vectors are indexed by node id `0..upper_node_id_bound()`.
//! - **Completion gate**: every score read fails with [`Error::NotRun`] unless the last run
//!   completed and its results were not moved out.
//! - **Determinism**: rankings are ordered by score descending, then node id ascending;
//!   scores agree across thread counts up to floating-point summation order.
//! - **Path counts**: shortest-path multiplicities never overflow ([`PathCount`]).

pub mod betweenness;
pub mod centrality;
pub mod dynamic;
pub mod graph;
pub mod path_count;
pub mod signal;
pub mod sssp;
pub mod topk;

pub use betweenness::{Betweenness, BetweennessConfig};
pub use centrality::{Centrality, CentralityScores, RunStatus};
pub use dynamic::{BucketFrontier, DynBfs, DynDijkstra, DynamicSssp, Frontier, HeapFrontier, NodeState};
pub use graph::{AdjacencyGraph, Graph, GraphEvent};
pub use path_count::PathCount;
pub use signal::Cancellation;
pub use sssp::{strategy_for, Bfs, Dijkstra, ShortestPathTree, Sssp};
pub use topk::{rank_descending, top_k};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("results are not available: run() has not completed, or they were moved out")]
    NotRun,
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("precondition violated: {0}")]
    Precondition(String),
    #[error("node {0} out of bounds (upper id bound {1})")]
    NodeOutOfBounds(usize, usize),
    #[error("edge weight must be finite and positive, got {0}")]
    InvalidWeight(f64),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("thread pool: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, Error>;
