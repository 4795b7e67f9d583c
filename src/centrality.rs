//! Centrality result store and the contract shared by centrality measures.
//!
//! Public invariant:
//! - Reads succeed only after a completed run. Moving a vector out (`move_out = true`)
//!   clears the completion flag, so a second read fails instead of returning stale data.

use tracing::info;

use crate::topk::{rank_descending, top_k};
use crate::{Error, Result};

/// How a run ended. Cancellation is not an error: the store simply stays not-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

/// Per-node, per-edge, and length-scaled scores of one run.
#[derive(Debug, Clone, Default)]
pub struct CentralityScores {
    scores: Vec<f64>,
    edge_scores: Vec<f64>,
    length_scaled: Vec<f64>,
    // Node ids present in the graph when the run completed.
    nodes: Vec<usize>,
    normalized: bool,
    edge_centrality: bool,
    has_run: bool,
}

impl CentralityScores {
    pub fn new(normalized: bool, edge_centrality: bool) -> Self {
        Self { normalized, edge_centrality, ..Self::default() }
    }

    pub fn has_run(&self) -> bool {
        self.has_run
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    pub fn computes_edge_centrality(&self) -> bool {
        self.edge_centrality
    }

    /// Install the vectors of a completed run.
    pub(crate) fn complete(
        &mut self,
        nodes: Vec<usize>,
        scores: Vec<f64>,
        edge_scores: Vec<f64>,
        length_scaled: Vec<f64>,
    ) {
        self.nodes = nodes;
        self.scores = scores;
        self.edge_scores = edge_scores;
        self.length_scaled = length_scaled;
        self.has_run = true;
    }

    pub(crate) fn invalidate(&mut self) {
        self.has_run = false;
    }

    fn assure_finished(&self) -> Result<()> {
        if self.has_run {
            Ok(())
        } else {
            Err(Error::NotRun)
        }
    }

    pub fn score(&self, v: usize) -> Result<f64> {
        self.assure_finished()?;
        self.scores.get(v).copied().ok_or(Error::NodeOutOfBounds(v, self.scores.len()))
    }

    /// `(node, score)` by score descending, ties by node id ascending.
    pub fn ranking(&self) -> Result<Vec<(usize, f64)>> {
        self.assure_finished()?;
        Ok(rank_descending(self.nodes.iter().map(|&v| (v, self.scores[v])).collect()))
    }

    /// Same ordering over the length-scaled scores.
    pub fn length_ranking(&self) -> Result<Vec<(usize, f64)>> {
        self.assure_finished()?;
        Ok(rank_descending(self.nodes.iter().map(|&v| (v, self.length_scaled[v])).collect()))
    }

    /// The first `k` entries of [`ranking`](Self::ranking).
    pub fn top_k(&self, k: usize) -> Result<Vec<(usize, f64)>> {
        self.assure_finished()?;
        Ok(top_k(self.nodes.iter().map(|&v| (v, self.scores[v])), k))
    }

    /// Node scores. With `move_out` the vector is handed over and the store becomes not-run.
    pub fn scores(&mut self, move_out: bool) -> Result<Vec<f64>> {
        self.assure_finished()?;
        if move_out {
            self.has_run = false;
            Ok(std::mem::take(&mut self.scores))
        } else {
            Ok(self.scores.clone())
        }
    }

    /// Edge scores indexed by edge id; empty unless edge centrality was requested.
    pub fn edge_scores(&self) -> Result<Vec<f64>> {
        self.assure_finished()?;
        Ok(self.edge_scores.clone())
    }

    /// Length-scaled scores. With `move_out` the store becomes not-run.
    pub fn length_scale_scores(&mut self, move_out: bool) -> Result<Vec<f64>> {
        self.assure_finished()?;
        if move_out {
            self.has_run = false;
            Ok(std::mem::take(&mut self.length_scaled))
        } else {
            Ok(self.length_scaled.clone())
        }
    }

    /// Largest observed node score (0 for an empty graph).
    pub fn center_score(&self) -> Result<f64> {
        self.assure_finished()?;
        Ok(self.nodes.iter().map(|&v| self.scores[v]).fold(0.0, f64::max))
    }

    /// `Σ (center - score(v)) / Σ (maximum - score(v))`.
    ///
    /// With one node or none both sums are zero and the result is NaN.
    pub fn centralization_with(&self, maximum: f64) -> Result<f64> {
        let center = self.center_score()?;
        info!(center, "center score");
        let (mut diff1, mut diff2) = (0.0, 0.0);
        for &v in &self.nodes {
            diff1 += center - self.scores[v];
            diff2 += maximum - self.scores[v];
        }
        Ok(diff1 / diff2)
    }
}

/// A centrality measure backed by a [`CentralityScores`] store.
///
/// Implementors provide `run` and access to their store; read accessors are shared.
/// `maximum` has no meaningful default and fails unless the measure overrides it.
pub trait Centrality {
    fn run(&mut self) -> Result<RunStatus>;

    fn results(&self) -> &CentralityScores;

    fn results_mut(&mut self) -> &mut CentralityScores;

    /// Theoretical maximum score of this measure on the current graph.
    fn maximum(&self) -> Result<f64> {
        Err(Error::NotImplemented("maximum() must be provided by the concrete centrality measure"))
    }

    fn has_run(&self) -> bool {
        self.results().has_run()
    }

    fn score(&self, v: usize) -> Result<f64> {
        self.results().score(v)
    }

    fn ranking(&self) -> Result<Vec<(usize, f64)>> {
        self.results().ranking()
    }

    fn length_ranking(&self) -> Result<Vec<(usize, f64)>> {
        self.results().length_ranking()
    }

    fn top_k(&self, k: usize) -> Result<Vec<(usize, f64)>> {
        self.results().top_k(k)
    }

    fn scores(&mut self, move_out: bool) -> Result<Vec<f64>> {
        self.results_mut().scores(move_out)
    }

    fn edge_scores(&self) -> Result<Vec<f64>> {
        self.results().edge_scores()
    }

    fn length_scale_scores(&mut self, move_out: bool) -> Result<Vec<f64>> {
        self.results_mut().length_scale_scores(move_out)
    }

    fn centralization(&self) -> Result<f64> {
        // Not-run is reported before NotImplemented.
        self.results().center_score()?;
        let maximum = self.maximum()?;
        self.results().centralization_with(maximum)
    }
}
