//! Ranking utilities.
//!
//! Order: score descending, then node id ascending. NaN scores rank last. The order is
//! total over distinct node ids, so results do not depend on sort stability or thread count.

use ordered_float::OrderedFloat;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// `None` sorts below every real score, `-inf` included.
fn score_key(score: f64) -> Option<OrderedFloat<f64>> {
    (!score.is_nan()).then_some(OrderedFloat(score))
}

/// `Less` means `a` ranks before `b`.
pub(crate) fn rank_order(a: &(usize, f64), b: &(usize, f64)) -> Ordering {
    score_key(b.1).cmp(&score_key(a.1)).then(a.0.cmp(&b.0))
}

/// Sort `(node, score)` pairs into ranking order.
pub fn rank_descending(mut entries: Vec<(usize, f64)>) -> Vec<(usize, f64)> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        entries.par_sort_unstable_by(rank_order);
    }
    #[cfg(not(feature = "parallel"))]
    entries.sort_unstable_by(rank_order);
    entries
}

/// The `k` best `(node, score)` pairs in ranking order, without sorting everything.
pub fn top_k<I>(entries: I, k: usize) -> Vec<(usize, f64)>
where
    I: IntoIterator<Item = (usize, f64)>,
{
    if k == 0 {
        return Vec::new();
    }
    // Min-heap on "goodness": higher score, then lower id, is better.
    let mut heap = BinaryHeap::with_capacity(k + 1);
    for (node, score) in entries {
        // The raw score rides along so NaN survives the round trip; it never decides order.
        let key = (score_key(score), Reverse(node), OrderedFloat(score));
        if heap.len() < k {
            heap.push(Reverse(key));
        } else if let Some(Reverse(worst)) = heap.peek() {
            if key > *worst {
                heap.pop();
                heap.push(Reverse(key));
            }
        }
    }
    let mut results: Vec<(usize, f64)> = heap
        .into_iter()
        .map(|Reverse((_, Reverse(node), raw))| (node, raw.into_inner()))
        .collect();
    results.sort_unstable_by(rank_order);
    results
}
