//! Rank-quality metrics for top-K recommendation lists
//!
//! All functions take the ranked list in display order (position 0 is rank 1)
//! and the set of relevant items for the same user.
//!
//! ```text
//! precision@k = |top_k ∩ truth| / k
//! recall@k    = |top_k ∩ truth| / |truth|
//! DCG@k       = Σ 1 / log2(rank + 1)      over hits, rank is 1-based
//! IDCG@k      = DCG of min(|truth|, k) hits placed at the top
//! NDCG@k      = DCG@k / IDCG@k
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

/// Precision, recall and NDCG for a single ranked list (or their mean).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RankMetrics {
    pub precision: f64,
    pub recall: f64,
    pub ndcg: f64,
}

impl RankMetrics {
    /// Compute all three metrics for one user at cutoff `k`.
    pub fn at_k<T: Eq + Hash>(recommended: &[T], truth: &HashSet<T>, k: usize) -> Self {
        Self {
            precision: precision_at_k(recommended, truth, k),
            recall: recall_at_k(recommended, truth, k),
            ndcg: ndcg_at_k(recommended, truth, k),
        }
    }

    /// Unweighted mean over per-user metrics. An empty input yields zeros.
    pub fn mean<'a, I>(per_user: I) -> Self
    where
        I: IntoIterator<Item = &'a RankMetrics>,
    {
        let mut sum = RankMetrics::default();
        let mut n = 0usize;
        for m in per_user {
            sum.precision += m.precision;
            sum.recall += m.recall;
            sum.ndcg += m.ndcg;
            n += 1;
        }
        if n == 0 {
            return sum;
        }
        let n = n as f64;
        RankMetrics {
            precision: sum.precision / n,
            recall: sum.recall / n,
            ndcg: sum.ndcg / n,
        }
    }
}

fn hits_at_k<T: Eq + Hash>(recommended: &[T], truth: &HashSet<T>, k: usize) -> usize {
    recommended
        .iter()
        .take(k)
        .filter(|item| truth.contains(item))
        .count()
}

/// Fraction of the first `k` slots holding a relevant item.
///
/// The denominator is always `k`, even when fewer than `k` items were
/// recommended. Returns 0 for `k == 0`.
pub fn precision_at_k<T: Eq + Hash>(recommended: &[T], truth: &HashSet<T>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    hits_at_k(recommended, truth, k) as f64 / k as f64
}

/// Fraction of relevant items retrieved in the first `k` slots.
///
/// Returns 0 when `truth` is empty.
pub fn recall_at_k<T: Eq + Hash>(recommended: &[T], truth: &HashSet<T>, k: usize) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    hits_at_k(recommended, truth, k) as f64 / truth.len() as f64
}

/// Discounted cumulative gain over binary relevance.
pub fn dcg_at_k<T: Eq + Hash>(recommended: &[T], truth: &HashSet<T>, k: usize) -> f64 {
    recommended
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, item)| truth.contains(item))
        .map(|(i, _)| 1.0 / (i as f64 + 2.0).log2())
        .sum()
}

/// Best achievable DCG: `min(relevant, k)` hits in the top positions.
pub fn idcg_at_k(relevant: usize, k: usize) -> f64 {
    (0..relevant.min(k))
        .map(|i| 1.0 / (i as f64 + 2.0).log2())
        .sum()
}

/// Normalized DCG. Returns 0 when the ideal DCG is 0.
pub fn ndcg_at_k<T: Eq + Hash>(recommended: &[T], truth: &HashSet<T>, k: usize) -> f64 {
    let idcg = idcg_at_k(truth.len(), k);
    if idcg == 0.0 {
        return 0.0;
    }
    dcg_at_k(recommended, truth, k) / idcg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truth(items: &[&'static str]) -> HashSet<&'static str> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_precision_counts_hits_over_k() {
        let recs = ["A", "B", "C", "D", "E"];
        let p = precision_at_k(&recs, &truth(&["B", "D", "Z"]), 5);
        assert!((p - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_recall_counts_hits_over_truth() {
        let recs = ["A", "B", "C", "D", "E"];
        let r = recall_at_k(&recs, &truth(&["B", "D", "Z"]), 5);
        assert!((r - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_recall_empty_truth_is_zero() {
        let recs = ["A", "B"];
        assert_eq!(recall_at_k(&recs, &HashSet::new(), 2), 0.0);
    }

    #[test]
    fn test_ndcg_single_hit_at_rank_two() {
        let recs = ["A", "B", "C"];
        let n = ndcg_at_k(&recs, &truth(&["B"]), 3);
        let expected = 1.0 / 3f64.log2();
        assert!((n - expected).abs() < 1e-12);
        assert!((n - 0.6309).abs() < 1e-4);
    }

    #[test]
    fn test_ndcg_perfect_ranking_is_one() {
        let recs = ["A", "B", "C"];
        let n = ndcg_at_k(&recs, &truth(&["A", "B"]), 3);
        assert!((n - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ndcg_empty_truth_is_zero() {
        let recs = ["A"];
        assert_eq!(ndcg_at_k(&recs, &HashSet::new(), 1), 0.0);
    }

    #[test]
    fn test_precision_short_list_still_divides_by_k() {
        let recs = ["B"];
        let p = precision_at_k(&recs, &truth(&["B"]), 10);
        assert!((p - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_k_zero() {
        let recs = ["A"];
        let t = truth(&["A"]);
        assert_eq!(precision_at_k(&recs, &t, 0), 0.0);
        assert_eq!(ndcg_at_k(&recs, &t, 0), 0.0);
    }

    #[test]
    fn test_mean_is_unweighted() {
        let per_user = [
            RankMetrics { precision: 1.0, recall: 0.5, ndcg: 1.0 },
            RankMetrics { precision: 0.0, recall: 0.0, ndcg: 0.0 },
        ];
        let mean = RankMetrics::mean(per_user.iter());
        assert_eq!(mean, RankMetrics { precision: 0.5, recall: 0.25, ndcg: 0.5 });
        assert_eq!(RankMetrics::mean([].iter()), RankMetrics::default());
    }

    #[test]
    fn test_metrics_serialize() {
        let m = RankMetrics { precision: 0.4, recall: 0.5, ndcg: 0.25 };
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"precision\":0.4"));
    }
}
