//! Exhaustive search over blend weight and candidate pool sizes
//!
//! Candidates are fetched once per user at the largest pool size of each
//! engine and truncated per grid point; engine top-N lists are prefixes of
//! each other, so this matches fetching every size separately. Grid points
//! are scored in parallel and the best is the first point, in grid order,
//! with the highest mean precision.

use super::evaluate_lists;
use crate::models::{GroundTruth, ItemId, ScoredItem, UserId};
use crate::services::hybrid::{blend, BlendParams};
use crate::services::Recommender;
use ranking_metrics::RankMetrics;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub alphas: Vec<f64>,
    pub cf_ks: Vec<usize>,
    pub cb_ks: Vec<usize>,
    pub output_size: usize,
    pub k: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            alphas: (0..=10).map(|step| step as f64 / 10.0).collect(),
            cf_ks: vec![10, 30, 50],
            cb_ks: vec![10, 30, 50],
            output_size: 10,
            k: 10,
        }
    }
}

impl GridSpec {
    /// Cartesian product in iteration order: alpha, then CF_K, then CB_K.
    pub fn points(&self) -> Vec<BlendParams> {
        let mut points =
            Vec::with_capacity(self.alphas.len() * self.cf_ks.len() * self.cb_ks.len());
        for &alpha in &self.alphas {
            for &cf_k in &self.cf_ks {
                for &cb_k in &self.cb_ks {
                    points.push(BlendParams { alpha, cf_k, cb_k });
                }
            }
        }
        points
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub params: BlendParams,
    pub metrics: RankMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSearchReport {
    pub points: Vec<GridPoint>,
    pub best: Option<GridPoint>,
}

struct UserCandidates {
    user_id: UserId,
    cf: Vec<ScoredItem>,
    cb: Vec<ScoredItem>,
}

pub fn grid_search(
    cf: &dyn Recommender,
    cb: &dyn Recommender,
    truth: &GroundTruth,
    spec: &GridSpec,
) -> GridSearchReport {
    let max_cf = spec.cf_ks.iter().copied().max().unwrap_or(0);
    let max_cb = spec.cb_ks.iter().copied().max().unwrap_or(0);

    let candidates: Vec<UserCandidates> = truth
        .users()
        .par_iter()
        .map(|&user_id| UserCandidates {
            user_id,
            cf: cf.recommend(user_id, max_cf),
            cb: cb.recommend(user_id, max_cb),
        })
        .collect();

    let points: Vec<GridPoint> = spec
        .points()
        .into_par_iter()
        .map(|params| GridPoint {
            params,
            metrics: score_point(&candidates, &params, truth, spec),
        })
        .collect();

    let mut best: Option<GridPoint> = None;
    for point in &points {
        info!(
            alpha = point.params.alpha,
            cf_k = point.params.cf_k,
            cb_k = point.params.cb_k,
            precision = point.metrics.precision,
            recall = point.metrics.recall,
            ndcg = point.metrics.ndcg,
            "Grid point evaluated"
        );
        if best.map_or(true, |b| point.metrics.precision > b.metrics.precision) {
            best = Some(*point);
        }
    }

    if let Some(b) = best {
        info!(
            alpha = b.params.alpha,
            cf_k = b.params.cf_k,
            cb_k = b.params.cb_k,
            precision = b.metrics.precision,
            "Best blend configuration"
        );
    }

    GridSearchReport { points, best }
}

fn score_point(
    candidates: &[UserCandidates],
    params: &BlendParams,
    truth: &GroundTruth,
    spec: &GridSpec,
) -> RankMetrics {
    let lists: Vec<(UserId, Vec<ItemId>)> = candidates
        .iter()
        .filter_map(|c| {
            let cf = &c.cf[..params.cf_k.min(c.cf.len())];
            let cb = &c.cb[..params.cb_k.min(c.cb.len())];
            let blended = blend(cf, cb, params.alpha, spec.output_size);
            if blended.is_empty() {
                return None;
            }
            Some((c.user_id, blended.into_iter().map(|s| s.item_id).collect()))
        })
        .collect();
    evaluate_lists(&lists, truth, spec.k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TruthPair;
    use crate::services::MockRecommender;

    fn scored(pairs: &[(ItemId, f64)]) -> Vec<ScoredItem> {
        pairs
            .iter()
            .map(|&(item_id, score)| ScoredItem { item_id, score })
            .collect()
    }

    #[test]
    fn test_default_grid_size_and_order() {
        let spec = GridSpec::default();
        let points = spec.points();
        assert_eq!(points.len(), 11 * 3 * 3);
        assert_eq!(points[0], BlendParams { alpha: 0.0, cf_k: 10, cb_k: 10 });
        assert_eq!(points[1], BlendParams { alpha: 0.0, cf_k: 10, cb_k: 30 });
        assert!((points[98].alpha - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_best_follows_the_better_engine() {
        // CF ranks the relevant item first, CB ranks it last.
        let mut cf = MockRecommender::new();
        cf.expect_recommend()
            .returning(|_, _| scored(&[(1, 0.9), (2, 0.1)]));
        let mut cb = MockRecommender::new();
        cb.expect_recommend()
            .returning(|_, _| scored(&[(2, 0.9), (3, 0.8), (1, 0.1)]));

        let truth = GroundTruth::from_pairs(vec![TruthPair { user_id: 7, item_id: 1 }]);
        let spec = GridSpec {
            alphas: vec![0.0, 1.0],
            cf_ks: vec![2],
            cb_ks: vec![3],
            output_size: 1,
            k: 1,
        };
        let report = grid_search(&cf, &cb, &truth, &spec);

        assert_eq!(report.points.len(), 2);
        assert_eq!(report.points[0].metrics.precision, 0.0);
        assert_eq!(report.points[1].metrics.precision, 1.0);
        let best = report.best.unwrap();
        assert_eq!(best.params.alpha, 1.0);
    }

    #[test]
    fn test_ties_keep_first_point() {
        let mut cf = MockRecommender::new();
        cf.expect_recommend().returning(|_, _| scored(&[(1, 1.0)]));
        let mut cb = MockRecommender::new();
        cb.expect_recommend().returning(|_, _| scored(&[(1, 1.0)]));

        let truth = GroundTruth::from_pairs(vec![TruthPair { user_id: 7, item_id: 1 }]);
        let spec = GridSpec {
            alphas: vec![0.2, 0.8],
            cf_ks: vec![1],
            cb_ks: vec![1],
            output_size: 1,
            k: 1,
        };
        let report = grid_search(&cf, &cb, &truth, &spec);
        assert_eq!(report.best.unwrap().params.alpha, 0.2);
    }

    #[test]
    fn test_pool_sizes_truncate_cached_candidates() {
        let mut cf = MockRecommender::new();
        cf.expect_recommend()
            .withf(|_, n| *n == 3)
            .returning(|_, _| scored(&[(5, 0.9), (6, 0.8), (1, 0.7)]));
        let mut cb = MockRecommender::new();
        cb.expect_recommend().returning(|_, _| Vec::new());

        let truth = GroundTruth::from_pairs(vec![TruthPair { user_id: 7, item_id: 1 }]);
        let spec = GridSpec {
            alphas: vec![1.0],
            cf_ks: vec![2, 3],
            cb_ks: vec![1],
            output_size: 3,
            k: 3,
        };
        let report = grid_search(&cf, &cb, &truth, &spec);
        // CF_K = 2 never sees item 1
        assert_eq!(report.points[0].metrics.recall, 0.0);
        assert_eq!(report.points[1].metrics.recall, 1.0);
    }

    #[test]
    fn test_empty_truth() {
        let cf = MockRecommender::new();
        let cb = MockRecommender::new();
        let report = grid_search(&cf, &cb, &GroundTruth::default(), &GridSpec::default());
        assert_eq!(report.points.len(), 99);
        assert!(report.best.is_some());
        assert_eq!(report.best.unwrap().metrics, RankMetrics::default());
    }
}
