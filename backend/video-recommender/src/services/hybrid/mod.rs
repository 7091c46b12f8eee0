// ============================================
// Hybrid Scorer
// ============================================
//
// Per user:
//   cf candidates = CF top-CF_K, cb candidates = CB top-CB_K
//   score(item)   = alpha * cf_score       (CF pool only)
//                 = (1 - alpha) * cb_score (CB pool only)
//                 = sum of both            (both pools)
//
// Contributions add up; an item surfaced by both engines is not averaged.
// Final order is descending score, ties by first appearance with the CF
// pool walked before the CB pool.

use crate::config::HybridConfig;
use crate::models::{ItemId, Recommendation, ScoredItem, UserId};
use crate::services::Recommender;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendParams {
    pub alpha: f64,
    pub cf_k: usize,
    pub cb_k: usize,
}

impl From<&HybridConfig> for BlendParams {
    fn from(config: &HybridConfig) -> Self {
        Self {
            alpha: config.alpha,
            cf_k: config.cf_k,
            cb_k: config.cb_k,
        }
    }
}

/// Blend two ranked candidate pools into one list of at most `output_size`.
pub fn blend(
    cf: &[ScoredItem],
    cb: &[ScoredItem],
    alpha: f64,
    output_size: usize,
) -> Vec<ScoredItem> {
    let mut order: Vec<ScoredItem> = Vec::with_capacity(cf.len() + cb.len());
    let mut slot: HashMap<ItemId, usize> = HashMap::with_capacity(cf.len() + cb.len());

    let pools = [(cf, alpha), (cb, 1.0 - alpha)];
    for (pool, weight) in pools {
        for candidate in pool {
            let contribution = weight * candidate.score;
            match slot.get(&candidate.item_id) {
                Some(&idx) => order[idx].score += contribution,
                None => {
                    slot.insert(candidate.item_id, order.len());
                    order.push(ScoredItem {
                        item_id: candidate.item_id,
                        score: contribution,
                    });
                }
            }
        }
    }

    // stable sort keeps first-appearance order among equal scores
    order.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    order.truncate(output_size);
    order
}

/// Blends the outputs of a CF and a content recommender.
pub struct HybridScorer<'a> {
    cf: &'a dyn Recommender,
    cb: &'a dyn Recommender,
    output_size: usize,
}

impl<'a> HybridScorer<'a> {
    pub fn new(cf: &'a dyn Recommender, cb: &'a dyn Recommender, output_size: usize) -> Self {
        Self {
            cf,
            cb,
            output_size,
        }
    }

    pub fn recommend(&self, user_id: UserId, params: &BlendParams) -> Vec<ScoredItem> {
        let cf = self.cf.recommend(user_id, params.cf_k);
        let cb = self.cb.recommend(user_id, params.cb_k);
        debug!(
            user_id,
            cf_candidates = cf.len(),
            cb_candidates = cb.len(),
            "Blending candidates"
        );
        blend(&cf, &cb, params.alpha, self.output_size)
    }

    /// Ranked rows for every user, in input order. Users neither engine
    /// knows produce no rows.
    pub fn recommend_all(&self, users: &[UserId], params: &BlendParams) -> Vec<Recommendation> {
        users
            .par_iter()
            .map(|&user_id| Recommendation::ranked(user_id, &self.recommend(user_id, params)))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }
}
