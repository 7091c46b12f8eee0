// ============================================
// Offline Evaluation
// ============================================
//
// Scores a recommendation table against held-out consumption:
// - rows are grouped per user and ordered by rank
// - per-user precision/recall/NDCG at k (ranking-metrics)
// - unweighted mean over every user present in the table
//
// Users missing from the ground truth count with an empty truth set, so
// they contribute zeros rather than being skipped.

mod grid_search;

pub use grid_search::{grid_search, GridPoint, GridSearchReport, GridSpec};

use crate::models::{GroundTruth, ItemId, Recommendation, UserId};
use ranking_metrics::RankMetrics;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub k: usize,
    pub users: usize,
    #[serde(flatten)]
    pub metrics: RankMetrics,
}

/// Ranked item lists per user, in first-appearance order of the user.
pub fn ranked_lists(recommendations: &[Recommendation]) -> Vec<(UserId, Vec<ItemId>)> {
    let mut slot: HashMap<UserId, usize> = HashMap::new();
    let mut grouped: Vec<(UserId, Vec<(usize, ItemId)>)> = Vec::new();

    for rec in recommendations {
        let idx = *slot.entry(rec.user_id).or_insert_with(|| {
            grouped.push((rec.user_id, Vec::new()));
            grouped.len() - 1
        });
        grouped[idx].1.push((rec.rank, rec.item_id));
    }

    grouped
        .into_iter()
        .map(|(user_id, mut rows)| {
            rows.sort_by_key(|&(rank, _)| rank);
            (user_id, rows.into_iter().map(|(_, item)| item).collect())
        })
        .collect()
}

/// Mean metrics over ranked lists already grouped per user.
pub fn evaluate_lists(
    lists: &[(UserId, Vec<ItemId>)],
    truth: &GroundTruth,
    k: usize,
) -> RankMetrics {
    let empty = HashSet::new();
    let per_user: Vec<RankMetrics> = lists
        .iter()
        .map(|(user_id, items)| {
            let relevant = truth.items_for(*user_id).unwrap_or(&empty);
            RankMetrics::at_k(items, relevant, k)
        })
        .collect();
    RankMetrics::mean(&per_user)
}

pub fn evaluate(
    recommendations: &[Recommendation],
    truth: &GroundTruth,
    k: usize,
) -> EvaluationReport {
    let lists = ranked_lists(recommendations);
    let metrics = evaluate_lists(&lists, truth, k);

    info!(
        k,
        users = lists.len(),
        precision = metrics.precision,
        recall = metrics.recall,
        ndcg = metrics.ndcg,
        "Evaluated recommendations"
    );

    EvaluationReport {
        k,
        users: lists.len(),
        metrics,
    }
}
