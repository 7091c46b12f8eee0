// ============================================
// Interaction Matrix Builder
// ============================================
//
// Turns raw watch records into a weighted, L1-row-normalized
// user×item matrix plus dense user/item index mappings.
//
// Strength formula:
//   strength = play_seconds * source_weight * exp(-decay * age_seconds)
//   age_seconds = max_timestamp(filtered) - timestamp
//
// Pipeline:
// 1. Count records per user and per item (before any filtering)
// 2. Keep records whose user AND item both reach min_interactions
// 3. Assign indices by first appearance in the kept stream
// 4. Accumulate duplicate (user, item) cells, then L1-normalize rows

mod index;
mod sparse;

pub use index::IdIndex;
pub use sparse::CsrMatrix;

use crate::config::MatrixConfig;
use crate::models::{InteractionRecord, InteractionSource, ItemId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Fixed weight per interaction pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceWeights {
    pub big: f64,
    pub small: f64,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            big: 2.0,
            small: 1.0,
        }
    }
}

impl SourceWeights {
    pub fn weight(&self, source: InteractionSource) -> f64 {
        match source {
            InteractionSource::Big => self.big,
            InteractionSource::Small => self.small,
        }
    }
}

/// Built matrix with the index mappings that define its row/column order.
///
/// Indices are local to one build; never mix positions across builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionMatrix {
    pub matrix: CsrMatrix,
    pub users: IdIndex<UserId>,
    pub items: IdIndex<ItemId>,
}

impl InteractionMatrix {
    pub fn empty() -> Self {
        Self {
            matrix: CsrMatrix::zeros(0, 0),
            users: IdIndex::new(),
            items: IdIndex::new(),
        }
    }

    pub fn n_users(&self) -> usize {
        self.matrix.n_rows()
    }

    pub fn n_items(&self) -> usize {
        self.matrix.n_cols()
    }

    /// External ids of the items the user has nonzero strength on.
    pub fn seen_items(&self, user_id: UserId) -> Vec<ItemId> {
        let Some(u) = self.users.position(&user_id) else {
            return Vec::new();
        };
        self.matrix
            .row_iter(u)
            .filter(|&(_, v)| v > 0.0)
            .filter_map(|(c, _)| self.items.id_at(c))
            .collect()
    }

    /// Index sizes agree with the matrix shape.
    pub fn is_consistent(&self) -> bool {
        self.users.len() == self.matrix.n_rows()
            && self.items.len() == self.matrix.n_cols()
            && self.matrix.is_well_formed()
    }
}

/// Record counts from the build, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildStats {
    pub input_records: usize,
    pub kept_records: usize,
    pub users: usize,
    pub items: usize,
    pub nnz: usize,
    pub max_timestamp: Option<f64>,
}

pub struct InteractionMatrixBuilder {
    min_interactions: usize,
    source_weights: SourceWeights,
    decay: f64,
}

impl InteractionMatrixBuilder {
    pub fn new(min_interactions: usize, source_weights: SourceWeights, decay: f64) -> Self {
        Self {
            min_interactions,
            source_weights,
            decay,
        }
    }

    pub fn from_config(config: &MatrixConfig) -> Self {
        Self::new(
            config.min_interactions,
            config.source_weights(),
            config.time_decay,
        )
    }

    pub fn build(&self, records: &[InteractionRecord]) -> InteractionMatrix {
        self.build_with_stats(records).0
    }

    pub fn build_with_stats(
        &self,
        records: &[InteractionRecord],
    ) -> (InteractionMatrix, BuildStats) {
        let mut user_counts: HashMap<UserId, usize> = HashMap::new();
        let mut item_counts: HashMap<ItemId, usize> = HashMap::new();
        for rec in records {
            *user_counts.entry(rec.user_id).or_insert(0) += 1;
            *item_counts.entry(rec.item_id).or_insert(0) += 1;
        }

        let kept: Vec<&InteractionRecord> = records
            .iter()
            .filter(|rec| {
                user_counts[&rec.user_id] >= self.min_interactions
                    && item_counts[&rec.item_id] >= self.min_interactions
            })
            .collect();

        let mut stats = BuildStats {
            input_records: records.len(),
            kept_records: kept.len(),
            ..Default::default()
        };

        if kept.is_empty() {
            info!(
                input_records = records.len(),
                min_interactions = self.min_interactions,
                "No records survived activity filtering; matrix is empty"
            );
            return (InteractionMatrix::empty(), stats);
        }

        let max_ts = kept
            .iter()
            .map(|rec| rec.timestamp)
            .fold(f64::NEG_INFINITY, f64::max);

        let mut users = IdIndex::new();
        let mut items = IdIndex::new();
        let mut triplets = Vec::with_capacity(kept.len());

        for rec in &kept {
            let u = users.get_or_insert(rec.user_id);
            let i = items.get_or_insert(rec.item_id);
            triplets.push((u, i, self.strength(rec, max_ts)));
        }

        let mut matrix = CsrMatrix::from_triplets(users.len(), items.len(), &triplets);
        matrix.normalize_rows_l1();

        stats.users = users.len();
        stats.items = items.len();
        stats.nnz = matrix.nnz();
        stats.max_timestamp = Some(max_ts);

        info!(
            input_records = stats.input_records,
            kept_records = stats.kept_records,
            users = stats.users,
            items = stats.items,
            nnz = stats.nnz,
            "Built interaction matrix"
        );

        (
            InteractionMatrix {
                matrix,
                users,
                items,
            },
            stats,
        )
    }

    /// Weighted strength of one record. Negative durations count as zero.
    fn strength(&self, rec: &InteractionRecord, max_ts: f64) -> f64 {
        let play_seconds = (rec.play_duration / 1000.0).max(0.0);
        let age = max_ts - rec.timestamp;
        let time_weight = (-self.decay * age).exp();
        play_seconds * self.source_weights.weight(rec.source) * time_weight
    }
}
