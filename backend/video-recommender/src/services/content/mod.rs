// ============================================
// Content Engine
// ============================================
//
// Item term-weight vectors from tag lists, per-user profiles as the
// interaction-weighted average of watched items, cosine ranking.
//
// Alignment:
//   Metadata arrives in its own order (possibly a superset, possibly with
//   gaps). Term-weight rows are reindexed into the interaction matrix's
//   item order and checked before any profile is built:
//     - row count equals the item index size
//     - every item position maps back to a metadata row with the same id
//     - sampled rows are identical to their metadata source rows
//   Items without metadata get an all-zero row.

mod tfidf;

pub use tfidf::TfidfVectorizer;

use crate::config::{ConfigError, ContentConfig};
use crate::models::{ItemId, ItemMetadata, ScoredItem, UserId};
use crate::services::interactions::{CsrMatrix, IdIndex, InteractionMatrix};
use crate::utils::{l2_norm, top_n};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Number of rows compared cell-by-cell during the alignment check.
const ALIGNMENT_SPOT_CHECKS: usize = 16;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Item index misalignment: {0}")]
    IndexMisalignment(String),

    #[error("Inconsistent content artifacts: {0}")]
    InconsistentArtifacts(String),

    #[error("Invalid content configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ContentError>;

/// Trained content engine. All five parts are saved and loaded together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentModel {
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    vectorizer: TfidfVectorizer,
    /// items × terms, rows in `items` order
    item_vectors: CsrMatrix,
    /// users × terms, rows in `users` order
    user_profiles: Array2<f64>,
    users: IdIndex<UserId>,
    items: IdIndex<ItemId>,
}

impl ContentModel {
    pub fn fit(
        metadata: &[ItemMetadata],
        interactions: &InteractionMatrix,
        config: &ContentConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut vectorizer = TfidfVectorizer::new()
            .with_max_features(config.max_features)
            .with_ngram_range(config.ngram_min, config.ngram_max);
        let documents: Vec<&[String]> = metadata.iter().map(|m| m.tags.as_slice()).collect();
        let metadata_vectors = vectorizer.fit_transform(&documents);

        let order = metadata_order(metadata, &interactions.items);
        let item_vectors = metadata_vectors.select_rows(&order);
        verify_alignment(&item_vectors, &metadata_vectors, &order, metadata, &interactions.items)?;

        let missing = order.iter().filter(|o| o.is_none()).count();
        if missing > 0 {
            warn!(missing, "Items without metadata get empty term vectors");
        }

        let user_profiles = build_profiles(&interactions.matrix, &item_vectors);

        info!(
            vocabulary = vectorizer.vocabulary_size(),
            items = item_vectors.n_rows(),
            users = user_profiles.nrows(),
            "Fitted content model"
        );

        Ok(Self {
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            vectorizer,
            item_vectors,
            user_profiles,
            users: interactions.users.clone(),
            items: interactions.items.clone(),
        })
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    pub fn knows_user(&self, user_id: UserId) -> bool {
        self.users.contains(&user_id)
    }

    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    /// Profile row for a known user.
    pub fn profile(&self, user_id: UserId) -> Option<Vec<f64>> {
        let u = self.users.position(&user_id)?;
        Some(self.user_profiles.row(u).to_vec())
    }

    /// Top-N items by cosine similarity to the user's profile.
    ///
    /// Unknown users get an empty list. A zero profile scores every item 0,
    /// which yields the first N items by index.
    pub fn recommend(&self, user_id: UserId, n: usize) -> Vec<ScoredItem> {
        let Some(u) = self.users.position(&user_id) else {
            debug!(user_id, "User not in content index");
            return Vec::new();
        };
        let profile = self.user_profiles.row(u);
        let profile_norm = profile.iter().map(|v| v * v).sum::<f64>().sqrt();

        let scores: Vec<f64> = (0..self.item_vectors.n_rows())
            .map(|i| {
                let (cols, vals) = self.item_vectors.row(i);
                let item_norm = l2_norm(vals);
                if profile_norm == 0.0 || item_norm == 0.0 {
                    return 0.0;
                }
                let dot: f64 = cols.iter().zip(vals).map(|(&c, &w)| profile[c] * w).sum();
                dot / (profile_norm * item_norm)
            })
            .collect();

        top_n(&scores, n)
            .into_iter()
            .filter_map(|(i, score)| {
                self.items
                    .id_at(i)
                    .map(|item_id| ScoredItem { item_id, score })
            })
            .collect()
    }

    /// Shapes of all parts agree. Run after every load.
    pub fn validate(&self) -> Result<()> {
        let vocab = self.vectorizer.vocabulary_size();
        if self.vectorizer.idf().len() != vocab {
            return Err(ContentError::InconsistentArtifacts(format!(
                "vocabulary has {} terms but {} idf weights",
                vocab,
                self.vectorizer.idf().len()
            )));
        }
        if !self.item_vectors.is_well_formed()
            || self.item_vectors.n_rows() != self.items.len()
            || self.item_vectors.n_cols() != vocab
        {
            return Err(ContentError::InconsistentArtifacts(format!(
                "item vectors are {}x{}, expected {}x{}",
                self.item_vectors.n_rows(),
                self.item_vectors.n_cols(),
                self.items.len(),
                vocab
            )));
        }
        if self.user_profiles.dim() != (self.users.len(), vocab) {
            return Err(ContentError::InconsistentArtifacts(format!(
                "user profiles are {:?}, expected ({}, {})",
                self.user_profiles.dim(),
                self.users.len(),
                vocab
            )));
        }
        Ok(())
    }
}

/// For each item position, the first metadata row carrying that item id.
fn metadata_order(metadata: &[ItemMetadata], items: &IdIndex<ItemId>) -> Vec<Option<usize>> {
    let mut first_row: HashMap<ItemId, usize> = HashMap::with_capacity(metadata.len());
    for (row, m) in metadata.iter().enumerate() {
        first_row.entry(m.item_id).or_insert(row);
    }
    items
        .ids()
        .iter()
        .map(|id| first_row.get(id).copied())
        .collect()
}

fn verify_alignment(
    aligned: &CsrMatrix,
    source: &CsrMatrix,
    order: &[Option<usize>],
    metadata: &[ItemMetadata],
    items: &IdIndex<ItemId>,
) -> Result<()> {
    if aligned.n_rows() != items.len() || order.len() != items.len() {
        return Err(ContentError::IndexMisalignment(format!(
            "{} term rows for {} indexed items",
            aligned.n_rows(),
            items.len()
        )));
    }

    for (pos, src) in order.iter().enumerate() {
        let Some(src) = *src else { continue };
        let expected = items.id_at(pos);
        let actual = metadata.get(src).map(|m| m.item_id);
        if expected != actual || expected.is_none() {
            return Err(ContentError::IndexMisalignment(format!(
                "item position {} maps to metadata id {:?}, expected {:?}",
                pos, actual, expected
            )));
        }
    }

    let mapped: Vec<(usize, usize)> = order
        .iter()
        .enumerate()
        .filter_map(|(pos, src)| src.map(|s| (pos, s)))
        .collect();
    let stride = (mapped.len() / ALIGNMENT_SPOT_CHECKS).max(1);
    for &(pos, src) in mapped.iter().step_by(stride) {
        if aligned.row(pos) != source.row(src) {
            return Err(ContentError::IndexMisalignment(format!(
                "term row for item position {} differs from metadata row {}",
                pos, src
            )));
        }
    }

    debug!(
        items = items.len(),
        checked = mapped.len().div_ceil(stride),
        "Content rows aligned to item index"
    );
    Ok(())
}

/// Weighted average of item vectors per user; weights are the positive
/// entries of the user's interaction row.
fn build_profiles(interactions: &CsrMatrix, item_vectors: &CsrMatrix) -> Array2<f64> {
    let mut profiles = Array2::zeros((interactions.n_rows(), item_vectors.n_cols()));

    for u in 0..interactions.n_rows() {
        let total: f64 = interactions
            .row_iter(u)
            .filter(|&(_, w)| w > 0.0)
            .map(|(_, w)| w)
            .sum();
        if total <= 0.0 {
            continue;
        }

        let mut row = profiles.row_mut(u);
        for (i, w) in interactions.row_iter(u).filter(|&(_, w)| w > 0.0) {
            let share = w / total;
            for (term, value) in item_vectors.row_iter(i) {
                row[term] += share * value;
            }
        }
    }

    profiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InteractionRecord, InteractionSource};
    use crate::services::interactions::{InteractionMatrixBuilder, SourceWeights};

    fn meta(item_id: ItemId, tags: &[&str]) -> ItemMetadata {
        ItemMetadata {
            item_id,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn watch(user_id: UserId, item_id: ItemId, ms: f64) -> InteractionRecord {
        InteractionRecord {
            user_id,
            item_id,
            timestamp: 0.0,
            play_duration: ms,
            source: InteractionSource::Small,
        }
    }

    fn interactions() -> InteractionMatrix {
        // item order after build: 100, 200, 300
        let records = vec![
            watch(1, 100, 3_000.0),
            watch(1, 200, 1_000.0),
            watch(2, 300, 1_000.0),
        ];
        InteractionMatrixBuilder::new(1, SourceWeights::default(), 0.0).build(&records)
    }

    fn metadata() -> Vec<ItemMetadata> {
        // shuffled superset of the indexed items
        vec![
            meta(999, &["noise"]),
            meta(300, &["cooking"]),
            meta(100, &["cats"]),
            meta(200, &["cats", "dogs"]),
        ]
    }

    #[test]
    fn test_rows_follow_item_index_not_metadata_order() {
        let built = interactions();
        let model = ContentModel::fit(&metadata(), &built, &ContentConfig::default()).unwrap();
        assert!(model.validate().is_ok());

        let cats = model.vectorizer().term_position("cats").unwrap();
        let cooking = model.vectorizer().term_position("cooking").unwrap();
        // position 0 is item 100
        let row0 = model.item_vectors.dense_row(0);
        assert!((row0[cats] - 1.0).abs() < 1e-12);
        // position 2 is item 300
        let row2 = model.item_vectors.dense_row(2);
        assert!((row2[cooking] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_metadata_gives_zero_row() {
        let built = interactions();
        let partial = vec![meta(100, &["cats"]), meta(200, &["dogs"])];
        let model = ContentModel::fit(&partial, &built, &ContentConfig::default()).unwrap();
        assert_eq!(model.item_vectors.row_sum(2), 0.0);
        assert_eq!(model.item_vectors.n_rows(), 3);
    }

    #[test]
    fn test_duplicate_metadata_uses_first_occurrence() {
        let items: IdIndex<ItemId> = vec![7, 8].into();
        let rows = vec![meta(8, &["a"]), meta(7, &["b"]), meta(8, &["c"])];
        assert_eq!(metadata_order(&rows, &items), vec![Some(1), Some(0)]);
    }

    struct AlignmentCase {
        source: CsrMatrix,
        order: Vec<Option<usize>>,
        metadata: Vec<ItemMetadata>,
        items: IdIndex<ItemId>,
    }

    fn alignment_case() -> AlignmentCase {
        let metadata = metadata();
        let documents: Vec<&[String]> = metadata.iter().map(|m| m.tags.as_slice()).collect();
        let source = TfidfVectorizer::new().fit_transform(&documents);
        let items = interactions().items;
        let order = metadata_order(&metadata, &items);
        AlignmentCase {
            source,
            order,
            metadata,
            items,
        }
    }

    impl AlignmentCase {
        fn check(&self, aligned: &CsrMatrix, order: &[Option<usize>]) -> Result<()> {
            verify_alignment(aligned, &self.source, order, &self.metadata, &self.items)
        }
    }

    #[test]
    fn test_alignment_accepts_reindexed_rows() {
        let case = alignment_case();
        let aligned = case.source.select_rows(&case.order);
        assert!(case.check(&aligned, &case.order).is_ok());
    }

    #[test]
    fn test_alignment_rejects_row_count_mismatch() {
        let case = alignment_case();
        let short = case.source.select_rows(&case.order[..2]);
        assert!(matches!(
            case.check(&short, &case.order),
            Err(ContentError::IndexMisalignment(_))
        ));
    }

    #[test]
    fn test_alignment_rejects_swapped_ids() {
        let case = alignment_case();
        let mut swapped = case.order.clone();
        swapped.swap(0, 1);
        let aligned = case.source.select_rows(&swapped);
        assert!(matches!(
            case.check(&aligned, &swapped),
            Err(ContentError::IndexMisalignment(_))
        ));
    }

    #[test]
    fn test_alignment_rejects_wrong_row_contents() {
        let case = alignment_case();
        // ids map correctly but rows 0 and 1 carry each other's vectors
        let mut shuffled = case.order.clone();
        shuffled.swap(0, 1);
        let aligned = case.source.select_rows(&shuffled);
        assert!(matches!(
            case.check(&aligned, &case.order),
            Err(ContentError::IndexMisalignment(_))
        ));
    }

    #[test]
    fn test_profile_is_weighted_average() {
        let built = interactions();
        let model = ContentModel::fit(&metadata(), &built, &ContentConfig::default()).unwrap();
        let profile = model.profile(1).unwrap();
        let expected: Vec<f64> = {
            let a = model.item_vectors.dense_row(0);
            let b = model.item_vectors.dense_row(1);
            a.iter().zip(&b).map(|(x, y)| 0.75 * x + 0.25 * y).collect()
        };
        for (got, want) in profile.iter().zip(&expected) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_recommend_ranks_by_cosine() {
        let built = interactions();
        let model = ContentModel::fit(&metadata(), &built, &ContentConfig::default()).unwrap();
        let recs = model.recommend(2, 3);
        assert_eq!(recs[0].item_id, 300);
        assert!((recs[0].score - 1.0).abs() < 1e-9);
        assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));

        let recs = model.recommend(1, 2);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].item_id, 100);
    }

    #[test]
    fn test_unknown_user_gets_nothing() {
        let built = interactions();
        let model = ContentModel::fit(&metadata(), &built, &ContentConfig::default()).unwrap();
        assert!(model.recommend(42, 5).is_empty());
        assert!(!model.knows_user(42));
    }

    #[test]
    fn test_zero_profile_scores_zero() {
        let records = vec![watch(1, 100, 0.0), watch(2, 200, 1_000.0)];
        let built = InteractionMatrixBuilder::new(1, SourceWeights::default(), 0.0).build(&records);
        let model = ContentModel::fit(&metadata(), &built, &ContentConfig::default()).unwrap();
        let recs = model.recommend(1, 2);
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.score == 0.0));
        assert_eq!(recs[0].item_id, 100);
    }

    #[test]
    fn test_validate_rejects_mismatched_profiles() {
        let built = interactions();
        let mut model = ContentModel::fit(&metadata(), &built, &ContentConfig::default()).unwrap();
        model.users = vec![1].into();
        assert!(matches!(
            model.validate(),
            Err(ContentError::InconsistentArtifacts(_))
        ));
    }
}
