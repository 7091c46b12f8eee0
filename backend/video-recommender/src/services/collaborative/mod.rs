// ============================================
// Collaborative-Filtering Engine
// ============================================
//
// fit:
//   user×item strengths → item×user → BM25 → user×item → implicit ALS
//
// recommend:
//   scores = item_factors · user_factor
//   items stored in the user's training row are masked to -inf
//   top-N by score, ties to the lower item index
//
// The training matrix and both index mappings travel with the factors so a
// loaded model can mask seen items without the raw interaction log.

mod als;
mod bm25;

pub use als::{AlsParams, LatentFactors};
pub use bm25::bm25_weight;

use crate::config::{CfConfig, ConfigError};
use crate::models::{ScoredItem, UserId};
use crate::services::interactions::InteractionMatrix;
use crate::utils::top_n;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CfError {
    #[error("Invalid CF configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Inconsistent CF artifacts: {0}")]
    InconsistentArtifacts(String),
}

pub type Result<T> = std::result::Result<T, CfError>;

impl From<&CfConfig> for AlsParams {
    fn from(config: &CfConfig) -> Self {
        AlsParams {
            factors: config.factors,
            regularization: config.regularization,
            iterations: config.iterations,
            alpha: config.alpha,
            seed: config.seed,
        }
    }
}

/// Trained latent-factor model with its training interactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfModel {
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub params: CfConfig,
    user_factors: Array2<f64>,
    item_factors: Array2<f64>,
    interactions: InteractionMatrix,
}

impl CfModel {
    pub fn fit(interactions: &InteractionMatrix, config: &CfConfig) -> Result<Self> {
        config.validate()?;

        let item_users = interactions.matrix.transpose();
        let weighted = bm25_weight(&item_users, config.bm25_k1, config.bm25_b).transpose();
        debug!(nnz = weighted.nnz(), "Applied BM25 weighting");

        let LatentFactors {
            user_factors,
            item_factors,
        } = als::train(&weighted, &AlsParams::from(config));

        info!(
            users = interactions.n_users(),
            items = interactions.n_items(),
            factors = config.factors,
            iterations = config.iterations,
            "Fitted CF model"
        );

        Ok(Self {
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            params: config.clone(),
            user_factors,
            item_factors,
            interactions: interactions.clone(),
        })
    }

    pub fn interactions(&self) -> &InteractionMatrix {
        &self.interactions
    }

    pub fn knows_user(&self, user_id: UserId) -> bool {
        self.interactions.users.contains(&user_id)
    }

    /// Top-N unseen items for the user.
    pub fn recommend(&self, user_id: UserId, n: usize) -> Vec<ScoredItem> {
        self.recommend_with(user_id, n, true)
    }

    /// Top-N items; with `exclude_seen`, items in the user's training row
    /// never surface, so the list can be shorter than `n`.
    pub fn recommend_with(&self, user_id: UserId, n: usize, exclude_seen: bool) -> Vec<ScoredItem> {
        let Some(u) = self.interactions.users.position(&user_id) else {
            debug!(user_id, "User not in CF index");
            return Vec::new();
        };

        let mut scores = self.item_factors.dot(&self.user_factors.row(u)).to_vec();
        if exclude_seen {
            for (i, _) in self.interactions.matrix.row_iter(u) {
                scores[i] = f64::NEG_INFINITY;
            }
        }

        top_n(&scores, n)
            .into_iter()
            .filter_map(|(i, score)| {
                self.interactions
                    .items
                    .id_at(i)
                    .map(|item_id| ScoredItem { item_id, score })
            })
            .collect()
    }

    /// Factor shapes agree with the stored index mappings. Run after every load.
    pub fn validate(&self) -> Result<()> {
        if !self.interactions.is_consistent() {
            return Err(CfError::InconsistentArtifacts(
                "interaction matrix does not match its index mappings".to_string(),
            ));
        }
        if self.user_factors.nrows() != self.interactions.n_users()
            || self.item_factors.nrows() != self.interactions.n_items()
        {
            return Err(CfError::InconsistentArtifacts(format!(
                "factors cover {} users and {} items, index has {} and {}",
                self.user_factors.nrows(),
                self.item_factors.nrows(),
                self.interactions.n_users(),
                self.interactions.n_items()
            )));
        }
        if self.user_factors.ncols() != self.item_factors.ncols() {
            return Err(CfError::InconsistentArtifacts(format!(
                "user rank {} != item rank {}",
                self.user_factors.ncols(),
                self.item_factors.ncols()
            )));
        }
        Ok(())
    }
}
