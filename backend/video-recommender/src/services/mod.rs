pub mod collaborative;
pub mod content;
pub mod evaluation;
pub mod generation;
pub mod hybrid;
pub mod interactions;

pub use collaborative::{CfError, CfModel};
pub use content::{ContentError, ContentModel};
pub use evaluation::{evaluate, grid_search, EvaluationReport, GridSearchReport, GridSpec};
pub use generation::generate;
pub use hybrid::{blend, BlendParams, HybridScorer};
pub use interactions::{InteractionMatrix, InteractionMatrixBuilder, SourceWeights};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{ItemMetadata, ScoredItem, UserId};
use crate::storage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Cf,
    Content,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Cf => "cf",
            EngineKind::Content => "content",
        }
    }

    /// Default artifact file name under the model directory.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            EngineKind::Cf => "cf_model.json",
            EngineKind::Content => "content_model.json",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cf" | "als" => Ok(EngineKind::Cf),
            "content" | "cb" => Ok(EngineKind::Content),
            other => Err(AppError::InvalidInput(format!("unknown model type: {}", other))),
        }
    }
}

/// Read-only "top-N items for a user" capability shared by both engines.
///
/// Implementations return items in descending score order with unique ids,
/// and an empty list for users they have never seen.
#[cfg_attr(test, mockall::automock)]
pub trait Recommender: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn knows_user(&self, user_id: UserId) -> bool;

    fn recommend(&self, user_id: UserId, n: usize) -> Vec<ScoredItem>;
}

impl Recommender for CfModel {
    fn kind(&self) -> EngineKind {
        EngineKind::Cf
    }

    fn knows_user(&self, user_id: UserId) -> bool {
        CfModel::knows_user(self, user_id)
    }

    fn recommend(&self, user_id: UserId, n: usize) -> Vec<ScoredItem> {
        self.recommend_with(user_id, n, true)
    }
}

impl Recommender for ContentModel {
    fn kind(&self) -> EngineKind {
        EngineKind::Content
    }

    fn knows_user(&self, user_id: UserId) -> bool {
        ContentModel::knows_user(self, user_id)
    }

    fn recommend(&self, user_id: UserId, n: usize) -> Vec<ScoredItem> {
        ContentModel::recommend(self, user_id, n)
    }
}

/// A trained engine as persisted on disk. Built by `train`, served after
/// `load`; serving never retrains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", content = "artifact", rename_all = "snake_case")]
pub enum Engine {
    Cf(CfModel),
    Content(ContentModel),
}

impl Engine {
    pub fn train(
        kind: EngineKind,
        interactions: &InteractionMatrix,
        metadata: &[ItemMetadata],
        config: &Config,
    ) -> Result<Self> {
        let engine = match kind {
            EngineKind::Cf => Engine::Cf(CfModel::fit(interactions, &config.cf)?),
            EngineKind::Content => {
                Engine::Content(ContentModel::fit(metadata, interactions, &config.content)?)
            }
        };
        info!(engine = %kind, model_id = %engine.model_id(), "Trained engine");
        Ok(engine)
    }

    pub fn model_id(&self) -> Uuid {
        match self {
            Engine::Cf(model) => model.model_id,
            Engine::Content(model) => model.model_id,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Engine::Cf(model) => model.validate()?,
            Engine::Content(model) => model.validate()?,
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        storage::save_json_atomic(path, self)?;
        Ok(())
    }

    /// Load and check that every part of the artifact agrees on its indices.
    pub fn load(path: &Path) -> Result<Self> {
        let engine: Engine = storage::load_json(path)?;
        engine.validate()?;
        info!(
            engine = %engine.kind(),
            model_id = %engine.model_id(),
            "Loaded engine"
        );
        Ok(engine)
    }

    pub fn as_recommender(&self) -> &dyn Recommender {
        match self {
            Engine::Cf(model) => model,
            Engine::Content(model) => model,
        }
    }
}

impl Recommender for Engine {
    fn kind(&self) -> EngineKind {
        self.as_recommender().kind()
    }

    fn knows_user(&self, user_id: UserId) -> bool {
        self.as_recommender().knows_user(user_id)
    }

    fn recommend(&self, user_id: UserId, n: usize) -> Vec<ScoredItem> {
        self.as_recommender().recommend(user_id, n)
    }
}
