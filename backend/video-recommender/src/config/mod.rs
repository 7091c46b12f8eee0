use crate::services::interactions::SourceWeights;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment error: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub matrix: MatrixConfig,
    pub cf: CfConfig,
    pub content: ContentConfig,
    pub hybrid: HybridConfig,
    pub paths: PathsConfig,
}

/// Interaction matrix construction (`MATRIX_*`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixConfig {
    #[serde(default = "default_min_interactions")]
    pub min_interactions: usize,
    #[serde(default = "default_big_pool_weight")]
    pub big_pool_weight: f64,
    #[serde(default = "default_small_pool_weight")]
    pub small_pool_weight: f64,
    /// Per-second exponential decay rate
    #[serde(default = "default_time_decay")]
    pub time_decay: f64,
}

/// Latent-factor model (`CF_*`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfConfig {
    #[serde(default = "default_factors")]
    pub factors: usize,
    #[serde(default = "default_regularization")]
    pub regularization: f64,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Confidence scale: c = 1 + alpha * w
    #[serde(default = "default_cf_alpha")]
    pub alpha: f64,
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Term-weight content model (`CONTENT_*`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    #[serde(default = "default_ngram_min")]
    pub ngram_min: usize,
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,
}

/// Score blending and evaluation (`HYBRID_*`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridConfig {
    #[serde(default = "default_hybrid_alpha")]
    pub alpha: f64,
    #[serde(default = "default_candidate_k")]
    pub cf_k: usize,
    #[serde(default = "default_candidate_k")]
    pub cb_k: usize,
    #[serde(default = "default_output_size")]
    pub output_size: usize,
    #[serde(default = "default_eval_k")]
    pub eval_k: usize,
}

/// Input and artifact locations (`PATHS_*`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_interactions_path")]
    pub interactions: PathBuf,
    #[serde(default = "default_metadata_path")]
    pub metadata: PathBuf,
    #[serde(default = "default_truth_path")]
    pub truth: PathBuf,
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let config = Config {
            matrix: envy::prefixed("MATRIX_").from_env()?,
            cf: envy::prefixed("CF_").from_env()?,
            content: envy::prefixed("CONTENT_").from_env()?,
            hybrid: envy::prefixed("HYBRID_").from_env()?,
            paths: envy::prefixed("PATHS_").from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.matrix.validate()?;
        self.cf.validate()?;
        self.content.validate()?;
        self.hybrid.validate()
    }
}

impl MatrixConfig {
    pub fn source_weights(&self) -> SourceWeights {
        SourceWeights {
            big: self.big_pool_weight,
            small: self.small_pool_weight,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_decay < 0.0 || !self.time_decay.is_finite() {
            return Err(invalid("MATRIX_TIME_DECAY", format!("{}", self.time_decay)));
        }
        if self.big_pool_weight < 0.0 || self.small_pool_weight < 0.0 {
            return Err(invalid("MATRIX_*_POOL_WEIGHT", "pool weights must be non-negative"));
        }
        Ok(())
    }
}

impl CfConfig {
    pub fn validate(&self) -> Result<()> {
        if self.factors == 0 {
            return Err(invalid("CF_FACTORS", "must be at least 1"));
        }
        if self.regularization < 0.0 || !self.regularization.is_finite() {
            return Err(invalid("CF_REGULARIZATION", format!("{}", self.regularization)));
        }
        if self.alpha < 0.0 || !self.alpha.is_finite() {
            return Err(invalid("CF_ALPHA", format!("{}", self.alpha)));
        }
        if self.bm25_k1 < 0.0 || !self.bm25_k1.is_finite() {
            return Err(invalid("CF_BM25_K1", format!("{}", self.bm25_k1)));
        }
        if !(0.0..=1.0).contains(&self.bm25_b) {
            return Err(invalid("CF_BM25_B", "must be in [0, 1]"));
        }
        Ok(())
    }
}

impl ContentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ngram_min == 0 || self.ngram_min > self.ngram_max {
            return Err(invalid(
                "CONTENT_NGRAM_MIN",
                format!("bad n-gram window ({}, {})", self.ngram_min, self.ngram_max),
            ));
        }
        if self.max_features == 0 {
            return Err(invalid("CONTENT_MAX_FEATURES", "must be at least 1"));
        }
        Ok(())
    }
}

impl HybridConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(invalid("HYBRID_ALPHA", "must be in [0, 1]"));
        }
        if self.output_size == 0 || self.eval_k == 0 {
            return Err(invalid("HYBRID_OUTPUT_SIZE", "output size and k must be positive"));
        }
        Ok(())
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            min_interactions: default_min_interactions(),
            big_pool_weight: default_big_pool_weight(),
            small_pool_weight: default_small_pool_weight(),
            time_decay: default_time_decay(),
        }
    }
}

impl Default for CfConfig {
    fn default() -> Self {
        Self {
            factors: default_factors(),
            regularization: default_regularization(),
            iterations: default_iterations(),
            alpha: default_cf_alpha(),
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            seed: default_seed(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
            ngram_min: default_ngram_min(),
            ngram_max: default_ngram_max(),
        }
    }
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            alpha: default_hybrid_alpha(),
            cf_k: default_candidate_k(),
            cb_k: default_candidate_k(),
            output_size: default_output_size(),
            eval_k: default_eval_k(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            interactions: default_interactions_path(),
            metadata: default_metadata_path(),
            truth: default_truth_path(),
            model_dir: default_model_dir(),
        }
    }
}

fn default_min_interactions() -> usize {
    5
}

fn default_big_pool_weight() -> f64 {
    2.0
}

fn default_small_pool_weight() -> f64 {
    1.0
}

fn default_time_decay() -> f64 {
    1e-7
}

fn default_factors() -> usize {
    64
}

fn default_regularization() -> f64 {
    0.05
}

fn default_iterations() -> usize {
    20
}

fn default_cf_alpha() -> f64 {
    40.0
}

fn default_bm25_k1() -> f64 {
    100.0
}

fn default_bm25_b() -> f64 {
    0.8
}

fn default_seed() -> u64 {
    42
}

fn default_max_features() -> usize {
    5000
}

fn default_ngram_min() -> usize {
    1
}

fn default_ngram_max() -> usize {
    1
}

fn default_hybrid_alpha() -> f64 {
    0.5
}

fn default_candidate_k() -> usize {
    30
}

fn default_output_size() -> usize {
    10
}

fn default_eval_k() -> usize {
    10
}

fn default_interactions_path() -> PathBuf {
    PathBuf::from("data/interactions.jsonl")
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("data/item_metadata.jsonl")
}

fn default_truth_path() -> PathBuf {
    PathBuf::from("data/small_matrix.jsonl")
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}
