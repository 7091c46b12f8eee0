pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
pub use services::{
    CfModel, ContentModel, Engine, EngineKind, HybridScorer, InteractionMatrix,
    InteractionMatrixBuilder, Recommender,
};
