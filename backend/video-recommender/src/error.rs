use crate::config::ConfigError;
use crate::services::{CfError, ContentError};
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("CF engine error: {0}")]
    Cf(#[from] CfError),

    #[error("Content engine error: {0}")]
    Content(#[from] ContentError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
