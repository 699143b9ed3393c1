//! Repository traits describing persistence adapters.
//!
//! The cache rebuilds from the read traits; the queue processor is the only
//! caller of the write traits. Everything else in the process stays away
//! from the store.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{BearRecord, ColorRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateBearParams {
    pub name: String,
    pub size: i64,
    /// Raw color names; the adapter normalizes them and creates any colors
    /// that do not exist yet.
    pub colors: Vec<String>,
}

#[async_trait]
pub trait BearsRepo: Send + Sync {
    /// List bears whose size falls in `min..=max`, ascending by `(size, id)`,
    /// with color associations resolved onto each record.
    async fn list_bears_in_range(&self, min: i64, max: i64) -> Result<Vec<BearRecord>, RepoError>;
}

#[async_trait]
pub trait ColorsRepo: Send + Sync {
    async fn list_all_colors(&self) -> Result<Vec<ColorRecord>, RepoError>;
}

#[async_trait]
pub trait BearsWriteRepo: Send + Sync {
    /// Insert a bear and link it to the given colors, creating missing
    /// colors on the fly. Transactional.
    async fn create_bear(&self, params: CreateBearParams) -> Result<BearRecord, RepoError>;

    /// Rename an existing bear. `RepoError::NotFound` when the id is gone.
    async fn rename_bear(&self, id: i64, name: &str) -> Result<(), RepoError>;

    /// Resize an existing bear. `RepoError::NotFound` when the id is gone.
    async fn resize_bear(&self, id: i64, size: i64) -> Result<(), RepoError>;

    /// Replace the full color set of a bear with the given names,
    /// creating missing colors on the fly. Transactional.
    async fn replace_bear_colors(&self, id: i64, colors: &[String]) -> Result<(), RepoError>;

    /// Delete a bear; its associations go with it.
    async fn delete_bear(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ColorsWriteRepo: Send + Sync {
    /// Create a color, returning its id. When the normalized name already
    /// exists the existing id is returned instead.
    async fn create_color(&self, name: &str, hex: &str) -> Result<i64, RepoError>;

    /// Delete a color by name. Every bear associated with the color is
    /// deleted with it, then the color itself. Transactional.
    async fn delete_color(&self, name: &str) -> Result<(), RepoError>;
}
