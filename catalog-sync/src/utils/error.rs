//! 统一错误处理
//!
//! Reads never fail: storage problems degrade to an empty or stale view.
//! Writes return [`CatalogError`] so the caller can show a message; the
//! failure has already been logged when it reaches them.

use crate::db::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Overlay entry not found: {0}")]
    NotFound(i64),

    #[error("Id collision: {0:?}")]
    IdCollision(Vec<i64>),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
