//! Data models
//!
//! All IDs are `i64`. Overlay records serialize as camelCase JSON.

pub mod catalog;

// Re-exports
pub use catalog::*;
