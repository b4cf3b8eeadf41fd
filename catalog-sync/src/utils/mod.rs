//! 工具模块 - 错误类型和日志

pub mod error;
pub mod logger;

pub use error::{CatalogError, CatalogResult};
