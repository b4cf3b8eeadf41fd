//! 服务层
//!
//! - [`CatalogService`]: read views, admin writes, change subscriptions
//! - [`MigrationRunner`]: one-time static import and demo seeding

pub mod catalog_service;
pub mod migration;

pub use catalog_service::{CatalogService, Notify};
pub use migration::{MigrationReport, MigrationRunner};
