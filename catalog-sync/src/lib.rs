//! Catalog Sync - 内置商品目录与管理员覆盖层的同步层
//!
//! # 架构概述
//!
//! - **存储** (`db`): redb 键值存储，保存覆盖层和一次性迁移标记
//! - **目录** (`catalog`): 合并视图、短时缓存、ID 分配、分类识别
//! - **消息** (`message`): 类型化的变更通知总线
//! - **服务** (`services`): 对外读写 API 与迁移
//!
//! # 数据流
//!
//! ```text
//! MigrationRunner ──▶ PersistentStore ⇄ merge ──▶ ReadCache ──▶ readers
//!
//! admin write ──▶ PersistentStore ──▶ ReadCache::invalidate ──▶ ChangeBus
//!                        │                                        │
//!                        └── StorageEvent ──▶ other sessions      └──▶ subscribers re-read
//! ```

pub mod catalog;
pub mod core;
pub mod db;
pub mod message;
pub mod services;
pub mod utils;

// Re-export 公共类型
pub use catalog::{
    AccessoryCategory, CategoryScheme, IdPartition, MergedView, ModelCategory, ReservedId,
    ViewNamespace,
};
pub use self::core::Config;
pub use db::{MigrationFlag, PersistentStore, SessionId};
pub use message::{ChangeBus, ChangeChannel, ChangeEvent, Subscription};
pub use services::{CatalogService, MigrationReport, MigrationRunner, Notify};
pub use utils::{CatalogError, CatalogResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
