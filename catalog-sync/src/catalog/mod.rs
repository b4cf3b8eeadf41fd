//! Catalog read side: built-in list, merge, cache, ids, classification

pub mod builtin;
pub mod cache;
pub mod classifier;
pub mod ids;
pub mod merger;

pub use builtin::{BUILTIN_ID_CEILING, builtin_catalog};
pub use cache::{DEFAULT_TTL, ReadCache};
pub use classifier::{AccessoryCategory, CategoryScheme, ModelCategory, normalize};
pub use ids::{IdAllocator, IdPartition, ReservedId, ViewNamespace};
pub use merger::{MergedView, OverlayFlags, merge};
