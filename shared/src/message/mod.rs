//! 目录变更通知类型
//!
//! Typed replacement for string-named UI events: every signal that means
//! "re-read the catalog" is a [`ChangeChannel`] with an optional payload.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Notification channels. All four are equivalent refresh triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeChannel {
    /// General "catalog updated"
    CatalogUpdated,
    /// Re-run derived state even if the data reference is unchanged
    ForceRefresh,
    /// A single entry changed
    ItemChanged,
    /// Another session wrote to the shared store
    StorageChanged,
}

impl ChangeChannel {
    pub const ALL: [ChangeChannel; 4] = [
        ChangeChannel::CatalogUpdated,
        ChangeChannel::ForceRefresh,
        ChangeChannel::ItemChanged,
        ChangeChannel::StorageChanged,
    ];
}

impl fmt::Display for ChangeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeChannel::CatalogUpdated => write!(f, "catalog_updated"),
            ChangeChannel::ForceRefresh => write!(f, "force_refresh"),
            ChangeChannel::ItemChanged => write!(f, "item_changed"),
            ChangeChannel::StorageChanged => write!(f, "storage_changed"),
        }
    }
}

/// 变更事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    CatalogUpdated,
    ForceRefresh,
    ItemChanged { id: i64 },
    StorageChanged { key: String },
}

impl ChangeEvent {
    pub fn channel(&self) -> ChangeChannel {
        match self {
            ChangeEvent::CatalogUpdated => ChangeChannel::CatalogUpdated,
            ChangeEvent::ForceRefresh => ChangeChannel::ForceRefresh,
            ChangeEvent::ItemChanged { .. } => ChangeChannel::ItemChanged,
            ChangeEvent::StorageChanged { .. } => ChangeChannel::StorageChanged,
        }
    }

    /// Affected entry id, if the event names one
    pub fn item_id(&self) -> Option<i64> {
        match self {
            ChangeEvent::ItemChanged { id } => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_channel_mapping() {
        assert_eq!(
            ChangeEvent::ItemChanged { id: 3 }.channel(),
            ChangeChannel::ItemChanged
        );
        assert_eq!(ChangeEvent::ItemChanged { id: 3 }.item_id(), Some(3));
        assert_eq!(ChangeEvent::ForceRefresh.item_id(), None);
    }

    #[test]
    fn test_event_tagged_json() {
        let json = serde_json::to_string(&ChangeEvent::ItemChanged { id: 9 }).unwrap();
        assert_eq!(json, r#"{"type":"item_changed","id":9}"#);
        assert_eq!(ChangeChannel::StorageChanged.to_string(), "storage_changed");
    }
}
