//! Merge built-in entries with the active overlay into one read view

use super::classifier::CategoryScheme;
use super::ids::ViewNamespace;
use shared::models::{CatalogEntry, OverlayEntry};
use std::collections::{HashMap, HashSet};

/// Overlay-only flags kept beside the projected entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlayFlags {
    pub featured: bool,
}

/// Unified read view: built-in entries first, then active overlay entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedView {
    entries: Vec<CatalogEntry>,
    /// overlay id -> flags; ids absent here are built-in
    overlay: HashMap<i64, OverlayFlags>,
    /// built-in id -> id of the active imported record standing in for it
    stand_ins: HashMap<i64, i64>,
}

impl MergedView {
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn is_overlay(&self, id: i64) -> bool {
        self.overlay.contains_key(&id)
    }

    /// Entry by id; a built-in id resolves to its imported stand-in
    pub fn find(&self, id: i64) -> Option<&CatalogEntry> {
        let id = self.resolve(id);
        self.entries.iter().find(|e| e.id == id)
    }

    /// Id under which `id` is listed in this view
    pub fn resolve(&self, id: i64) -> i64 {
        self.stand_ins.get(&id).copied().unwrap_or(id)
    }

    pub fn by_category<K: CategoryScheme>(&self, key: K) -> Vec<CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| K::classify(&e.category) == key)
            .cloned()
            .collect()
    }

    /// Featured overlay entries; built-in entries are never featured
    pub fn featured(&self) -> Vec<CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| self.overlay.get(&e.id).is_some_and(|f| f.featured))
            .cloned()
            .collect()
    }

    /// Category listing with overlay ids shifted into the view's namespace
    pub fn page_entries<K: CategoryScheme>(&self, ns: ViewNamespace, key: K) -> Vec<CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| K::classify(&e.category) == key)
            .map(|e| {
                let mut entry = e.clone();
                if self.is_overlay(e.id) {
                    entry.id = ns.apparent_id(e.id);
                }
                entry
            })
            .collect()
    }
}

/// Build the merged view
///
/// Built-in entries are emitted in order unless an imported overlay record
/// (matched by `source_id`) stands in for them. The built-in id stays
/// resolvable to that record through [`MergedView::find`]. Inactive overlay
/// records are skipped, and so is a built-in entry whose stand-in is
/// inactive. No id dedup happens here; ids are kept unique at write time.
pub fn merge(builtin: &[CatalogEntry], overlay: &[OverlayEntry]) -> MergedView {
    let shadowed: HashSet<i64> = overlay.iter().filter_map(|o| o.source_id).collect();

    let mut entries: Vec<CatalogEntry> = builtin
        .iter()
        .filter(|e| !shadowed.contains(&e.id))
        .cloned()
        .collect();
    let mut flags = HashMap::new();
    let mut stand_ins = HashMap::new();

    for record in overlay.iter().filter(|o| o.is_active) {
        if let Some(source) = record.source_id {
            stand_ins.insert(source, record.id());
        }
        entries.push(record.entry.clone());
        flags.insert(
            record.id(),
            OverlayFlags {
                featured: record.featured,
            },
        );
    }

    MergedView {
        entries,
        overlay: flags,
        stand_ins,
    }
}
