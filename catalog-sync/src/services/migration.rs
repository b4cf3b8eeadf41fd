//! One-time overlay migrations
//!
//! Each operation is guarded by a persisted [`MigrationFlag`]. The flag is set
//! only after the overlay write succeeded, and the operations are themselves
//! idempotent (imports match on `source_id`, seeds on `product_code`), so a
//! lost flag never produces duplicates.

use super::catalog_service::{CatalogService, Notify};
use crate::catalog::IdPartition;
use crate::catalog::classifier::id_slot_for_label;
use crate::db::MigrationFlag;
use crate::utils::CatalogResult;
use shared::models::{CatalogEntry, OverlayEntry, SpecField};
use shared::util::now_millis;

/// Outcome of [`MigrationRunner::run_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub imported: usize,
    pub seeded: usize,
}

pub struct MigrationRunner<'a> {
    service: &'a CatalogService,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(service: &'a CatalogService) -> Self {
        Self { service }
    }

    /// Run every pending migration; failures are logged and skipped
    pub fn run_all(&self, seed_demo_content: bool) -> MigrationReport {
        let mut report = MigrationReport::default();

        match self.import_static_catalog() {
            Ok(n) => report.imported = n,
            Err(e) => tracing::error!(error = %e, "Static catalog import failed"),
        }

        if seed_demo_content {
            match self.seed_demo_content() {
                Ok(n) => report.seeded = n,
                Err(e) => tracing::error!(error = %e, "Demo content seeding failed"),
            }
        }

        report
    }

    /// Copy the built-in catalog into the overlay so admins can edit it
    ///
    /// Copies get fresh ids from the category partition of their label and
    /// stand in for their built-in original in the merged view.
    pub fn import_static_catalog(&self) -> CatalogResult<usize> {
        let store = self.service.store();
        if store.flag(MigrationFlag::StaticCatalogImported) {
            tracing::debug!("Static catalog already imported, skipping");
            return Ok(0);
        }

        let builtin = self.service.builtin().to_vec();
        let imported = self.service.transact(Notify::Suppress, |txn| {
            let already = txn.imported_sources();
            let now = now_millis();
            let mut count = 0;
            for original in builtin.iter().filter(|e| !already.contains(&e.id)) {
                let partition = IdPartition::Category(id_slot_for_label(&original.category));
                let id = txn.allocate(partition);
                txn.insert(OverlayEntry {
                    entry: CatalogEntry {
                        id,
                        ..original.clone()
                    },
                    is_active: true,
                    featured: false,
                    created_at: now,
                    updated_at: now,
                    source_id: Some(original.id),
                });
                count += 1;
            }
            Ok(count)
        })?;

        store.set_flag(MigrationFlag::StaticCatalogImported)?;
        tracing::info!(imported, "Static catalog imported into overlay");
        Ok(imported)
    }

    /// Insert the demo entries shown on a fresh install
    pub fn seed_demo_content(&self) -> CatalogResult<usize> {
        let store = self.service.store();
        if store.flag(MigrationFlag::DemoContentSeeded) {
            tracing::debug!("Demo content already seeded, skipping");
            return Ok(0);
        }

        let seeded = self.service.transact(Notify::Suppress, |txn| {
            let now = now_millis();
            let mut count = 0;
            for demo in demo_entries() {
                if txn.contains_code(&demo.product_code) {
                    continue;
                }
                let featured = count == 0;
                let id = txn.allocate(IdPartition::Free);
                txn.insert(OverlayEntry {
                    entry: CatalogEntry { id, ..demo },
                    is_active: true,
                    featured,
                    created_at: now,
                    updated_at: now,
                    source_id: None,
                });
                count += 1;
            }
            Ok(count)
        })?;

        store.set_flag(MigrationFlag::DemoContentSeeded)?;
        tracing::info!(seeded, "Demo content seeded");
        Ok(seeded)
    }
}

fn demo_entries() -> Vec<CatalogEntry> {
    let demo = |code: &str, title: &str, price: &str, category: &str| CatalogEntry {
        id: 0,
        product_code: code.to_string(),
        title: title.to_string(),
        price: price.to_string(),
        image: format!("/images/demo/{}.jpg", code.to_lowercase()),
        images: vec![],
        description: Some("Örnek ürün".to_string()),
        category: category.to_string(),
        specifications: vec![SpecField {
            label: "Teslim".to_string(),
            value: "15 gün".to_string(),
        }],
    };
    vec![
        demo("DEMO-001", "Özel Tasarım Aile Mezarı", "Fiyat Sorunuz", "Özel Mezar Modelleri"),
        demo("DEMO-002", "Granit Kitap Şuluk", "8.500 TL", "ŞULUK MODELLERİ"),
        demo("DEMO-003", "Pirinç Mezar Feneri", "1.200 TL", "Mezar Fenerleri"),
    ]
}

impl CatalogService {
    /// Run pending one-time migrations for this store
    pub fn run_migrations(&self, seed_demo_content: bool) -> MigrationReport {
        MigrationRunner::new(self).run_all(seed_demo_content)
    }
}
