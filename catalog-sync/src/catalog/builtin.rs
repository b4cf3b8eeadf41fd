//! Built-in catalog compiled into the application

use shared::models::{CatalogEntry, PRICE_ON_REQUEST, SpecField};
use std::sync::{Arc, LazyLock};

/// Built-in ids stay below this bound; overlay partitions start above it
pub const BUILTIN_ID_CEILING: i64 = 1_000;

static BUILTIN: LazyLock<Arc<[CatalogEntry]>> = LazyLock::new(|| {
    vec![
        entry(1, "MM-101", "Beyaz Mermer Mezar", "Mermer Mezar Modelleri", "Malzeme", "Afyon Beyaz Mermer"),
        entry(2, "MM-102", "Kapaklı Mermer Mezar", "Mermer Mezar Modelleri", "Malzeme", "Mermer"),
        entry(3, "GR-201", "Siyah Granit Mezar", "Granit Mezar Modelleri", "Malzeme", "Absolute Black Granit"),
        entry(4, "GR-202", "Kırmızı Granit Mezar", "Granit Mezar Modelleri", "Malzeme", "Granit"),
        entry(5, "ST-301", "Sütunlu Aile Mezarı", "Sütunlu Mezar Modelleri", "Sütun", "4 adet"),
        entry(6, "SL-401", "Oval Şuluk", "Mezar Şuluk Modelleri", "Ölçü", "60 x 40 cm"),
        entry(7, "SL-402", "Kitap Şuluk", "Mezar Şuluk Modelleri", "Ölçü", "50 x 35 cm"),
        entry(8, "AK-501", "Mermer Vazo", "Mezar Vazoları", "Malzeme", "Mermer"),
        entry(9, "AK-502", "Bronz Mezar Feneri", "Mezar Fenerleri", "Malzeme", "Bronz"),
    ]
    .into()
});

fn entry(
    id: i64,
    code: &str,
    title: &str,
    category: &str,
    spec_label: &str,
    spec_value: &str,
) -> CatalogEntry {
    let image = format!("/images/catalog/{}.jpg", code.to_lowercase());
    CatalogEntry {
        id,
        product_code: code.to_string(),
        title: title.to_string(),
        price: PRICE_ON_REQUEST.to_string(),
        images: vec![image.clone()],
        image,
        description: None,
        category: category.to_string(),
        specifications: vec![SpecField {
            label: spec_label.to_string(),
            value: spec_value.to_string(),
        }],
    }
}

/// The built-in list, shared without copying
pub fn builtin_catalog() -> Arc<[CatalogEntry]> {
    BUILTIN.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_ids_unique_and_below_ceiling() {
        let catalog = builtin_catalog();
        let ids: HashSet<i64> = catalog.iter().map(|e| e.id).collect();
        assert_eq!(ids.len(), catalog.len());
        assert!(ids.iter().all(|id| *id > 0 && *id < BUILTIN_ID_CEILING));
    }
}
