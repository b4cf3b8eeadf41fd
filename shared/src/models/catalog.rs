//! Catalog Model
//!
//! Built-in entries are compiled into the application and never change at
//! runtime. Overlay entries are admin-editable records persisted in the
//! key-value store and layered on top of the built-in list.

use serde::{Deserialize, Deserializer, Serialize};

/// Price placeholder shown instead of a figure ("ask for price")
pub const PRICE_ON_REQUEST: &str = "Fiyat Sorunuz";

/// Structured specification row (e.g. "Malzeme" -> "Mermer")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecField {
    pub label: String,
    pub value: String,
}

/// Catalog entry, the common shape every read view is projected to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: i64,
    pub product_code: String,
    pub title: String,
    /// Free text, may be [`PRICE_ON_REQUEST`]
    pub price: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-text category label, classified per page
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specifications: Vec<SpecField>,
}

impl CatalogEntry {
    /// Whether the price field carries an actual figure
    pub fn has_listed_price(&self) -> bool {
        let price = self.price.trim();
        !price.is_empty() && price != PRICE_ON_REQUEST
    }
}

/// Overlay entry (admin-managed, persisted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayEntry {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub featured: bool,
    /// Unix millis
    pub created_at: i64,
    /// Unix millis
    pub updated_at: i64,
    /// Built-in entry this record was imported from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<i64>,
}

fn default_true() -> bool {
    true
}

impl OverlayEntry {
    pub fn id(&self) -> i64 {
        self.entry.id
    }

    /// Stamp `updated_at`, strictly after the previous value
    pub fn touch(&mut self, now: i64) {
        self.updated_at = now.max(self.updated_at + 1);
    }
}

/// Create overlay entry payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayCreate {
    pub product_code: String,
    pub title: String,
    pub price: Option<String>,
    pub image: Option<String>,
    pub images: Option<Vec<String>>,
    pub description: Option<String>,
    pub category: String,
    pub specifications: Option<Vec<SpecField>>,
    pub is_active: Option<bool>,
    pub featured: Option<bool>,
}

/// A field that is present deserializes to `Some`, even when it is `null`
fn present_field<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Update overlay entry payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayUpdate {
    pub product_code: Option<String>,
    pub title: Option<String>,
    pub price: Option<String>,
    pub image: Option<String>,
    pub images: Option<Vec<String>>,
    /// `None` keeps the description, `Some(None)` (JSON `null`) clears it
    #[serde(
        default,
        deserialize_with = "present_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub specifications: Option<Vec<SpecField>>,
    pub is_active: Option<bool>,
    pub featured: Option<bool>,
}

impl OverlayUpdate {
    /// Apply the present fields onto `target`
    pub fn apply_to(self, target: &mut OverlayEntry) {
        let entry = &mut target.entry;
        if let Some(v) = self.product_code {
            entry.product_code = v;
        }
        if let Some(v) = self.title {
            entry.title = v;
        }
        if let Some(v) = self.price {
            entry.price = v;
        }
        if let Some(v) = self.image {
            entry.image = v;
        }
        if let Some(v) = self.images {
            entry.images = v;
        }
        if let Some(v) = self.description {
            entry.description = v;
        }
        if let Some(v) = self.category {
            entry.category = v;
        }
        if let Some(v) = self.specifications {
            entry.specifications = v;
        }
        if let Some(v) = self.is_active {
            target.is_active = v;
        }
        if let Some(v) = self.featured {
            target.featured = v;
        }
    }
}
