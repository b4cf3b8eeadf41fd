//! Category classifier
//!
//! Maps free-text admin category labels onto the closed set of filter keys a
//! page understands. Lookup order: exact match on the normalized label, then
//! ordered regex heuristics (most specific first), then the scheme default.
//! Classification is total: any input yields a key.

use regex::Regex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::LazyLock;

/// Normalize a label: lower-case, strip diacritics, collapse separators
///
/// `"  ŞULUK  MODELLERİ "` -> `"suluk modelleri"`
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;

    for c in raw.chars() {
        if c.is_whitespace() || c == '-' || c == '_' {
            pending_sep = true;
            continue;
        }
        match fold_char(c) {
            Some(folded) => push_char(&mut out, folded, &mut pending_sep),
            None => {
                for lower in c.to_lowercase() {
                    if !is_combining_mark(lower) {
                        push_char(&mut out, lower, &mut pending_sep);
                    }
                }
            }
        }
    }
    out
}

fn push_char(out: &mut String, c: char, pending_sep: &mut bool) {
    if is_combining_mark(c) {
        return;
    }
    if *pending_sep && !out.is_empty() {
        out.push(' ');
    }
    *pending_sep = false;
    out.push(c);
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// Turkish letters and common Latin accents folded to ASCII
fn fold_char(c: char) -> Option<char> {
    let folded = match c {
        'ş' | 'Ş' | 'ś' | 'Ś' => 's',
        'ğ' | 'Ğ' => 'g',
        // Turkish dotted and dotless i both fold to plain i
        'ı' | 'İ' | 'I' | 'î' | 'Î' | 'í' | 'Í' | 'ì' | 'Ì' | 'ï' | 'Ï' => 'i',
        'ö' | 'Ö' | 'ô' | 'Ô' | 'ó' | 'Ó' | 'ò' | 'Ò' | 'õ' | 'Õ' => 'o',
        'ü' | 'Ü' | 'û' | 'Û' | 'ú' | 'Ú' | 'ù' | 'Ù' => 'u',
        'ç' | 'Ç' => 'c',
        'â' | 'Â' | 'á' | 'Á' | 'à' | 'À' | 'ä' | 'Ä' | 'ã' | 'Ã' | 'å' | 'Å' => 'a',
        'é' | 'É' | 'è' | 'È' | 'ê' | 'Ê' | 'ë' | 'Ë' => 'e',
        'ñ' | 'Ñ' => 'n',
        _ => return None,
    };
    Some(folded)
}

/// Compiled lookup tables for one scheme
pub struct CategoryRules<K> {
    exact: HashMap<String, K>,
    heuristics: Vec<(Regex, K)>,
    default: K,
}

impl<K: Copy + Debug> CategoryRules<K> {
    pub fn new(exact: &[(&str, K)], heuristics: &[(&str, K)], default: K) -> Self {
        let exact = exact
            .iter()
            .map(|(label, key)| (normalize(label), *key))
            .collect();

        let heuristics = heuristics
            .iter()
            .filter_map(|(pattern, key)| match Regex::new(pattern) {
                Ok(re) => Some((re, *key)),
                Err(e) => {
                    tracing::error!(pattern, error = %e, "Invalid category heuristic, skipped");
                    None
                }
            })
            .collect();

        Self {
            exact,
            heuristics,
            default,
        }
    }

    pub fn classify(&self, raw: &str) -> K {
        let normalized = normalize(raw);
        if let Some(key) = self.exact.get(&normalized) {
            return *key;
        }
        for (re, key) in &self.heuristics {
            if re.is_match(&normalized) {
                return *key;
            }
        }
        tracing::trace!(label = raw, default = ?self.default, "Category label unclassified");
        self.default
    }
}

/// A page-level category key set
pub trait CategoryScheme: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Returned when nothing matches
    const DEFAULT: Self;

    fn all() -> &'static [Self];

    fn rules() -> &'static CategoryRules<Self>;

    /// Id partition slot for entries created under this key
    fn id_slot(self) -> u8;

    fn classify(raw: &str) -> Self {
        Self::rules().classify(raw)
    }
}

// =============================================================================
// Model page (mezar modelleri)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelCategory {
    Marble,
    Granite,
    Columned,
    Headstone,
    CustomModel,
}

static MODEL_RULES: LazyLock<CategoryRules<ModelCategory>> = LazyLock::new(|| {
    use ModelCategory::*;
    CategoryRules::new(
        &[
            ("Mermer Mezar Modelleri", Marble),
            ("Granit Mezar Modelleri", Granite),
            ("Sütunlu Mezar Modelleri", Columned),
            ("Mezar Şuluk Modelleri", Headstone),
            ("Şuluk Modelleri", Headstone),
            ("Özel Mezar Modelleri", CustomModel),
            ("Özel Tasarım", CustomModel),
        ],
        &[
            (r"\b(suluk|bas ?tasi|headstone)", Headstone),
            (r"\b(sutun|column)", Columned),
            (r"\bgranit", Granite),
            (r"\b(ozel|custom|kisiye)", CustomModel),
            (r"\b(mermer|marble)", Marble),
            (r"\b(mezar|model)", Marble),
        ],
        CustomModel,
    )
});

impl CategoryScheme for ModelCategory {
    const DEFAULT: Self = ModelCategory::CustomModel;

    fn all() -> &'static [Self] {
        use ModelCategory::*;
        &[Marble, Granite, Columned, Headstone, CustomModel]
    }

    fn rules() -> &'static CategoryRules<Self> {
        &MODEL_RULES
    }

    fn id_slot(self) -> u8 {
        match self {
            ModelCategory::Marble => 0,
            ModelCategory::Granite => 1,
            ModelCategory::Columned => 2,
            ModelCategory::Headstone => 3,
            ModelCategory::CustomModel => 4,
        }
    }
}

// =============================================================================
// Accessory page (mezar aksesuarları)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessoryCategory {
    Vase,
    Lantern,
    Planter,
    Lettering,
    Other,
}

static ACCESSORY_RULES: LazyLock<CategoryRules<AccessoryCategory>> = LazyLock::new(|| {
    use AccessoryCategory::*;
    CategoryRules::new(
        &[
            ("Mezar Vazoları", Vase),
            ("Mezar Fenerleri", Lantern),
            ("Mezar Çiçeklikleri", Planter),
            ("Mezar Yazıları", Lettering),
        ],
        &[
            (r"\b(vazo|vase)", Vase),
            (r"\b(fener|kandil|lantern)", Lantern),
            (r"\b(ciceklik|saksi|planter)", Planter),
            (r"\b(yazi|harf|kitabe|letter)", Lettering),
        ],
        Other,
    )
});

impl CategoryScheme for AccessoryCategory {
    const DEFAULT: Self = AccessoryCategory::Other;

    fn all() -> &'static [Self] {
        use AccessoryCategory::*;
        &[Vase, Lantern, Planter, Lettering, Other]
    }

    fn rules() -> &'static CategoryRules<Self> {
        &ACCESSORY_RULES
    }

    fn id_slot(self) -> u8 {
        match self {
            AccessoryCategory::Vase => 5,
            AccessoryCategory::Lantern => 6,
            AccessoryCategory::Planter => 7,
            AccessoryCategory::Lettering => 8,
            AccessoryCategory::Other => 9,
        }
    }
}

/// Id slot for a raw label: accessory keys win when recognised
pub fn id_slot_for_label(raw: &str) -> u8 {
    match AccessoryCategory::classify(raw) {
        AccessoryCategory::Other => ModelCategory::classify(raw).id_slot(),
        accessory => accessory.id_slot(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_turkish() {
        assert_eq!(normalize("ŞULUK MODELLERİ"), "suluk modelleri");
        assert_eq!(normalize("  Mezar   Şuluk\tModelleri "), "mezar suluk modelleri");
        assert_eq!(normalize("Sütunlu_Mezar-Modelleri"), "sutunlu mezar modelleri");
        assert_eq!(normalize("ÇİÇEKLİK"), "ciceklik");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_strips_combining_marks() {
        assert_eq!(normalize("Cafe\u{0301}"), "cafe");
    }

    #[test]
    fn test_exact_and_drifted_labels_agree() {
        let canonical = ModelCategory::classify("Mezar Şuluk Modelleri");
        assert_eq!(canonical, ModelCategory::Headstone);
        assert_eq!(ModelCategory::classify("ŞULUK MODELLERİ"), canonical);
        assert_eq!(ModelCategory::classify("şuluk"), canonical);
    }

    #[test]
    fn test_headstone_beats_generic_model_token() {
        assert_eq!(
            ModelCategory::classify("Yeni Şuluk Model"),
            ModelCategory::Headstone
        );
        assert_eq!(ModelCategory::classify("Yeni Model"), ModelCategory::Marble);
        assert_eq!(
            ModelCategory::classify("granit sütunlu"),
            ModelCategory::Columned
        );
    }

    #[test]
    fn test_unrecognised_falls_back_to_default() {
        assert_eq!(ModelCategory::classify(""), ModelCategory::DEFAULT);
        assert_eq!(ModelCategory::classify("🪦 ???"), ModelCategory::DEFAULT);
        assert_eq!(AccessoryCategory::classify("xyz"), AccessoryCategory::Other);
    }

    #[test]
    fn test_classify_is_total() {
        let inputs = [
            "",
            " ",
            "\u{0301}",
            "İIıi",
            "mezar",
            "VAZO",
            "\0",
            "a-b_c d",
        ];
        for input in inputs {
            assert!(ModelCategory::all().contains(&ModelCategory::classify(input)));
            assert!(AccessoryCategory::all().contains(&AccessoryCategory::classify(input)));
        }
    }

    #[test]
    fn test_id_slot_for_label() {
        assert_eq!(id_slot_for_label("Mezar Vazoları"), AccessoryCategory::Vase.id_slot());
        assert_eq!(
            id_slot_for_label("Granit Mezar Modelleri"),
            ModelCategory::Granite.id_slot()
        );
    }
}
