//! Attribute key normalization
//!
//! Product attributes reach us under several legacy spellings. Before a record is
//! sent to the remote catalog every known alias is rewritten to its canonical key.
//! Normalization is idempotent: canonical keys never appear on the alias side of
//! the table.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::constants::attributes::{VARIANT_SET, VARIANT_TYPE};
use crate::models::ProductRecord;

/// Known-malformed attribute keys and their canonical spelling.
///
/// When several aliases of one canonical key are present, the canonical key wins,
/// then the alias listed first.
pub const KEY_ALIASES: &[(&str, &str)] = &[
    ("variant_set", VARIANT_SET),
    ("Variantset", VARIANT_SET),
    ("VariantSet", VARIANT_SET),
    ("variantset", VARIANT_SET),
    ("variant_type", VARIANT_TYPE),
    ("VariantType", VARIANT_TYPE),
    ("EAN", "ean"),
    ("ean_code", "ean"),
    ("eanCode", "ean"),
    ("manufacturer_name", "manufacturer"),
    ("Manufacturer", "manufacturer"),
    ("manufacturer_part_number", "manufacturerPartNumber"),
    ("mpn", "manufacturerPartNumber"),
    ("weight_kg", "weight"),
    ("Weight", "weight"),
    ("tax_rate", "taxRate"),
    ("vat_rate", "taxRate"),
    ("customs_tariff_number", "customsTariffNumber"),
    ("country_of_origin", "countryOfOrigin"),
];

/// Canonical spelling for `key`, or `key` itself when it is not a known alias.
pub fn canonical_key(key: &str) -> &str {
    KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(key)
}

/// Rewrites every known alias in `attributes` to its canonical key.
pub fn normalize_attributes(attributes: &mut BTreeMap<String, Value>) {
    for (alias, canonical) in KEY_ALIASES {
        if let Some(value) = attributes.remove(*alias) {
            attributes.entry((*canonical).to_string()).or_insert(value);
        }
    }
}

/// Removes variant-set membership, whichever spelling it arrived under.
pub fn strip_variant_metadata(attributes: &mut BTreeMap<String, Value>) {
    attributes.remove(VARIANT_SET);
    for (alias, canonical) in KEY_ALIASES {
        if *canonical == VARIANT_SET {
            attributes.remove(*alias);
        }
    }
}

/// Normalizes a single product node. Variants are left untouched; each is
/// normalized when its own step runs.
pub fn normalize_record(record: &mut ProductRecord, strip_variant_set: bool) {
    normalize_attributes(&mut record.attributes);
    if strip_variant_set {
        strip_variant_metadata(&mut record.attributes);
    }
}

/// Looks up an attribute by canonical key, falling back to its aliases on records
/// that have not been normalized yet.
pub fn find_attribute<'a>(
    attributes: &'a BTreeMap<String, Value>,
    canonical: &str,
) -> Option<&'a Value> {
    attributes.get(canonical).or_else(|| {
        KEY_ALIASES
            .iter()
            .filter(|(_, target)| *target == canonical)
            .find_map(|(alias, _)| attributes.get(*alias))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn rewrites_legacy_keys() {
        let mut map = attrs(&[
            ("EAN", json!("4006381333931")),
            ("weight_kg", json!(1.2)),
            ("color", json!("red")),
        ]);
        normalize_attributes(&mut map);

        assert_eq!(
            map,
            attrs(&[
                ("ean", json!("4006381333931")),
                ("weight", json!(1.2)),
                ("color", json!("red")),
            ])
        );
    }

    #[test]
    fn canonical_value_wins_over_alias() {
        let mut map = attrs(&[("ean", json!("canonical")), ("ean_code", json!("legacy"))]);
        normalize_attributes(&mut map);
        assert_eq!(map, attrs(&[("ean", json!("canonical"))]));
    }

    #[test]
    fn canonical_keys_are_not_aliases() {
        for (_, canonical) in KEY_ALIASES {
            assert_eq!(canonical_key(canonical), *canonical);
        }
    }

    #[test]
    fn strips_variant_set_under_any_spelling() {
        for key in ["variantSet", "Variantset", "variant_set"] {
            let mut record = ProductRecord::new("A1")
                .with_attribute(key, json!({"id": 3}))
                .with_attribute("color", "red");
            normalize_record(&mut record, true);
            assert!(!record.attributes.contains_key(VARIANT_SET), "{key} survived");
            assert!(record.attributes.contains_key("color"));
        }
    }

    #[test]
    fn keeps_variant_set_unless_asked() {
        let mut record = ProductRecord::new("A1").with_attribute("Variantset", json!(3));
        normalize_record(&mut record, false);
        assert_eq!(record.attributes.get(VARIANT_SET), Some(&json!(3)));
    }

    #[test]
    fn finds_attribute_through_alias() {
        let map = attrs(&[("VariantType", json!("INDI"))]);
        assert_eq!(find_attribute(&map, VARIANT_TYPE), Some(&json!("INDI")));
        assert_eq!(find_attribute(&map, VARIANT_SET), None);
    }
}
