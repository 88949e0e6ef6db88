mod common;

use common::strategies::*;
use erp_sync_core::constants::attributes::VARIANT_SET;
use erp_sync_core::normalization::{
    canonical_key, normalize_attributes, normalize_record, strip_variant_metadata, KEY_ALIASES,
};
use erp_sync_core::models::ProductRecord;
use proptest::prelude::*;

proptest! {
    /// Property: normalizing an already-normalized attribute map changes nothing
    #[test]
    fn normalization_is_idempotent(attributes in attributes_strategy()) {
        let mut once = attributes.clone();
        normalize_attributes(&mut once);
        let mut twice = once.clone();
        normalize_attributes(&mut twice);
        prop_assert_eq!(once, twice);
    }

    /// Property: no known alias survives normalization
    #[test]
    fn normalized_keys_are_canonical(attributes in attributes_strategy()) {
        let mut normalized = attributes;
        normalize_attributes(&mut normalized);
        for key in normalized.keys() {
            prop_assert_eq!(canonical_key(key), key.as_str());
        }
    }

    /// Property: values are only moved, never invented
    #[test]
    fn normalization_never_grows_the_map(attributes in attributes_strategy()) {
        let before = attributes.len();
        let mut normalized = attributes;
        normalize_attributes(&mut normalized);
        prop_assert!(normalized.len() <= before);
    }

    /// Property: stripping removes variant-set membership under every spelling
    #[test]
    fn strip_removes_every_variant_set_spelling(
        attributes in attributes_strategy(),
        strip_before_normalizing in any::<bool>(),
    ) {
        let mut record = ProductRecord { attributes, ..ProductRecord::new("P1") };
        if strip_before_normalizing {
            strip_variant_metadata(&mut record.attributes);
        } else {
            normalize_record(&mut record, true);
        }

        prop_assert!(!record.attributes.contains_key(VARIANT_SET));
        for (alias, canonical) in KEY_ALIASES {
            if *canonical == VARIANT_SET {
                prop_assert!(!record.attributes.contains_key(*alias));
            }
        }
    }
}

#[test]
fn canonical_value_wins_over_alias() {
    let mut record = ProductRecord::new("P1")
        .with_attribute("ean", "canonical")
        .with_attribute("EAN", "legacy");
    normalize_record(&mut record, false);

    assert_eq!(record.attributes.len(), 1);
    assert_eq!(record.attributes["ean"], serde_json::json!("canonical"));
}
