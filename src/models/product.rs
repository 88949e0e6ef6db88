use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::constants::{attributes, indi, MISSING_SKU_LABEL};
use crate::error::{Result, SyncError};
use crate::normalization;

/// Price fields copied onto synthetic INDI products. Absent prices are never sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retail_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_price: Option<f64>,
}

impl PriceFields {
    pub fn is_empty(&self) -> bool {
        self.price.is_none()
            && self.purchase_price.is_none()
            && self.retail_price.is_none()
            && self.special_price.is_none()
    }
}

/// One stock posting for a product in a warehouse compartment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLine {
    /// Falls back to the owning product's SKU when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub warehouse_id: i64,
    pub compartment_id: i64,
    pub quantity: u32,
}

impl InventoryLine {
    pub fn new(warehouse_id: i64, compartment_id: i64, quantity: u32) -> Self {
        Self {
            sku: None,
            warehouse_id,
            compartment_id,
            quantity,
        }
    }

    pub fn for_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    /// SKU to post for this line, inheriting from the owning product when unset.
    pub fn effective_sku<'a>(&'a self, owner_sku: &'a str) -> &'a str {
        match self.sku.as_deref() {
            Some(sku) if !sku.trim().is_empty() => sku,
            _ => owner_sku,
        }
    }
}

/// A master product or one of its variants.
///
/// `id` is the remote catalog id: absent means the node must be created, present
/// means it must be saved. Variants of variants are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    #[serde(default)]
    pub sku: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub prices: PriceFields,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inventory: Vec<InventoryLine>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<ProductRecord>,
}

impl ProductRecord {
    pub fn new(sku: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.prices.price = Some(price);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_inventory(mut self, line: InventoryLine) -> Self {
        self.inventory.push(line);
        self
    }

    pub fn with_variant(mut self, variant: ProductRecord) -> Self {
        self.variants.push(variant);
        self
    }

    /// Returns the SKU, failing when it is blank.
    pub fn require_sku(&self) -> Result<&str> {
        let sku = self.sku.trim();
        if sku.is_empty() {
            return Err(SyncError::validation("product node has no sku"));
        }
        Ok(sku)
    }

    /// SKU for log lines and error strings.
    pub fn sku_label(&self) -> &str {
        let sku = self.sku.trim();
        if sku.is_empty() {
            MISSING_SKU_LABEL
        } else {
            sku
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// True when the variant-type attribute (any accepted spelling) carries the
    /// INDI marker.
    pub fn is_indi_variant(&self) -> bool {
        normalization::find_attribute(&self.attributes, attributes::VARIANT_TYPE)
            .and_then(Value::as_str)
            .map(|value| {
                value
                    .to_ascii_uppercase()
                    .contains(&indi::MARKER.to_ascii_uppercase())
            })
            .unwrap_or(false)
    }
}
