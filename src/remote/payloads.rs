//! Typed request bodies, one per remote operation.
//!
//! Product payloads are built from a single record node and never carry the
//! record's variants or inventory; children are posted by their own steps.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::constants::indi;
use crate::error::Result;
use crate::models::{AddressRecord, CustomerRecord, InventoryLine, PriceFields, ProductRecord};

/// A serializable request body with an optional wrapping key.
pub trait RemotePayload: Serialize {
    /// Key the payload is nested under, if the operation expects an envelope.
    const ENVELOPE: Option<&'static str> = None;

    fn to_body(&self) -> Result<Value> {
        let value = serde_json::to_value(self)?;
        Ok(match Self::ENVELOPE {
            Some(key) => {
                let mut envelope = Map::new();
                envelope.insert(key.to_string(), value);
                Value::Object(envelope)
            }
            None => value,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub sku: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub prices: PriceFields,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
}

impl ProductPayload {
    /// Payload for one product node, detached from its children.
    pub fn from_record(record: &ProductRecord) -> Self {
        Self {
            id: record.id,
            sku: record.sku.trim().to_string(),
            name: record.name.clone(),
            prices: record.prices.clone(),
            attributes: record.attributes.clone(),
        }
    }

    /// Synthetic master-like product standing in for an INDI variant. Only the
    /// variant's price fields and remote id are carried over.
    pub fn indi(master_sku: &str, variant: &ProductRecord) -> Self {
        Self {
            id: variant.id,
            sku: format!("{}{}", master_sku.trim(), indi::SKU_SUFFIX),
            name: Some(indi::DISPLAY_NAME.to_string()),
            prices: variant.prices.clone(),
            attributes: BTreeMap::new(),
        }
    }
}

impl RemotePayload for ProductPayload {
    const ENVELOPE: Option<&'static str> = Some("product");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryPayload {
    pub sku: String,
    pub warehouse_id: i64,
    pub compartment_id: i64,
    pub quantity: u32,
}

impl InventoryPayload {
    pub fn new(owner_sku: &str, line: &InventoryLine) -> Self {
        Self {
            sku: line.effective_sku(owner_sku).trim().to_string(),
            warehouse_id: line.warehouse_id,
            compartment_id: line.compartment_id,
            quantity: line.quantity,
        }
    }
}

impl RemotePayload for InventoryPayload {}

/// Links a variant product to its master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationPayload {
    pub master_id: i64,
    pub variant_id: i64,
}

impl RemotePayload for RelationPayload {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
}

impl From<&CustomerRecord> for CustomerPayload {
    fn from(record: &CustomerRecord) -> Self {
        Self {
            name: record.name.trim().to_string(),
            customer_number: record.customer_number.clone(),
            email: record.email.clone(),
            phone: record.phone.clone(),
            attributes: record.attributes.clone(),
        }
    }
}

impl RemotePayload for CustomerPayload {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressPayload {
    pub customer_id: i64,
    pub street: String,
    pub zip: String,
    pub city: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addition: Option<String>,
    pub primary: bool,
}

impl AddressPayload {
    pub fn primary_for(customer_id: i64, address: &AddressRecord) -> Self {
        Self {
            customer_id,
            street: address.street.clone(),
            zip: address.zip.clone(),
            city: address.city.clone(),
            country: address.country.clone(),
            addition: address.addition.clone(),
            primary: true,
        }
    }
}

impl RemotePayload for AddressPayload {}
