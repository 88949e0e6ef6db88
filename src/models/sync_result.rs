use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// A variant that reached the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantOutcome {
    pub sku: String,
    pub remote_id: i64,
}

/// Aggregated outcome of one product synchronization.
///
/// The master always succeeded if this value exists; variant failures are
/// collected as `"{sku}: {message}"` strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncResult {
    pub master_id: i64,
    pub variants: Vec<VariantOutcome>,
    pub errors: Vec<String>,
}

impl SyncResult {
    pub fn new(master_id: i64) -> Self {
        Self {
            master_id,
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Serialize for SyncResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SyncResult", 4)?;
        state.serialize_field("masterId", &self.master_id)?;
        state.serialize_field("variants", &self.variants)?;
        state.serialize_field("errors", &self.errors)?;
        state.serialize_field("success", &self.success())?;
        state.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSyncResult {
    pub customer_id: i64,
    pub address_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialized_result_carries_derived_success_flag() {
        let mut result = SyncResult::new(100);
        result.errors.push("A1-RED: boom".to_string());

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({"masterId": 100, "variants": [], "errors": ["A1-RED: boom"], "success": false})
        );
    }
}
