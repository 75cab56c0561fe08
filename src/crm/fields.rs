//! Field-id configuration
//!
//! The engine never hardcodes external field ids. Each record kind gets a
//! map from the seven logical tracking field names to the opaque ids the
//! CRM assigned, loaded from configuration and injected.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{IntakeError, Result};

/// Logical-to-external field ids for one record kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingFieldIds {
    pub doc_status: String,
    pub missing_docs: String,
    pub received_docs: String,
    pub pre_docs_total: String,
    pub pre_docs_received: String,
    pub full_docs_total: String,
    pub full_docs_received: String,
}

/// The two injected maps: borrower-record ids and deal-record ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMaps {
    pub contact: TrackingFieldIds,
    pub opportunity: TrackingFieldIds,
}

/// Load the field maps from a JSON file:
/// `{"contact": {"docStatus": "...", ...}, "opportunity": {...}}`
pub fn load_field_maps(path: &Path) -> Result<FieldMaps> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        IntakeError::Config(format!("Failed to read field map {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        IntakeError::Config(format!("Invalid field map {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_map_json_shape() {
        let json = r#"{
            "contact": {
                "docStatus": "cf_status", "missingDocs": "cf_missing",
                "receivedDocs": "cf_received", "preDocsTotal": "cf_pre_t",
                "preDocsReceived": "cf_pre_r", "fullDocsTotal": "cf_full_t",
                "fullDocsReceived": "cf_full_r"
            },
            "opportunity": {
                "docStatus": "of_status", "missingDocs": "of_missing",
                "receivedDocs": "of_received", "preDocsTotal": "of_pre_t",
                "preDocsReceived": "of_pre_r", "fullDocsTotal": "of_full_t",
                "fullDocsReceived": "of_full_r"
            }
        }"#;
        let maps: FieldMaps = serde_json::from_str(json).expect("valid shape");
        assert_eq!(maps.contact.missing_docs, "cf_missing");
        assert_eq!(maps.opportunity.doc_status, "of_status");
    }
}
