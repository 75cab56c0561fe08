//! Record types from the relationship-management store
//!
//! Borrower (contact) records carry opaque JSON custom-field values keyed
//! by external field id. Deal (opportunity) records carry typed custom
//! fields with a stringValue or numberValue per field id. The tracking
//! codecs translate between these and `TrackingState`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Borrower (contact) record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerRecord {
    pub id: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Opaque custom field values keyed by external field id
    #[serde(default)]
    pub custom_fields: HashMap<String, serde_json::Value>,
}

/// Lifecycle status of a deal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    #[default]
    Open,
    Won,
    Lost,
    Abandoned,
}

/// Typed custom field on a deal record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealField {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_value: Option<f64>,
}

impl DealField {
    pub fn text(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            string_value: Some(value.into()),
            number_value: None,
        }
    }

    pub fn number(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            string_value: None,
            number_value: Some(value),
        }
    }
}

/// Deal (opportunity) record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub name: String,
    pub contact_id: String,
    pub pipeline_id: String,
    pub stage_id: String,
    #[serde(default)]
    pub status: DealStatus,
    #[serde(default)]
    pub custom_fields: Vec<DealField>,
}

impl Deal {
    /// Read a custom field by external field id
    pub fn read_field(&self, field_id: &str) -> Option<&DealField> {
        self.custom_fields.iter().find(|f| f.id == field_id)
    }

    /// Replace or insert the given custom fields, leaving others intact
    pub fn apply_fields(&mut self, fields: Vec<DealField>) {
        for field in fields {
            match self.custom_fields.iter_mut().find(|f| f.id == field.id) {
                Some(existing) => *existing = field,
                None => self.custom_fields.push(field),
            }
        }
    }
}
