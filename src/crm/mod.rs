//! Relationship-management store collaborators
//!
//! Abstract capabilities the tracking engine consumes, expressed as traits
//! so the orchestrator can be exercised against mocks. `http` provides a
//! thin production client; `memory` a full in-process implementation used
//! by tests and dev mode. Authentication, retries, and rate limiting are
//! transport concerns that live outside this crate.

pub mod fields;
pub mod http;
pub mod memory;
pub mod records;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::Result;
use records::{BorrowerRecord, Deal, DealField};

/// Upsert request for a borrower record. With an `id` the existing record
/// is updated; otherwise the store matches by email or creates a record.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerUpsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub custom_fields: HashMap<String, serde_json::Value>,
}

/// Payload of the per-event audit note
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditNote {
    /// Display name of the matched checklist document
    pub document_type: String,
    /// Channel the document arrived from
    pub source: String,
    /// Drive file reference
    pub drive_file_id: String,
}

/// Borrower (contact) store
#[async_trait]
pub trait BorrowerStore: Send + Sync {
    /// Fetch a borrower by id. `Ok(None)` when the id does not exist.
    async fn get(&self, contact_id: &str) -> Result<Option<BorrowerRecord>>;

    /// Look up a borrower by exact email address
    async fn find_by_email(&self, email: &str) -> Result<Option<BorrowerRecord>>;

    /// Fuzzy name search; returns all candidates, caller disambiguates
    async fn search_by_name(&self, name: &str) -> Result<Vec<BorrowerRecord>>;

    /// Create or update a borrower, returning its id
    async fn upsert(&self, req: BorrowerUpsert) -> Result<String>;
}

/// Deal (opportunity) store
#[async_trait]
pub trait DealStore: Send + Sync {
    /// All open deals for a borrower within one pipeline
    async fn search_open_deals(&self, contact_id: &str, pipeline_id: &str) -> Result<Vec<Deal>>;

    /// Fetch a deal by id. `Ok(None)` when the id does not exist.
    async fn get(&self, deal_id: &str) -> Result<Option<Deal>>;

    /// Write custom fields on a deal
    async fn update_fields(&self, deal_id: &str, fields: Vec<DealField>) -> Result<()>;

    /// Move a deal to another pipeline stage
    async fn update_stage(&self, deal_id: &str, stage_id: &str) -> Result<()>;
}

/// Audit note collaborator
#[async_trait]
pub trait NoteClient: Send + Sync {
    /// Record a received document on the borrower, returning the note id
    async fn create_audit_note(&self, contact_id: &str, note: AuditNote) -> Result<String>;
}

/// Follow-up task collaborator
#[async_trait]
pub trait TaskClient: Send + Sync {
    /// Create the PRE-readiness follow-up task, returning the task id
    async fn create_readiness_task(&self, contact_id: &str, full_name: &str) -> Result<String>;
}
