//! Incoming document events
//!
//! One event per classified document, produced by the upstream channels
//! (email poller, mortgage-platform webhook) after classification and
//! filing. The engine reads tracking state fresh for every event, so an
//! event carries everything needed to locate and update the right records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A classified "document received" event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEvent {
    /// CRM contact id, when the upstream channel already resolved it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,

    /// Sender email address (email channel)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_email: Option<String>,

    /// Borrower name guess from the classifier, used as a last-resort
    /// fuzzy lookup when neither contact id nor email resolves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrower_name: Option<String>,

    /// Document type code from the classifier (e.g. "t4", "pay_stub")
    pub document_type: String,

    /// Drive file id of the filed document
    pub drive_file_id: String,

    /// Channel the document arrived from (e.g. "email", "finmo")
    pub source: String,

    /// When the document was received
    pub received_at: DateTime<Utc>,

    /// Mortgage-platform application id, required to disambiguate
    /// property-specific documents across multiple open deals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finmo_application_id: Option<String>,
}
