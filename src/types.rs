//! Crate-wide error and result types
//!
//! Only genuine failures live here. Resolution outcomes such as
//! "no matching contact" are expected results of processing an event and
//! travel in the result object's `reason` field instead.

use thiserror::Error;

/// Errors that abort event processing
#[derive(Debug, Error)]
pub enum IntakeError {
    /// Upstream CRM read or write failure
    #[error("CRM error: {0}")]
    Crm(String),

    /// Transport failure from the HTTP client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input payload
    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, IntakeError>;
