//! Configuration for the intake engine
//!
//! CLI arguments and environment variable handling using clap.

use std::path::PathBuf;

use clap::Parser;

/// Intake - document tracking synchronization engine
#[derive(Parser, Debug, Clone)]
#[command(name = "intake")]
#[command(about = "Synchronizes received mortgage documents into CRM tracking state")]
pub struct Args {
    /// Base URL of the CRM REST API
    #[arg(long, env = "CRM_BASE_URL", default_value = "https://rest.gohighlevel.com/v1")]
    pub crm_base_url: String,

    /// CRM API key (required unless dev mode)
    #[arg(long, env = "CRM_API_KEY")]
    pub crm_api_key: Option<String>,

    /// Pipeline searched for a borrower's open deals
    #[arg(long, env = "PIPELINE_ID")]
    pub pipeline_id: String,

    /// Stage a deal moves to once its checklist is All Complete
    #[arg(long, env = "DOCS_COMPLETE_STAGE_ID")]
    pub docs_complete_stage_id: String,

    /// Deal custom field carrying the mortgage-platform application id
    #[arg(long, env = "FINMO_APP_FIELD_ID")]
    pub finmo_app_field_id: String,

    /// JSON file mapping logical tracking fields to CRM field ids
    #[arg(long, env = "FIELD_MAP_FILE", default_value = "field-map.json")]
    pub field_map_file: PathBuf,

    /// Development mode: in-process CRM stub, no writes leave the process
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Event queue capacity
    #[arg(long, env = "QUEUE_CAPACITY", default_value = "64")]
    pub queue_capacity: usize,

    /// Attempts per event for errors that happen before any write
    #[arg(long, env = "MAX_ATTEMPTS", default_value = "3")]
    pub max_attempts: u32,
}

impl Args {
    /// Validate the configuration before starting
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.crm_api_key.as_deref().unwrap_or("").trim().is_empty() {
            return Err("CRM_API_KEY is required outside dev mode".to_string());
        }
        if self.pipeline_id.trim().is_empty() {
            return Err("PIPELINE_ID must not be empty".to_string());
        }
        if self.docs_complete_stage_id.trim().is_empty() {
            return Err("DOCS_COMPLETE_STAGE_ID must not be empty".to_string());
        }
        if self.finmo_app_field_id.trim().is_empty() {
            return Err("FINMO_APP_FIELD_ID must not be empty".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("QUEUE_CAPACITY must be at least 1".to_string());
        }
        Ok(())
    }
}
