//! Intake - document tracking engine for mortgage brokerages
//!
//! Intake reconciles classified "document received" events against the
//! per-borrower checklist kept in the relationship-management store, and
//! keeps that state synchronized across every open deal as documents
//! arrive from independent channels (email, mortgage-platform API).
//!
//! ## Components
//!
//! - **Tracking**: the synchronization engine - matcher, codecs, status
//!   calculator, and the update orchestrator
//! - **CRM**: collaborator traits for the external store, plus a thin HTTP
//!   client and an in-memory implementation for tests and dev mode
//! - **Worker**: sequential (concurrency-1) event pipeline
//! - **Doctypes**: registry of classifier type codes and their matching rules

pub mod config;
pub mod crm;
pub mod doctypes;
pub mod events;
pub mod tracking;
pub mod types;
pub mod worker;

pub use config::Args;
pub use events::DocumentEvent;
pub use tracking::{TrackingConfig, TrackingOrchestrator, TrackingUpdateResult};
pub use types::{IntakeError, Result};
