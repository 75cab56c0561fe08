//! Document tracking synchronization engine
//!
//! Given one "document received" event, the engine locates the tracking
//! record(s) it applies to, matches the document against the outstanding
//! checklist, updates counters and state, and fires bounded one-time side
//! effects (stage advance, readiness task, audit note).
//!
//! ## Data flow
//!
//! ```text
//! DocumentEvent
//!     │
//!     ▼
//! resolver ──► target scope (one deal, fan-out, borrower fallback)
//!     │
//!     ▼
//! codec ─────► TrackingState per target (two physical encodings)
//!     │
//!     ▼
//! matcher ───► outstanding checklist entry
//!     │
//!     ▼
//! orchestrator updates every target, recomputes status, writes back,
//! then fires side effects at most once per event
//! ```

pub mod codec;
pub mod matcher;
pub mod orchestrator;
pub mod resolver;
pub mod state;
pub mod status;

pub use orchestrator::{
    SkipReason, TargetKind, TrackingConfig, TrackingOrchestrator, TrackingUpdateResult,
};
pub use state::{DocStage, MissingDocEntry, TrackingState};
pub use status::{compute_doc_status, DocStatus};
