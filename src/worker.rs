//! Pipeline worker
//!
//! Single consumer pulling document events off a bounded queue and driving
//! them through the orchestrator one at a time. Serial processing is
//! deliberate: concurrent events for the same borrower would race on the
//! read-modify-write tracking cycle.
//!
//! Only fatal errors are retried - those mean no write happened, so a
//! retry is safe. A terminal skip or a partial success is final and goes
//! straight to the results channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::crm::{BorrowerStore, DealStore, NoteClient, TaskClient};
use crate::events::DocumentEvent;
use crate::tracking::orchestrator::{TrackingOrchestrator, TrackingUpdateResult};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Handle to a spawned worker
pub struct WorkerHandle {
    /// Feed events here; dropping the sender shuts the worker down
    pub events: mpsc::Sender<DocumentEvent>,
    /// One result per event, in submission order
    pub results: mpsc::Receiver<TrackingUpdateResult>,
    pub join: JoinHandle<()>,
}

/// Spawn the worker task. `queue_capacity` bounds the event backlog;
/// `max_attempts` bounds retries of fatal (nothing-written) errors.
pub fn spawn<B, D, N, T>(
    orchestrator: TrackingOrchestrator<B, D, N, T>,
    queue_capacity: usize,
    max_attempts: u32,
) -> WorkerHandle
where
    B: BorrowerStore + 'static,
    D: DealStore + 'static,
    N: NoteClient + 'static,
    T: TaskClient + 'static,
{
    let (event_tx, mut event_rx) = mpsc::channel::<DocumentEvent>(queue_capacity);
    let (result_tx, result_rx) = mpsc::channel::<TrackingUpdateResult>(queue_capacity);
    let orchestrator = Arc::new(orchestrator);

    let join = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let result = process_with_retry(&orchestrator, &event, max_attempts).await;
            if result_tx.send(result).await.is_err() {
                // Receiver gone; nothing left to report to
                break;
            }
        }
        info!("Pipeline worker stopped");
    });

    WorkerHandle {
        events: event_tx,
        results: result_rx,
        join,
    }
}

async fn process_with_retry<B, D, N, T>(
    orchestrator: &TrackingOrchestrator<B, D, N, T>,
    event: &DocumentEvent,
    max_attempts: u32,
) -> TrackingUpdateResult
where
    B: BorrowerStore,
    D: DealStore,
    N: NoteClient,
    T: TaskClient,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match orchestrator.process_event(event).await {
            Ok(result) => {
                info!(
                    document_type = %event.document_type,
                    updated = result.updated,
                    errors = result.errors.len(),
                    "Event processed"
                );
                return result;
            }
            Err(e) if attempt < max_attempts => {
                warn!(
                    document_type = %event.document_type,
                    attempt,
                    error = %e,
                    "Event failed before any write, retrying"
                );
                tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
                attempt += 1;
            }
            Err(e) => {
                error!(
                    document_type = %event.document_type,
                    attempts = attempt,
                    error = %e,
                    "Event abandoned after retries"
                );
                return TrackingUpdateResult {
                    updated: false,
                    reason: None,
                    contact_id: event.contact_id.clone(),
                    opportunity_id: None,
                    tracking_target: None,
                    cross_deal_updates: Vec::new(),
                    new_status: None,
                    note_id: None,
                    errors: vec![format!("Processing failed after {} attempts: {}", attempt, e)],
                };
            }
        }
    }
}
