//! Tracking update orchestrator
//!
//! Drives one "document received" event end to end:
//!
//! ```text
//! resolving-contact → resolving-targets → matching → updating-targets
//!     → triggering-side-effects → done
//! ```
//!
//! Terminal non-success outcomes (`no-contact`, `ambiguous-deal`,
//! `no-match-in-checklist`) are expected results, returned in the result's
//! `reason` field. Read failures before the first write are fatal and
//! abort the event with zero writes. Once the first state write has been
//! issued, everything else is best-effort: per-target write failures and
//! side-effect failures are caught, stringified, and aggregated in
//! `errors` without undoing earlier writes.
//!
//! Side effects are deduplicated across fan-out with local flags scoped to
//! the event: one audit note and at most one readiness task per event, no
//! matter how many deals were updated.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::crm::fields::TrackingFieldIds;
use crate::crm::records::Deal;
use crate::crm::{AuditNote, BorrowerStore, BorrowerUpsert, DealStore, NoteClient, TaskClient};
use crate::doctypes::{doc_type_info, DocScope};
use crate::events::DocumentEvent;
use crate::types::Result;

use super::codec;
use super::matcher::find_matching_checklist_doc;
use super::resolver::{resolve_contact, resolve_targets, TargetScope};
use super::state::MissingDocEntry;
use super::status::DocStatus;

// ============================================================================
// Result object
// ============================================================================

/// Why an event produced no update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    NoContact,
    AmbiguousDeal,
    NoMatchInChecklist,
}

/// Which kind of record the update landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Opportunity,
    Contact,
}

/// Result returned to the pipeline caller - the only wire format this
/// engine defines
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUpdateResult {
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    /// Representative deal when the update landed on deal records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opportunity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_target: Option<TargetKind>,
    /// Further deal ids updated by fan-out, beyond the representative
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cross_deal_updates: Vec<String>,
    /// Representative target's status after the update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<DocStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_id: Option<String>,
    /// Non-fatal failures collected along the way
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl TrackingUpdateResult {
    fn skipped(reason: SkipReason, contact_id: Option<String>) -> Self {
        Self {
            updated: false,
            reason: Some(reason),
            contact_id,
            opportunity_id: None,
            tracking_target: None,
            cross_deal_updates: Vec::new(),
            new_status: None,
            note_id: None,
            errors: Vec::new(),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Pipeline and field wiring - injected, never hardcoded in the engine
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Pipeline searched for open deals
    pub pipeline_id: String,
    /// Stage a deal advances to when its status reaches All Complete
    pub docs_complete_stage_id: String,
    /// Deal custom field holding the mortgage-platform application reference
    pub finmo_app_field_id: String,
    /// Field ids for the borrower-record encoding
    pub contact_fields: TrackingFieldIds,
    /// Field ids for the deal-record encoding
    pub deal_fields: TrackingFieldIds,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// The top-level state machine composing resolver, codec, matcher, and
/// status calculator, generic over the collaborator traits
pub struct TrackingOrchestrator<B, D, N, T> {
    config: TrackingConfig,
    borrowers: Arc<B>,
    deals: Arc<D>,
    notes: Arc<N>,
    tasks: Arc<T>,
}

impl<B, D, N, T> TrackingOrchestrator<B, D, N, T>
where
    B: BorrowerStore,
    D: DealStore,
    N: NoteClient,
    T: TaskClient,
{
    pub fn new(
        config: TrackingConfig,
        borrowers: Arc<B>,
        deals: Arc<D>,
        notes: Arc<N>,
        tasks: Arc<T>,
    ) -> Self {
        Self {
            config,
            borrowers,
            deals,
            notes,
            tasks,
        }
    }

    /// Process one document event against the tracking state.
    ///
    /// `Err` means an upstream read or the very first write failed and
    /// nothing was persisted - safe to retry. `Ok` with `updated: false`
    /// carries a terminal resolution outcome that retrying cannot change.
    pub async fn process_event(&self, event: &DocumentEvent) -> Result<TrackingUpdateResult> {
        // 1. Resolve the borrower
        let Some(borrower) = resolve_contact(self.borrowers.as_ref(), event).await? else {
            info!(
                document_type = %event.document_type,
                source = %event.source,
                "No matching contact for document event"
            );
            return Ok(TrackingUpdateResult::skipped(SkipReason::NoContact, None));
        };
        let contact_id = borrower.id.clone();

        // 2. Resolve target scope. Unknown codes get reusable scope so
        // they fall through to no-match instead of a spurious rejection.
        let scope = doc_type_info(&event.document_type)
            .map(|t| t.scope)
            .unwrap_or(DocScope::Reusable);
        let targets = resolve_targets(
            self.deals.as_ref(),
            &contact_id,
            &self.config.pipeline_id,
            scope,
            event.finmo_application_id.as_deref(),
            &self.config.finmo_app_field_id,
        )
        .await?;

        let deal_targets: Vec<Deal> = match targets {
            TargetScope::Ambiguous => {
                info!(
                    contact = %contact_id,
                    document_type = %event.document_type,
                    "Property-specific document cannot be attributed to a single deal"
                );
                return Ok(TrackingUpdateResult::skipped(
                    SkipReason::AmbiguousDeal,
                    Some(contact_id),
                ));
            }
            TargetScope::ContactFallback => Vec::new(),
            TargetScope::SingleDeal(deal) => vec![deal],
            TargetScope::FanOut(deals) => deals,
        };
        let contact_fallback = deal_targets.is_empty();

        // 3. Match against the representative target's checklist
        let representative_state = if contact_fallback {
            codec::decode_borrower(&borrower.custom_fields, &self.config.contact_fields)
        } else {
            codec::decode_deal(&deal_targets[0].custom_fields, &self.config.deal_fields)
        };
        let Some(matched) = find_matching_checklist_doc(
            &event.document_type,
            &representative_state.missing_docs,
        )
        .cloned() else {
            debug!(
                contact = %contact_id,
                document_type = %event.document_type,
                "No outstanding checklist entry for document"
            );
            return Ok(TrackingUpdateResult::skipped(
                SkipReason::NoMatchInChecklist,
                Some(contact_id),
            ));
        };

        // 4. Update every resolved target. Each target gets its own
        // decode/mutate/encode cycle; the first write failure is fatal
        // (nothing persisted yet), later ones are per-target errors.
        let mut errors: Vec<String> = Vec::new();
        let mut cross_deal_updates: Vec<String> = Vec::new();
        let mut opportunity_id: Option<String> = None;
        let mut new_status: Option<DocStatus> = None;
        let mut newly_pre_complete = false;
        let mut newly_all_complete_deals: Vec<String> = Vec::new();

        if contact_fallback {
            let mut state = representative_state;
            let before = state.doc_status;
            // Matched from this same state, so the entry is present
            state.mark_received(&matched.name);
            let fields = codec::encode_borrower(&state, &self.config.contact_fields);
            self.borrowers
                .upsert(BorrowerUpsert {
                    id: Some(contact_id.clone()),
                    custom_fields: fields,
                    ..BorrowerUpsert::default()
                })
                .await?;
            newly_pre_complete =
                state.doc_status == DocStatus::PreComplete && before != DocStatus::PreComplete;
            new_status = Some(state.doc_status);
        } else {
            for (i, deal) in deal_targets.iter().enumerate() {
                let mut state = codec::decode_deal(&deal.custom_fields, &self.config.deal_fields);
                let Some(entry_name) = pick_entry_name(&event.document_type, &matched, &state.missing_docs)
                else {
                    debug!(deal = %deal.id, "Checklist entry not outstanding on this deal, skipping");
                    continue;
                };
                let before = state.doc_status;
                state.mark_received(&entry_name);
                let fields = codec::encode_deal(&state, &self.config.deal_fields);

                match self.deals.update_fields(&deal.id, fields).await {
                    Ok(()) => {}
                    // Nothing persisted yet: abort the whole event
                    Err(e) if opportunity_id.is_none() => return Err(e),
                    Err(e) => {
                        warn!(deal = %deal.id, error = %e, "Cross-deal tracking write failed");
                        errors.push(format!("Tracking write failed for {}: {}", deal.id, e));
                        continue;
                    }
                }

                if opportunity_id.is_none() {
                    opportunity_id = Some(deal.id.clone());
                    new_status = Some(state.doc_status);
                } else {
                    cross_deal_updates.push(deal.id.clone());
                }
                if state.doc_status == DocStatus::PreComplete && before != DocStatus::PreComplete {
                    newly_pre_complete = true;
                }
                if state.doc_status == DocStatus::AllComplete && before != DocStatus::AllComplete {
                    newly_all_complete_deals.push(deal.id.clone());
                }
            }
        }

        // 5. Advance every deal that just completed its checklist.
        // Borrower-fallback targets have no stage concept.
        for deal_id in &newly_all_complete_deals {
            match self
                .deals
                .update_stage(deal_id, &self.config.docs_complete_stage_id)
                .await
            {
                Ok(()) => info!(deal = %deal_id, "Deal advanced to docs-complete stage"),
                Err(e) => {
                    warn!(deal = %deal_id, error = %e, "Stage advance failed");
                    errors.push(format!("Pipeline advance failed: {}", e));
                }
            }
        }

        // 6. One readiness task per event, not per target
        if newly_pre_complete {
            if let Err(e) = self
                .tasks
                .create_readiness_task(&contact_id, &borrower.full_name)
                .await
            {
                warn!(contact = %contact_id, error = %e, "Readiness task creation failed");
                errors.push(format!("PRE readiness task failed: {}", e));
            }
        }

        // 7. Exactly one audit note per event, on the borrower
        let mut note_id = None;
        match self
            .notes
            .create_audit_note(
                &contact_id,
                AuditNote {
                    document_type: matched.name.clone(),
                    source: event.source.clone(),
                    drive_file_id: event.drive_file_id.clone(),
                },
            )
            .await
        {
            Ok(id) => note_id = Some(id),
            Err(e) => {
                warn!(contact = %contact_id, error = %e, "Audit note creation failed");
                errors.push(format!("Audit note failed: {}", e));
            }
        }

        let target_kind = if contact_fallback {
            TargetKind::Contact
        } else {
            TargetKind::Opportunity
        };
        info!(
            contact = %contact_id,
            document = %matched.name,
            target = ?target_kind,
            cross_deals = cross_deal_updates.len(),
            errors = errors.len(),
            "Document tracking updated"
        );

        // 8. Result
        Ok(TrackingUpdateResult {
            updated: true,
            reason: None,
            contact_id: Some(contact_id),
            opportunity_id,
            tracking_target: Some(target_kind),
            cross_deal_updates,
            new_status,
            note_id,
            errors,
        })
    }
}

/// Locate the entry to satisfy on one fanned-out target: the
/// representative's entry name when this target lists it too, otherwise a
/// fresh match against this target's own wording.
fn pick_entry_name(
    type_code: &str,
    matched: &MissingDocEntry,
    missing: &[MissingDocEntry],
) -> Option<String> {
    if let Some(entry) = missing
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(&matched.name))
    {
        return Some(entry.name.clone());
    }
    find_matching_checklist_doc(type_code, missing).map(|e| e.name.clone())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::memory::InMemoryCrm;
    use crate::crm::records::{BorrowerRecord, DealField, DealStatus};
    use crate::tracking::codec;
    use crate::tracking::state::{DocStage, MissingDocEntry, TrackingState};
    use chrono::Utc;

    fn field_ids(prefix: &str) -> TrackingFieldIds {
        TrackingFieldIds {
            doc_status: format!("{}_status", prefix),
            missing_docs: format!("{}_missing", prefix),
            received_docs: format!("{}_received", prefix),
            pre_docs_total: format!("{}_pre_total", prefix),
            pre_docs_received: format!("{}_pre_received", prefix),
            full_docs_total: format!("{}_full_total", prefix),
            full_docs_received: format!("{}_full_received", prefix),
        }
    }

    fn config() -> TrackingConfig {
        TrackingConfig {
            pipeline_id: "p1".into(),
            docs_complete_stage_id: "stage-complete".into(),
            finmo_app_field_id: "of_finmo".into(),
            contact_fields: field_ids("cf"),
            deal_fields: field_ids("of"),
        }
    }

    fn orchestrator(
        crm: &Arc<InMemoryCrm>,
    ) -> TrackingOrchestrator<InMemoryCrm, InMemoryCrm, InMemoryCrm, InMemoryCrm> {
        TrackingOrchestrator::new(
            config(),
            Arc::clone(crm),
            Arc::clone(crm),
            Arc::clone(crm),
            Arc::clone(crm),
        )
    }

    fn event(document_type: &str) -> DocumentEvent {
        DocumentEvent {
            contact_id: Some("c1".into()),
            sender_email: None,
            borrower_name: None,
            document_type: document_type.into(),
            drive_file_id: "file-1".into(),
            source: "email".into(),
            received_at: Utc::now(),
            finmo_application_id: None,
        }
    }

    fn tracked_state(missing: Vec<MissingDocEntry>, counters: (u32, u32, u32, u32)) -> TrackingState {
        let (pre_t, pre_r, full_t, full_r) = counters;
        TrackingState {
            missing_docs: missing,
            received_docs: Vec::new(),
            pre_docs_total: pre_t,
            pre_docs_received: pre_r,
            full_docs_total: full_t,
            full_docs_received: full_r,
            doc_status: crate::tracking::status::compute_doc_status(pre_t, pre_r, full_t, full_r),
        }
    }

    async fn seed_borrower(crm: &InMemoryCrm, state: &TrackingState) {
        crm.add_borrower(BorrowerRecord {
            id: "c1".into(),
            full_name: "Dana Velasquez".into(),
            email: Some("dana@example.com".into()),
            custom_fields: codec::encode_borrower(state, &field_ids("cf")),
        })
        .await;
    }

    async fn seed_deal(crm: &InMemoryCrm, id: &str, state: &TrackingState, finmo: Option<&str>) {
        let mut custom_fields = codec::encode_deal(state, &field_ids("of"));
        if let Some(finmo_id) = finmo {
            custom_fields.push(DealField::text("of_finmo", finmo_id));
        }
        crm.add_deal(crate::crm::records::Deal {
            id: id.into(),
            name: format!("Mortgage - {}", id),
            contact_id: "c1".into(),
            pipeline_id: "p1".into(),
            stage_id: "stage-docs".into(),
            status: DealStatus::Open,
            custom_fields,
        })
        .await;
    }

    fn deal_state(crm_deal: &crate::crm::records::Deal) -> TrackingState {
        codec::decode_deal(&crm_deal.custom_fields, &field_ids("of"))
    }

    #[tokio::test]
    async fn borrower_fallback_updates_contact_state() {
        let crm = Arc::new(InMemoryCrm::new());
        let state = tracked_state(
            vec![
                MissingDocEntry::new("T4", DocStage::Pre),
                MissingDocEntry::new("LOE", DocStage::Pre),
                MissingDocEntry::new("NOA", DocStage::Full),
            ],
            (2, 0, 1, 0),
        );
        seed_borrower(&crm, &state).await;

        let result = orchestrator(&crm)
            .process_event(&event("t4"))
            .await
            .expect("process");

        assert!(result.updated);
        assert_eq!(result.tracking_target, Some(TargetKind::Contact));
        assert_eq!(result.new_status, Some(DocStatus::InProgress));
        assert!(result.opportunity_id.is_none());
        assert!(result.note_id.is_some());
        assert!(result.errors.is_empty());

        let stored = crm.borrower("c1").await.expect("borrower");
        let decoded = codec::decode_borrower(&stored.custom_fields, &field_ids("cf"));
        assert!(!decoded.is_missing("T4"));
        assert_eq!(decoded.received_docs, vec!["T4".to_string()]);
        assert_eq!(decoded.pre_docs_received, 1);
        assert_eq!(decoded.doc_status, DocStatus::InProgress);

        assert_eq!(crm.notes().await.len(), 1);
        assert!(crm.tasks().await.is_empty());
    }

    #[tokio::test]
    async fn single_deal_update() {
        let crm = Arc::new(InMemoryCrm::new());
        seed_borrower(&crm, &TrackingState::default()).await;
        let state = tracked_state(
            vec![
                MissingDocEntry::new("Paystub", DocStage::Pre),
                MissingDocEntry::new("NOA", DocStage::Full),
            ],
            (1, 0, 1, 0),
        );
        seed_deal(&crm, "deal-1", &state, None).await;

        let result = orchestrator(&crm)
            .process_event(&event("pay_stub"))
            .await
            .expect("process");

        assert!(result.updated);
        assert_eq!(result.tracking_target, Some(TargetKind::Opportunity));
        assert_eq!(result.opportunity_id.as_deref(), Some("deal-1"));
        assert_eq!(result.new_status, Some(DocStatus::PreComplete));
        assert!(result.cross_deal_updates.is_empty());

        let decoded = deal_state(&crm.deal("deal-1").await.expect("deal"));
        assert_eq!(decoded.pre_docs_received, 1);
        assert_eq!(decoded.received_docs, vec!["Paystub".to_string()]);

        // Newly PRE Complete: exactly one readiness task
        assert_eq!(crm.tasks().await.len(), 1);
        assert_eq!(crm.notes().await.len(), 1);
    }

    #[tokio::test]
    async fn fan_out_updates_every_open_deal_once() {
        let crm = Arc::new(InMemoryCrm::new());
        seed_borrower(&crm, &TrackingState::default()).await;
        let state = tracked_state(
            vec![
                MissingDocEntry::new("Paystub", DocStage::Pre),
                MissingDocEntry::new("NOA", DocStage::Full),
            ],
            (1, 0, 1, 0),
        );
        for id in ["deal-1", "deal-2", "deal-3"] {
            seed_deal(&crm, id, &state, None).await;
        }

        let result = orchestrator(&crm)
            .process_event(&event("pay_stub"))
            .await
            .expect("process");

        assert!(result.updated);
        assert_eq!(result.opportunity_id.as_deref(), Some("deal-1"));
        assert_eq!(
            result.cross_deal_updates,
            vec!["deal-2".to_string(), "deal-3".to_string()]
        );

        for id in ["deal-1", "deal-2", "deal-3"] {
            let decoded = deal_state(&crm.deal(id).await.expect("deal"));
            assert_eq!(decoded.pre_docs_received, 1, "deal {}", id);
            assert!(!decoded.is_missing("Paystub"), "deal {}", id);
        }

        // One note and one readiness task total - not three
        assert_eq!(crm.notes().await.len(), 1);
        assert_eq!(crm.tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn all_complete_advances_the_deal_stage() {
        let crm = Arc::new(InMemoryCrm::new());
        seed_borrower(&crm, &TrackingState::default()).await;
        let state = tracked_state(vec![MissingDocEntry::new("T4", DocStage::Pre)], (1, 0, 0, 0));
        seed_deal(&crm, "deal-1", &state, None).await;

        let result = orchestrator(&crm)
            .process_event(&event("t4"))
            .await
            .expect("process");

        assert_eq!(result.new_status, Some(DocStatus::AllComplete));
        assert!(result.errors.is_empty());

        let deal = crm.deal("deal-1").await.expect("deal");
        assert_eq!(deal.stage_id, "stage-complete");
        // Straight to All Complete: stage advance fires, readiness task does not
        assert!(crm.tasks().await.is_empty());
    }

    #[tokio::test]
    async fn ambiguous_property_specific_event_writes_nothing() {
        let crm = Arc::new(InMemoryCrm::new());
        seed_borrower(&crm, &TrackingState::default()).await;
        let state = tracked_state(
            vec![MissingDocEntry::new("Purchase Agreement", DocStage::Pre)],
            (1, 0, 0, 0),
        );
        seed_deal(&crm, "deal-1", &state, Some("app-111")).await;
        seed_deal(&crm, "deal-2", &state, Some("app-222")).await;

        let result = orchestrator(&crm)
            .process_event(&event("purchase_agreement"))
            .await
            .expect("process");

        assert!(!result.updated);
        assert_eq!(result.reason, Some(SkipReason::AmbiguousDeal));
        assert_eq!(result.contact_id.as_deref(), Some("c1"));

        for id in ["deal-1", "deal-2"] {
            let decoded = deal_state(&crm.deal(id).await.expect("deal"));
            assert!(decoded.is_missing("Purchase Agreement"), "deal {}", id);
            assert_eq!(decoded.pre_docs_received, 0);
        }
        assert!(crm.notes().await.is_empty());
    }

    #[tokio::test]
    async fn finmo_reference_selects_exactly_one_deal() {
        let crm = Arc::new(InMemoryCrm::new());
        seed_borrower(&crm, &TrackingState::default()).await;
        let state = tracked_state(
            vec![MissingDocEntry::new("Purchase Agreement", DocStage::Pre)],
            (1, 0, 1, 0),
        );
        seed_deal(&crm, "deal-1", &state, Some("app-111")).await;
        seed_deal(&crm, "deal-2", &state, Some("app-222")).await;

        let mut ev = event("purchase_agreement");
        ev.finmo_application_id = Some("app-222".into());
        let result = orchestrator(&crm).process_event(&ev).await.expect("process");

        assert!(result.updated);
        assert_eq!(result.opportunity_id.as_deref(), Some("deal-2"));
        assert!(result.cross_deal_updates.is_empty());

        let untouched = deal_state(&crm.deal("deal-1").await.expect("deal"));
        assert!(untouched.is_missing("Purchase Agreement"));
        let updated = deal_state(&crm.deal("deal-2").await.expect("deal"));
        assert!(!updated.is_missing("Purchase Agreement"));
    }

    #[tokio::test]
    async fn redelivery_is_a_no_op() {
        let crm = Arc::new(InMemoryCrm::new());
        let state = tracked_state(
            vec![
                MissingDocEntry::new("T4", DocStage::Pre),
                MissingDocEntry::new("NOA", DocStage::Full),
            ],
            (1, 0, 1, 0),
        );
        seed_borrower(&crm, &state).await;

        let orch = orchestrator(&crm);
        let first = orch.process_event(&event("t4")).await.expect("first");
        assert!(first.updated);

        let second = orch.process_event(&event("t4")).await.expect("second");
        assert!(!second.updated);
        assert_eq!(second.reason, Some(SkipReason::NoMatchInChecklist));

        // Counters unchanged by the second delivery
        let stored = crm.borrower("c1").await.expect("borrower");
        let decoded = codec::decode_borrower(&stored.custom_fields, &field_ids("cf"));
        assert_eq!(decoded.pre_docs_received, 1);
        assert_eq!(decoded.received_docs, vec!["T4".to_string()]);
        assert_eq!(crm.notes().await.len(), 1);
    }

    #[tokio::test]
    async fn side_effect_failures_never_undo_state_writes() {
        let crm = Arc::new(InMemoryCrm::new());
        seed_borrower(&crm, &TrackingState::default()).await;
        let state = tracked_state(
            vec![
                MissingDocEntry::new("Paystub", DocStage::Pre),
                MissingDocEntry::new("NOA", DocStage::Full),
            ],
            (1, 0, 1, 0),
        );
        seed_deal(&crm, "deal-1", &state, None).await;
        crm.fail_notes(true);
        crm.fail_tasks(true);

        let result = orchestrator(&crm)
            .process_event(&event("pay_stub"))
            .await
            .expect("process");

        assert!(result.updated);
        assert!(result.note_id.is_none());
        assert!(result
            .errors
            .iter()
            .any(|e| e.starts_with("PRE readiness task failed:")));
        assert!(result.errors.iter().any(|e| e.starts_with("Audit note failed:")));

        // The state write stuck
        let decoded = deal_state(&crm.deal("deal-1").await.expect("deal"));
        assert_eq!(decoded.pre_docs_received, 1);
    }

    #[tokio::test]
    async fn stage_advance_failure_is_non_fatal() {
        let crm = Arc::new(InMemoryCrm::new());
        seed_borrower(&crm, &TrackingState::default()).await;
        let state = tracked_state(vec![MissingDocEntry::new("T4", DocStage::Pre)], (1, 0, 0, 0));
        seed_deal(&crm, "deal-1", &state, None).await;
        crm.fail_stage_updates(true);

        let result = orchestrator(&crm)
            .process_event(&event("t4"))
            .await
            .expect("process");

        assert!(result.updated);
        assert!(result
            .errors
            .iter()
            .any(|e| e.starts_with("Pipeline advance failed:")));
        assert_eq!(crm.notes().await.len(), 1);
    }

    #[tokio::test]
    async fn mid_fan_out_write_failure_continues() {
        let crm = Arc::new(InMemoryCrm::new());
        seed_borrower(&crm, &TrackingState::default()).await;
        let state = tracked_state(
            vec![
                MissingDocEntry::new("Paystub", DocStage::Pre),
                MissingDocEntry::new("NOA", DocStage::Full),
            ],
            (1, 0, 1, 0),
        );
        for id in ["deal-1", "deal-2", "deal-3"] {
            seed_deal(&crm, id, &state, None).await;
        }
        crm.fail_deal_writes("deal-2").await;

        let result = orchestrator(&crm)
            .process_event(&event("pay_stub"))
            .await
            .expect("process");

        assert!(result.updated);
        assert_eq!(result.opportunity_id.as_deref(), Some("deal-1"));
        assert_eq!(result.cross_deal_updates, vec!["deal-3".to_string()]);
        assert!(result
            .errors
            .iter()
            .any(|e| e.starts_with("Tracking write failed for deal-2:")));

        let skipped = deal_state(&crm.deal("deal-2").await.expect("deal"));
        assert!(skipped.is_missing("Paystub"));
        let updated = deal_state(&crm.deal("deal-3").await.expect("deal"));
        assert!(!updated.is_missing("Paystub"));
        assert_eq!(crm.notes().await.len(), 1);
    }

    #[tokio::test]
    async fn first_write_failure_aborts_with_no_partial_state() {
        let crm = Arc::new(InMemoryCrm::new());
        seed_borrower(&crm, &TrackingState::default()).await;
        let state = tracked_state(
            vec![MissingDocEntry::new("Paystub", DocStage::Pre)],
            (1, 0, 1, 0),
        );
        seed_deal(&crm, "deal-1", &state, None).await;
        seed_deal(&crm, "deal-2", &state, None).await;
        crm.fail_deal_writes("deal-1").await;

        let err = orchestrator(&crm)
            .process_event(&event("pay_stub"))
            .await
            .expect_err("fatal");
        assert!(err.to_string().contains("deal-1"));

        // No fan-out happened, no side effects fired
        let second = deal_state(&crm.deal("deal-2").await.expect("deal"));
        assert!(second.is_missing("Paystub"));
        assert!(crm.notes().await.is_empty());
    }

    #[tokio::test]
    async fn unresolvable_event_is_no_contact() {
        let crm = Arc::new(InMemoryCrm::new());
        let mut ev = event("t4");
        ev.contact_id = None;
        ev.sender_email = Some("stranger@example.com".into());

        let result = orchestrator(&crm).process_event(&ev).await.expect("process");
        assert!(!result.updated);
        assert_eq!(result.reason, Some(SkipReason::NoContact));
        assert!(result.contact_id.is_none());
    }

    #[tokio::test]
    async fn generic_type_is_never_matched() {
        let crm = Arc::new(InMemoryCrm::new());
        let state = tracked_state(
            vec![MissingDocEntry::new("Other Documents", DocStage::Pre)],
            (1, 0, 0, 0),
        );
        seed_borrower(&crm, &state).await;

        let result = orchestrator(&crm)
            .process_event(&event("other"))
            .await
            .expect("process");
        assert!(!result.updated);
        assert_eq!(result.reason, Some(SkipReason::NoMatchInChecklist));
    }

    #[tokio::test]
    async fn fan_out_rematches_differently_worded_checklists() {
        let crm = Arc::new(InMemoryCrm::new());
        seed_borrower(&crm, &TrackingState::default()).await;
        let first = tracked_state(
            vec![
                MissingDocEntry::new("Paystub", DocStage::Pre),
                MissingDocEntry::new("NOA", DocStage::Full),
            ],
            (1, 0, 1, 0),
        );
        let second = tracked_state(
            vec![
                MissingDocEntry::new("Most recent pay stub", DocStage::Pre),
                MissingDocEntry::new("NOA", DocStage::Full),
            ],
            (1, 0, 1, 0),
        );
        seed_deal(&crm, "deal-1", &first, None).await;
        seed_deal(&crm, "deal-2", &second, None).await;

        let result = orchestrator(&crm)
            .process_event(&event("pay_stub"))
            .await
            .expect("process");

        assert!(result.updated);
        assert_eq!(result.cross_deal_updates, vec!["deal-2".to_string()]);
        let decoded = deal_state(&crm.deal("deal-2").await.expect("deal"));
        assert!(!decoded.is_missing("Most recent pay stub"));
        assert_eq!(
            decoded.received_docs,
            vec!["Most recent pay stub".to_string()]
        );
    }
}
