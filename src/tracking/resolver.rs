//! Contact and target-scope resolution
//!
//! Determines who an event belongs to and which record(s) it should
//! update. Contact resolution tries the explicit id, then the sender
//! email, then a fuzzy name lookup guarded against ambiguity (two or more
//! exact name matches means the event cannot be attributed safely).
//!
//! Target resolution searches the borrower's open deals:
//! - zero deals → track on the borrower record itself
//! - one deal → that deal
//! - several deals + reusable type → all of them (fan-out)
//! - several deals + property-specific type → the one matching the
//!   mortgage-platform application reference, or reject as ambiguous

use tracing::debug;

use crate::crm::records::{BorrowerRecord, Deal};
use crate::crm::{BorrowerStore, DealStore};
use crate::doctypes::DocScope;
use crate::events::DocumentEvent;
use crate::types::Result;

/// Which record(s) an event applies to
#[derive(Debug)]
pub enum TargetScope {
    /// No open deals; track on the borrower record
    ContactFallback,
    /// Exactly one deal (single open deal, or disambiguated by the
    /// application reference)
    SingleDeal(Deal),
    /// Reusable document type across several open deals
    FanOut(Vec<Deal>),
    /// Property-specific type without an unambiguous deal; no writes
    Ambiguous,
}

/// Resolve the borrower an event belongs to. `Ok(None)` when nothing
/// resolves - an expected outcome, not an error.
pub async fn resolve_contact<B: BorrowerStore + ?Sized>(
    store: &B,
    event: &DocumentEvent,
) -> Result<Option<BorrowerRecord>> {
    if let Some(id) = &event.contact_id {
        return store.get(id).await;
    }

    if let Some(email) = &event.sender_email {
        if let Some(borrower) = store.find_by_email(email).await? {
            return Ok(Some(borrower));
        }
    }

    if let Some(name) = &event.borrower_name {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let candidates = store.search_by_name(name).await?;
        let exact: Vec<&BorrowerRecord> = candidates
            .iter()
            .filter(|c| c.full_name.trim().eq_ignore_ascii_case(name))
            .collect();
        return Ok(match (exact.len(), candidates.len()) {
            (1, _) => Some(exact[0].clone()),
            // Two borrowers with the same exact name: refuse to guess
            (n, _) if n >= 2 => {
                debug!(name, matches = n, "Ambiguous name lookup, refusing to guess");
                None
            }
            (0, 1) => candidates.into_iter().next(),
            _ => None,
        });
    }

    Ok(None)
}

/// Resolve which record(s) the event updates
pub async fn resolve_targets<D: DealStore + ?Sized>(
    deals: &D,
    contact_id: &str,
    pipeline_id: &str,
    scope: DocScope,
    finmo_application_id: Option<&str>,
    finmo_field_id: &str,
) -> Result<TargetScope> {
    let mut open = deals.search_open_deals(contact_id, pipeline_id).await?;

    if open.is_empty() {
        return Ok(TargetScope::ContactFallback);
    }
    if open.len() == 1 {
        return Ok(TargetScope::SingleDeal(open.remove(0)));
    }

    match scope {
        DocScope::Reusable => Ok(TargetScope::FanOut(open)),
        DocScope::PropertySpecific => {
            let Some(finmo_id) = finmo_application_id.map(str::trim).filter(|s| !s.is_empty())
            else {
                return Ok(TargetScope::Ambiguous);
            };
            let hit = open.into_iter().find(|d| {
                d.read_field(finmo_field_id)
                    .and_then(|f| f.string_value.as_deref())
                    .is_some_and(|v| v.trim() == finmo_id)
            });
            Ok(match hit {
                Some(deal) => TargetScope::SingleDeal(deal),
                None => TargetScope::Ambiguous,
            })
        }
    }
}
