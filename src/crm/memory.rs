//! In-memory CRM implementation
//!
//! Implements all four collaborator traits over in-process maps. Used by
//! the unit tests and by dev mode, where no writes should leave the
//! process. Fault-injection switches let tests exercise the side-effect
//! and mid-fan-out failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::{IntakeError, Result};

use super::records::{BorrowerRecord, Deal, DealField, DealStatus};
use super::{AuditNote, BorrowerStore, BorrowerUpsert, DealStore, NoteClient, TaskClient};

/// In-process CRM with fault injection
#[derive(Default)]
pub struct InMemoryCrm {
    borrowers: RwLock<HashMap<String, BorrowerRecord>>,
    deals: RwLock<HashMap<String, Deal>>,
    notes: RwLock<Vec<(String, AuditNote)>>,
    tasks: RwLock<Vec<(String, String)>>,
    failing_deal_writes: RwLock<HashSet<String>>,
    fail_borrower_gets: AtomicU32,
    fail_stage_updates: AtomicBool,
    fail_notes: AtomicBool,
    fail_tasks: AtomicBool,
}

impl InMemoryCrm {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_borrower(&self, borrower: BorrowerRecord) {
        self.borrowers
            .write()
            .await
            .insert(borrower.id.clone(), borrower);
    }

    pub async fn add_deal(&self, deal: Deal) {
        self.deals.write().await.insert(deal.id.clone(), deal);
    }

    pub async fn borrower(&self, id: &str) -> Option<BorrowerRecord> {
        self.borrowers.read().await.get(id).cloned()
    }

    pub async fn deal(&self, id: &str) -> Option<Deal> {
        self.deals.read().await.get(id).cloned()
    }

    pub async fn notes(&self) -> Vec<(String, AuditNote)> {
        self.notes.read().await.clone()
    }

    pub async fn tasks(&self) -> Vec<(String, String)> {
        self.tasks.read().await.clone()
    }

    // ---- fault injection ----

    /// Fail the next `n` borrower `get` calls
    pub fn fail_next_borrower_gets(&self, n: u32) {
        self.fail_borrower_gets.store(n, Ordering::SeqCst);
    }

    /// Fail every field write against the given deal
    pub async fn fail_deal_writes(&self, deal_id: &str) {
        self.failing_deal_writes
            .write()
            .await
            .insert(deal_id.to_string());
    }

    pub fn fail_stage_updates(&self, fail: bool) {
        self.fail_stage_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_notes(&self, fail: bool) {
        self.fail_notes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_tasks(&self, fail: bool) {
        self.fail_tasks.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BorrowerStore for InMemoryCrm {
    async fn get(&self, contact_id: &str) -> Result<Option<BorrowerRecord>> {
        let remaining = self.fail_borrower_gets.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_borrower_gets.store(remaining - 1, Ordering::SeqCst);
            return Err(IntakeError::Crm("injected contact read failure".into()));
        }
        Ok(self.borrowers.read().await.get(contact_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<BorrowerRecord>> {
        Ok(self
            .borrowers
            .read()
            .await
            .values()
            .find(|b| {
                b.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    async fn search_by_name(&self, name: &str) -> Result<Vec<BorrowerRecord>> {
        let needle = name.trim().to_lowercase();
        let mut hits: Vec<BorrowerRecord> = self
            .borrowers
            .read()
            .await
            .values()
            .filter(|b| b.full_name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(hits)
    }

    async fn upsert(&self, req: BorrowerUpsert) -> Result<String> {
        let mut borrowers = self.borrowers.write().await;

        let id = match &req.id {
            Some(id) => id.clone(),
            None => match req.email.as_deref().and_then(|email| {
                borrowers
                    .values()
                    .find(|b| b.email.as_deref() == Some(email))
                    .map(|b| b.id.clone())
            }) {
                Some(id) => id,
                None => Uuid::new_v4().to_string(),
            },
        };

        let record = borrowers.entry(id.clone()).or_insert_with(|| BorrowerRecord {
            id: id.clone(),
            email: req.email.clone(),
            ..BorrowerRecord::default()
        });
        record.custom_fields.extend(req.custom_fields);
        Ok(id)
    }
}

#[async_trait]
impl DealStore for InMemoryCrm {
    async fn search_open_deals(&self, contact_id: &str, pipeline_id: &str) -> Result<Vec<Deal>> {
        let mut open: Vec<Deal> = self
            .deals
            .read()
            .await
            .values()
            .filter(|d| {
                d.contact_id == contact_id
                    && d.pipeline_id == pipeline_id
                    && d.status == DealStatus::Open
            })
            .cloned()
            .collect();
        // Deterministic order so the representative target is stable
        open.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(open)
    }

    async fn get(&self, deal_id: &str) -> Result<Option<Deal>> {
        Ok(self.deals.read().await.get(deal_id).cloned())
    }

    async fn update_fields(&self, deal_id: &str, fields: Vec<DealField>) -> Result<()> {
        if self.failing_deal_writes.read().await.contains(deal_id) {
            return Err(IntakeError::Crm(format!(
                "injected write failure for {}",
                deal_id
            )));
        }
        let mut deals = self.deals.write().await;
        let deal = deals
            .get_mut(deal_id)
            .ok_or_else(|| IntakeError::Crm(format!("Deal not found: {}", deal_id)))?;
        deal.apply_fields(fields);
        Ok(())
    }

    async fn update_stage(&self, deal_id: &str, stage_id: &str) -> Result<()> {
        if self.fail_stage_updates.load(Ordering::SeqCst) {
            return Err(IntakeError::Crm("injected stage update failure".into()));
        }
        let mut deals = self.deals.write().await;
        let deal = deals
            .get_mut(deal_id)
            .ok_or_else(|| IntakeError::Crm(format!("Deal not found: {}", deal_id)))?;
        deal.stage_id = stage_id.to_string();
        Ok(())
    }
}

#[async_trait]
impl NoteClient for InMemoryCrm {
    async fn create_audit_note(&self, contact_id: &str, note: AuditNote) -> Result<String> {
        if self.fail_notes.load(Ordering::SeqCst) {
            return Err(IntakeError::Crm("injected note failure".into()));
        }
        self.notes
            .write()
            .await
            .push((contact_id.to_string(), note));
        Ok(Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl TaskClient for InMemoryCrm {
    async fn create_readiness_task(&self, contact_id: &str, full_name: &str) -> Result<String> {
        if self.fail_tasks.load(Ordering::SeqCst) {
            return Err(IntakeError::Crm("injected task failure".into()));
        }
        self.tasks
            .write()
            .await
            .push((contact_id.to_string(), full_name.to_string()));
        Ok(Uuid::new_v4().to_string())
    }
}
