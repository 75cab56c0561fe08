//! Thin HTTP client for the relationship-management API
//!
//! Implements the collaborator traits over the CRM's REST surface. This is
//! deliberately minimal: bearer auth and JSON bodies only. Retries and
//! rate-limit handling belong to the deployment layer around this binary.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::types::{IntakeError, Result};

use super::records::{BorrowerRecord, Deal, DealField};
use super::{AuditNote, BorrowerStore, BorrowerUpsert, DealStore, NoteClient, TaskClient};

/// HTTP CRM client configuration
#[derive(Debug, Clone)]
pub struct HttpCrmConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout: Duration,
}

impl HttpCrmConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Thin client over the CRM REST API
pub struct HttpCrm {
    client: reqwest::Client,
    config: HttpCrmConfig,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

impl HttpCrm {
    pub fn new(config: HttpCrmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.config.api_key)
            .query(query)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(IntakeError::Crm(format!(
                "GET {} returned {}",
                path,
                resp.status()
            )));
        }
        Ok(Some(resp.json().await?))
    }

    async fn send_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        debug!(%method, path, "CRM request");
        let resp = self
            .client
            .request(method.clone(), self.url(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(IntakeError::Crm(format!(
                "{} {} returned {}",
                method,
                path,
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl BorrowerStore for HttpCrm {
    async fn get(&self, contact_id: &str) -> Result<Option<BorrowerRecord>> {
        self.get_json(&format!("/contacts/{}", contact_id), &[]).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<BorrowerRecord>> {
        self.get_json("/contacts/lookup", &[("email", email)]).await
    }

    async fn search_by_name(&self, name: &str) -> Result<Vec<BorrowerRecord>> {
        Ok(self
            .get_json("/contacts/search", &[("query", name)])
            .await?
            .unwrap_or_default())
    }

    async fn upsert(&self, req: BorrowerUpsert) -> Result<String> {
        let resp: IdResponse = self
            .send_json(reqwest::Method::POST, "/contacts/upsert", &req)
            .await?;
        Ok(resp.id)
    }
}

#[async_trait]
impl DealStore for HttpCrm {
    async fn search_open_deals(&self, contact_id: &str, pipeline_id: &str) -> Result<Vec<Deal>> {
        Ok(self
            .get_json(
                "/opportunities/search",
                &[
                    ("contact_id", contact_id),
                    ("pipeline_id", pipeline_id),
                    ("status", "open"),
                ],
            )
            .await?
            .unwrap_or_default())
    }

    async fn get(&self, deal_id: &str) -> Result<Option<Deal>> {
        self.get_json(&format!("/opportunities/{}", deal_id), &[]).await
    }

    async fn update_fields(&self, deal_id: &str, fields: Vec<DealField>) -> Result<()> {
        let body = serde_json::json!({ "customFields": fields });
        let _: serde_json::Value = self
            .send_json(
                reqwest::Method::PUT,
                &format!("/opportunities/{}", deal_id),
                &body,
            )
            .await?;
        Ok(())
    }

    async fn update_stage(&self, deal_id: &str, stage_id: &str) -> Result<()> {
        let body = serde_json::json!({ "stageId": stage_id });
        let _: serde_json::Value = self
            .send_json(
                reqwest::Method::PUT,
                &format!("/opportunities/{}/stage", deal_id),
                &body,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl NoteClient for HttpCrm {
    async fn create_audit_note(&self, contact_id: &str, note: AuditNote) -> Result<String> {
        let resp: IdResponse = self
            .send_json(
                reqwest::Method::POST,
                &format!("/contacts/{}/notes", contact_id),
                &note,
            )
            .await?;
        Ok(resp.id)
    }
}

#[async_trait]
impl TaskClient for HttpCrm {
    async fn create_readiness_task(&self, contact_id: &str, full_name: &str) -> Result<String> {
        let body = serde_json::json!({
            "title": format!("PRE package ready - book review with {}", full_name),
            "contactId": contact_id,
        });
        let resp: IdResponse = self
            .send_json(
                reqwest::Method::POST,
                &format!("/contacts/{}/tasks", contact_id),
                &body,
            )
            .await?;
        Ok(resp.id)
    }
}
