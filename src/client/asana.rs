//! HTTP client for the Asana REST API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::TaskService;
use crate::config::AsanaConfig;
use crate::error::{ClientError, ClientResult};
use crate::types::{ResourceRef, TaskRecord};

/// Fields requested when fetching a single task.
const TASK_FIELDS: &str =
    "gid,name,custom_fields,due_on,memberships.project.gid,memberships.section.gid";

/// Fields requested when listing a project's tasks.
const LIST_FIELDS: &str = "gid,name,memberships.project.gid,custom_fields";

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct PageEnvelope<T> {
    data: Vec<T>,
    #[serde(default)]
    next_page: Option<NextPage>,
}

#[derive(Deserialize)]
struct NextPage {
    offset: String,
}

/// A registered webhook subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub gid: String,
    pub resource: ResourceRef,
    pub target: String,
    #[serde(default)]
    pub active: bool,
}

/// Asana API client authenticated with a personal access token.
pub struct AsanaClient {
    client: Client,
    base_url: String,
    token: String,
    page_size: u32,
}

impl AsanaClient {
    /// Create a client from configuration.
    ///
    /// Fails when no access token is configured or the HTTP client cannot be
    /// constructed.
    pub fn new(config: &AsanaConfig) -> Result<Self> {
        let token = config
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .context("Please set ASANA_ACCESS_TOKEN in the environment variables")?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            page_size: config.page_size.clamp(1, 100),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> ClientResult<reqwest::Response> {
        request
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ClientError::transport(operation, e))
    }

    async fn read_json<T: DeserializeOwned>(
        operation: &'static str,
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport(operation, e))?;
        if !status.is_success() {
            return Err(ClientError::Status {
                operation,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        serde_json::from_slice(&body).map_err(|e| ClientError::decode(operation, e))
    }

    /// List the workspaces visible to the token.
    pub async fn list_workspaces(&self) -> ClientResult<Vec<ResourceRef>> {
        let request = self.client.get(self.url("/workspaces"));
        let response = self.send("list_workspaces", request).await?;
        let envelope: DataEnvelope<Vec<ResourceRef>> =
            Self::read_json("list_workspaces", response).await?;
        Ok(envelope.data)
    }

    /// List the projects of a workspace.
    pub async fn list_projects(&self, workspace_gid: &str) -> ClientResult<Vec<ResourceRef>> {
        let request = self
            .client
            .get(self.url("/projects"))
            .query(&[("workspace", workspace_gid)]);
        let response = self.send("list_projects", request).await?;
        let envelope: DataEnvelope<Vec<ResourceRef>> =
            Self::read_json("list_projects", response).await?;
        Ok(envelope.data)
    }

    /// Subscribe `target_url` to task changes and additions under `resource_gid`.
    ///
    /// The tracker performs the `X-Hook-Secret` handshake against the target
    /// before this call returns, so the server must already be running.
    pub async fn create_webhook(
        &self,
        resource_gid: &str,
        target_url: &str,
    ) -> ClientResult<Webhook> {
        let body = json!({
            "data": {
                "resource": resource_gid,
                "target": target_url,
                "filters": [
                    {"action": "changed", "resource_type": "task"},
                    {"action": "added", "resource_type": "task"}
                ]
            }
        });
        let request = self.client.post(self.url("/webhooks")).json(&body);
        let response = self.send("create_webhook", request).await?;
        let envelope: DataEnvelope<Webhook> = Self::read_json("create_webhook", response).await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl TaskService for AsanaClient {
    async fn fetch_task(&self, gid: &str) -> ClientResult<Option<TaskRecord>> {
        let request = self
            .client
            .get(self.url(&format!("/tasks/{gid}")))
            .query(&[("opt_fields", TASK_FIELDS)]);
        let response = self.send("fetch_task", request).await?;

        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN
        ) {
            debug!(task = %gid, status = %response.status(), "Task not visible");
            return Ok(None);
        }

        let envelope: DataEnvelope<TaskRecord> = Self::read_json("fetch_task", response).await?;
        Ok(Some(envelope.data))
    }

    async fn list_project_tasks(&self, project_gid: &str) -> ClientResult<Vec<TaskRecord>> {
        let url = self.url(&format!("/projects/{project_gid}/tasks"));
        let limit = self.page_size.to_string();
        let mut tasks = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("opt_fields", LIST_FIELDS), ("limit", limit.as_str())]);
            if let Some(ref offset) = offset {
                request = request.query(&[("offset", offset.as_str())]);
            }

            let response = self.send("list_project_tasks", request).await?;
            let page: PageEnvelope<TaskRecord> =
                Self::read_json("list_project_tasks", response).await?;
            tasks.extend(page.data);

            match page.next_page {
                Some(next) => offset = Some(next.offset),
                None => break,
            }
        }

        debug!(project = %project_gid, count = tasks.len(), "Listed project tasks");
        Ok(tasks)
    }

    async fn update_due_date(&self, gid: &str, due_on: NaiveDate) -> ClientResult<()> {
        let body = json!({ "data": { "due_on": due_on.format("%Y-%m-%d").to_string() } });
        let request = self
            .client
            .put(self.url(&format!("/tasks/{gid}")))
            .json(&body);
        let response = self.send("update_due_date", request).await?;

        // Only the status matters; the echoed task body is not needed.
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                operation: "update_due_date",
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
