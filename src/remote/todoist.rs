// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Todoist Sync API (v8) client.
//!
//! Every call is a form-encoded `POST {endpoint}{version}{path}` with a
//! bearer token. For single-item lookups a 404, an empty body or a body
//! without the expected key all mean the resource is absent. The full pull
//! has no such fallback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::{RemoteClient, RemoteError};
use crate::config::SyncConfig;
use crate::metrics;
use crate::model::{ArchivePage, EntityId, Project, Section, Snapshot, Task, TaskDetail};

pub struct TodoistClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    calls: AtomicU64,
}

impl TodoistClient {
    pub fn new(config: &SyncConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url(),
            token: config.api_token.clone(),
            calls: AtomicU64::new(0),
        })
    }

    /// POST a form and return the parsed body, or `None` when the remote
    /// reports the resource missing.
    async fn post_form(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        form: &[(&str, String)],
    ) -> Result<Option<Value>, RemoteError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .query(query)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                metrics::record_api_call(endpoint, "error");
                RemoteError::Transport(e.to_string())
            })?;
        self.calls.fetch_add(1, Ordering::Relaxed);

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(endpoint, "Remote resource not found");
            metrics::record_api_call(endpoint, "not_found");
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !status.is_success() {
            metrics::record_api_call(endpoint, "error");
            return Err(map_http_error(status, &body));
        }
        metrics::record_api_call(endpoint, "ok");

        if body.trim().is_empty() {
            warn!(endpoint, "Empty response body");
            return Ok(None);
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| RemoteError::Decode(format!("{endpoint}: {e}")))
    }
}

/// Decode `value[key]` when present and non-null.
fn extract<T: DeserializeOwned>(value: &Value, key: &str) -> Result<Option<T>, RemoteError> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(inner) => serde_json::from_value(inner.clone())
            .map(Some)
            .map_err(|e| RemoteError::Decode(format!("{key}: {e}"))),
    }
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, RemoteError> {
    serde_json::from_value(value).map_err(|e| RemoteError::Decode(format!("{what}: {e}")))
}

/// Map HTTP error responses to typed errors.
pub fn map_http_error(status: reqwest::StatusCode, body: &str) -> RemoteError {
    let detail = extract_error_message(body);

    match status.as_u16() {
        401 | 403 => RemoteError::Auth(detail),
        code => RemoteError::Status { status: code, message: detail },
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| {
            if body.is_empty() {
                "no response body".to_string()
            } else {
                body.chars().take(500).collect()
            }
        })
}

#[async_trait]
impl RemoteClient for TodoistClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, RemoteError> {
        let form = [
            ("sync_token", "*".to_string()),
            ("resource_types", r#"["all"]"#.to_string()),
        ];
        match self.post_form("sync", &[], &form).await? {
            Some(body) => decode(body, "sync"),
            None => Err(RemoteError::SnapshotUnavailable(
                "sync endpoint returned no body".into(),
            )),
        }
    }

    async fn fetch_task(&self, id: EntityId) -> Result<Option<TaskDetail>, RemoteError> {
        let Some(body) = self.post_form("items/get", &[], &[("item_id", id.to_string())]).await? else {
            return Ok(None);
        };
        if body.get("item").map_or(true, Value::is_null) {
            return Ok(None);
        }
        decode(body, "items/get").map(Some)
    }

    async fn fetch_project(&self, id: EntityId) -> Result<Option<Project>, RemoteError> {
        let form = [("project_id", id.to_string()), ("all_data", "true".to_string())];
        match self.post_form("projects/get", &[], &form).await? {
            Some(body) => extract(&body, "project"),
            None => Ok(None),
        }
    }

    async fn fetch_section(&self, id: EntityId) -> Result<Option<Section>, RemoteError> {
        match self.post_form("sections/get", &[], &[("section_id", id.to_string())]).await? {
            Some(body) => extract(&body, "section"),
            None => Ok(None),
        }
    }

    async fn fetch_archived_tasks(&self, project_id: EntityId) -> Result<Vec<Task>, RemoteError> {
        let mut tasks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("project_id", project_id.to_string())];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }
            let Some(body) = self.post_form("archive/items", &query, &[]).await? else {
                break;
            };
            let page: ArchivePage = decode(body, "archive/items")?;
            tasks.extend(page.tasks);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                (true, _) => {
                    warn!(project_id, "Archive page claims more without a new cursor; stopping");
                    break;
                }
                (false, _) => break,
            }
        }

        debug!(project_id, count = tasks.len(), "Archived tasks fetched");
        Ok(tasks)
    }

    fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}
