//! Motion API client for fetching tasks and workspace metadata.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::error::ApiError;
use crate::retry::{with_retry, RetryPolicy};

const DEFAULT_BASE_URL: &str = "https://api.usemotion.com/v1";

/// Client for the Motion REST API, authenticated with a static API key.
pub struct MotionClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

/// Task fetched from Motion. Optional fields stay optional here; display
/// defaults are applied in the message formatter.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub project: Option<Project>,
    pub duration: Option<TaskDuration>,
    pub priority: Option<String>,
    #[serde(default)]
    pub completed: bool,
    /// Kept as the raw wire string so an unparseable value can still be
    /// shown to the user.
    pub completed_time: Option<String>,
    pub status: Option<TaskStatus>,
}

impl Task {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed task")
    }

    /// The completion instant, if present and parseable.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_time
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Motion durations are either integer minutes or a sentinel string
/// ("NONE", "REMINDER").
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TaskDuration {
    Minutes(f64),
    Label(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatus {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub workspace_type: Option<String>,
    pub team_id: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub statuses: Vec<TaskStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TasksPage {
    #[serde(default)]
    tasks: Vec<Task>,
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct WorkspacesPage {
    #[serde(default)]
    workspaces: Vec<Workspace>,
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageMeta {
    next_cursor: Option<String>,
}

impl MotionClient {
    pub fn new(api_key: &str) -> anyhow::Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(api_key)
            .map_err(|_| anyhow::anyhow!("MOTION_API_KEY contains invalid characters"))?;
        key_value.set_sensitive(true);
        headers.insert("X-API-Key", key_value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch the full task set for a workspace, following pagination until
    /// the response carries no further cursor.
    pub async fn get_tasks(
        &self,
        workspace_id: &str,
        include_all_statuses: bool,
    ) -> Result<Vec<Task>, ApiError> {
        let mut all_tasks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("workspaceId".to_string(), workspace_id.to_string()),
                (
                    "includeAllStatuses".to_string(),
                    include_all_statuses.to_string(),
                ),
            ];
            if let Some(c) = &cursor {
                params.push(("cursor".to_string(), c.clone()));
            }

            let page: TasksPage = with_retry(&self.retry, "GET /tasks", || {
                self.get_json("/tasks", &params)
            })
            .await?;

            let fetched = page.tasks.len();
            all_tasks.extend(page.tasks);

            match page.meta.and_then(|m| m.next_cursor) {
                Some(next) => {
                    tracing::info!("Retrieved {} tasks, fetching next page...", fetched);
                    cursor = Some(next);
                }
                None => break,
            }
        }

        tracing::info!("Retrieved total of {} tasks", all_tasks.len());
        Ok(all_tasks)
    }

    /// List every workspace the API key can see, following pagination.
    pub async fn get_workspaces(&self) -> Result<Vec<Workspace>, ApiError> {
        let mut all_workspaces = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = Vec::new();
            if let Some(c) = &cursor {
                params.push(("cursor".to_string(), c.clone()));
            }

            let page: WorkspacesPage = with_retry(&self.retry, "GET /workspaces", || {
                self.get_json("/workspaces", &params)
            })
            .await?;

            all_workspaces.extend(page.workspaces);

            match page.meta.and_then(|m| m.next_cursor) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(all_workspaces)
    }

    pub async fn get_user_info(&self) -> Result<UserInfo, ApiError> {
        with_retry(&self.retry, "GET /users/me", || {
            self.get_json("/users/me", &[])
        })
        .await
    }

    pub async fn get_workspace(&self, workspace_id: &str) -> Result<Workspace, ApiError> {
        let endpoint = format!("/workspaces/{}", workspace_id);
        with_retry(&self.retry, "GET /workspaces/{id}", || {
            self.get_json(&endpoint, &[])
        })
        .await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task, ApiError> {
        let endpoint = format!("/tasks/{}", task_id);
        with_retry(&self.retry, "GET /tasks/{id}", || {
            self.get_json(&endpoint, &[])
        })
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.http.get(&url).query(params).send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ApiError::Throttled { retry_after });
        }
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        Ok(response.json::<T>().await?)
    }
}
