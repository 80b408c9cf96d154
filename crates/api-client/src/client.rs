use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use tablewatch_core::error::Result;
use tablewatch_core::{
    ArchivedTableRecord, ClusterTasks, FetchError, LogLine, MergeTaskRecord, ScanTaskRecord,
    TaskSource, TestTableTaskRecord,
};

use crate::retry::{RetryConfig, retry_get};

const MERGE_KIND: &str = "merge";
const TEST_TABLE_KIND: &str = "test_table_generation";

/// HTTP client for the job-execution API.
///
/// Every endpoint is a read-only GET, so all calls go through [`retry_get`].
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    retry: RetryConfig,
}

impl ApiClient {
    /// Create a new client with the given base URL and timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport)?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
            retry: RetryConfig::default(),
        }
    }

    /// Set the bearer token. Blank tokens clear authentication.
    pub fn set_auth(&mut self, token: impl Into<String>) {
        let token = token.into();
        self.auth_token = (!token.trim().is_empty()).then_some(token);
    }

    pub fn set_retry(&mut self, retry: RetryConfig) {
        self.retry = retry;
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("GET {url}");
        let resp = retry_get(&self.client, &url, self.auth_token(), &self.retry)
            .await
            .map_err(transport)?;
        parse_response(resp).await
    }
}

fn cluster_path(cluster_id: &str, suffix: &str) -> Result<String> {
    let cluster_id = cluster_id.trim();
    if cluster_id.is_empty() {
        return Err(FetchError::NotConfigured("cluster id".to_string()));
    }
    Ok(format!(
        "/clusters/{}/{suffix}",
        urlencoding::encode(cluster_id)
    ))
}

impl TaskSource for ApiClient {
    async fn fetch_merge_tasks(&self, cluster_id: &str) -> Result<ClusterTasks> {
        let path = cluster_path(cluster_id, "tasks")?;
        let items: Vec<serde_json::Value> = self.get_json(&path).await?;
        split_cluster_tasks(items)
    }

    async fn fetch_scan_tasks(
        &self,
        cluster_id: &str,
        status_filter: Option<&str>,
    ) -> Result<Vec<ScanTaskRecord>> {
        let mut path = cluster_path(cluster_id, "scans")?;
        if let Some(status) = status_filter.map(str::trim).filter(|s| !s.is_empty()) {
            path.push_str("?status=");
            path.push_str(&urlencoding::encode(status));
        }
        self.get_json(&path).await
    }

    async fn fetch_archived_tables(
        &self,
        cluster_id: &str,
        limit: usize,
    ) -> Result<Vec<ArchivedTableRecord>> {
        let path = format!("{}?limit={limit}", cluster_path(cluster_id, "archives")?);
        self.get_json(&path).await
    }

    async fn fetch_task_logs(&self, task_id: &str) -> Result<Vec<LogLine>> {
        let path = format!("/tasks/{}/logs", urlencoding::encode(task_id));
        self.get_json(&path).await
    }
}

/// Split the mixed cluster task list by its `type` discriminator.
///
/// Items of an unknown kind are logged and dropped; a known kind that fails
/// to decode fails the whole fetch.
pub fn split_cluster_tasks(items: Vec<serde_json::Value>) -> Result<ClusterTasks> {
    let mut out = ClusterTasks::default();
    for item in items {
        let kind = item
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        match kind.as_str() {
            MERGE_KIND => out.merge.push(serde_json::from_value::<MergeTaskRecord>(item)?),
            TEST_TABLE_KIND => out
                .test_table
                .push(serde_json::from_value::<TestTableTaskRecord>(item)?),
            other => {
                let id = item.get("id").and_then(serde_json::Value::as_str);
                warn!("Dropping cluster task {id:?} of unknown type {other:?}");
            }
        }
    }
    Ok(out)
}

fn transport(err: reqwest::Error) -> FetchError {
    FetchError::Transport(err.to_string())
}

async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FetchError::Http {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = resp.bytes().await.map_err(transport)?;
    Ok(serde_json::from_slice(&bytes)?)
}
