//! Sync Server API Client
//!
//! HTTP boundary to the sync server. The server owns all reconciliation
//! logic (pairing Toggl entries with Jira worklogs, computing the writes
//! needed to align them); this module only issues the calls and decodes
//! what comes back:
//!
//! - `GET /api/settings` - account settings for display
//! - `GET /api/diff?min=..&max=..` - the reconciliation result for one day
//! - `POST /api/diff/sync?min=..&max=..` - execute the pending writes;
//!   the response body is streamed newline-delimited JSON, one
//!   `{current, total}` record per completed step
//!
//! Orchestration code talks to the [`DiffService`] trait rather than the
//! concrete client, so tests can substitute an in-process fake.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ClientConfig;
use crate::lines::read_lines;

/// Default end-to-end deadline for one server call, streaming included.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// Wire Types
// =============================================================================

/// Account settings reported by the server.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Jira account the server syncs into; surfaces show it in the header.
    pub jira_username: Option<String>,
}

/// Severity of a reconciliation note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    /// Cosmetic adjustment (e.g. aligning a start time to the minute).
    Info,
    /// Something worth a look (e.g. a project that is not set up).
    Warning,
    /// A destructive or high-impact write (create/delete/move).
    Danger,
}

/// Human-readable note attached to a diff.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// The rendered message text.
    pub message: String,
    /// Severity, for surface styling.
    pub level: MessageLevel,
}

/// One pending write against Toggl or Jira.
///
/// The `values` payload is intentionally schemaless: the server composes it
/// per target system and the client never interprets it, only displays and
/// replays it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionRecord {
    /// Target system: `"toggl"` or `"jira"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Operation: `"create"`, `"update"` or `"delete"`.
    pub action: String,
    /// Identifier of the entry being written, when one exists.
    pub id: Option<serde_json::Value>,
    /// Issue key the write concerns, when known.
    pub issue: Option<String>,
    /// Field values the write applies.
    pub values: serde_json::Map<String, serde_json::Value>,
}

/// One time entry as the server reports it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorklogEntry {
    /// Start time, in the server's display format.
    pub time_start: Option<String>,
    /// Entry comment.
    pub comment: Option<String>,
    /// Issue key parsed out of the entry, when present.
    pub issue: Option<String>,
}

/// A paired Toggl/Jira entry with its pending actions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffRow {
    /// The Toggl side of the pairing, if any.
    pub toggl: Option<WorklogEntry>,
    /// The Jira side of the pairing, if any.
    pub jira: Option<WorklogEntry>,
    /// Writes needed to align this pairing.
    pub actions: Vec<ActionRecord>,
    /// Notes explaining the writes.
    pub messages: Vec<Message>,
}

/// Full reconciliation result for one day.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DayDiff {
    /// Entry pairings in display order.
    pub rows: Vec<DiffRow>,
    /// All pending writes for the day, flattened.
    pub actions: Vec<ActionRecord>,
    /// All notes for the day, flattened.
    pub messages: Vec<Message>,
}

/// One progress record from the streamed sync response.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Steps completed so far.
    pub current: u64,
    /// Total steps the sync will perform.
    pub total: u64,
}

impl SyncProgress {
    /// Completion as an integer percentage in `[0, 100]`.
    ///
    /// A record with `total == 0` reports 0.
    #[must_use]
    pub fn percent(self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (100.0 * self.current as f64 / self.total as f64).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by [`SyncApi`] beyond transport failures.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-success status. The Display form is
    /// the response body text, which is what surfaces show the user; the
    /// status stays available as structured data.
    #[error("{body}")]
    Status {
        /// HTTP status the server answered with.
        status: reqwest::StatusCode,
        /// Response body text.
        body: String,
    },
}

// =============================================================================
// Service Trait
// =============================================================================

/// The sync-server operations orchestration depends on.
///
/// [`SyncApi`] is the production implementation; tests provide in-process
/// fakes so scheduling and event flow can be exercised without a server.
#[async_trait]
pub trait DiffService: Send + Sync {
    /// Fetch account settings.
    async fn fetch_settings(&self) -> anyhow::Result<Settings>;

    /// Fetch the reconciliation result for the half-open range `[min, max)`.
    async fn fetch_diff(
        &self,
        min: &DateTime<Local>,
        max: &DateTime<Local>,
    ) -> anyhow::Result<DayDiff>;

    /// Execute the pending writes for `[min, max)`.
    ///
    /// `on_progress` receives an integer percentage per progress record, in
    /// stream order. The call resolves once the server's stream ends.
    async fn sync_day(
        &self,
        min: &DateTime<Local>,
        max: &DateTime<Local>,
        on_progress: &mut (dyn FnMut(u8) + Send),
    ) -> anyhow::Result<()>;
}

// =============================================================================
// HTTP Client
// =============================================================================

/// HTTP client for the sync server.
#[derive(Clone, Debug)]
pub struct SyncApi {
    /// Server base URL, without a trailing slash.
    base_url: String,
    /// Underlying HTTP client.
    http: reqwest::Client,
}

impl SyncApi {
    /// Create a client for the given base URL with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with an explicit per-call deadline.
    ///
    /// The deadline covers the whole call, response streaming included, and
    /// is the only timeout this crate imposes on server work.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Create a client from a loaded [`ClientConfig`].
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_timeout(config.base_url.clone(), config.request_timeout)
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn settings_url(&self) -> String {
        format!("{}/api/settings", self.base_url)
    }

    fn diff_url(&self) -> String {
        format!("{}/api/diff", self.base_url)
    }

    fn sync_url(&self) -> String {
        format!("{}/api/diff/sync", self.base_url)
    }

    /// Turn a non-success response into [`ApiError::Status`].
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status { status, body })
    }
}

#[async_trait]
impl DiffService for SyncApi {
    async fn fetch_settings(&self) -> anyhow::Result<Settings> {
        tracing::debug!(url = %self.settings_url(), "fetching settings");
        let response = self.http.get(self.settings_url()).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn fetch_diff(
        &self,
        min: &DateTime<Local>,
        max: &DateTime<Local>,
    ) -> anyhow::Result<DayDiff> {
        tracing::debug!(min = %min, max = %max, "fetching diff");
        let response = self
            .http
            .get(self.diff_url())
            .query(&[("min", min.to_rfc3339()), ("max", max.to_rfc3339())])
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn sync_day(
        &self,
        min: &DateTime<Local>,
        max: &DateTime<Local>,
        on_progress: &mut (dyn FnMut(u8) + Send),
    ) -> anyhow::Result<()> {
        tracing::debug!(min = %min, max = %max, "executing sync");
        let response = self
            .http
            .post(self.sync_url())
            .query(&[("min", min.to_rfc3339()), ("max", max.to_rfc3339())])
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        // Each line is one progress record; a record that does not parse
        // aborts the stream, it is not skipped.
        let stream = response.bytes_stream().boxed();
        read_lines(stream, |line| {
            let tick: SyncProgress = serde_json::from_str(line)?;
            on_progress(tick.percent());
            Ok(())
        })
        .await
    }
}

// =============================================================================
// Tests
// =============================================================================
