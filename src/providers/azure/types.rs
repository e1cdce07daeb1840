use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::{self, CanonicalStatus};

/// One execution of the monitored pipeline, as returned by the runs list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    /// Run identifier; doubles as the build id for the detail endpoint
    pub id: u64,
    /// Run name, usually the build number (e.g. "20261019.3")
    #[serde(default)]
    pub name: String,
    /// Lifecycle state (e.g. "inProgress", "completed")
    #[serde(default)]
    pub state: String,
    /// Outcome once completed (e.g. "succeeded", "failed")
    pub result: Option<String>,
    /// When the run was queued
    pub created_date: DateTime<Utc>,
    /// When the run finished, if it has
    pub finished_date: Option<DateTime<Utc>>,
    /// REST URL of the run
    #[serde(default)]
    pub url: String,
}

/// Authoritative status of a single build.
///
/// `result` is only meaningful once `status` is "completed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatus {
    pub status: Option<String>,
    pub result: Option<String>,
}

impl BuildStatus {
    /// Status label as reported to the operator, see [`status::overall_status`].
    pub fn overall(&self) -> String {
        status::overall_status(self.status.as_deref(), self.result.as_deref())
    }

    pub fn canonical(&self) -> CanonicalStatus {
        status::normalize(self.status.as_deref(), self.result.as_deref())
    }
}

/// Response from the pipeline runs list endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct PipelineRunsResponse {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub value: Vec<PipelineRun>,
}

/// Picks the most recently created run.
///
/// When several runs share the latest `created_date` the first one in
/// list order wins.
pub fn select_latest(runs: &[PipelineRun]) -> Option<&PipelineRun> {
    runs.iter().reduce(|latest, run| {
        if run.created_date > latest.created_date {
            run
        } else {
            latest
        }
    })
}
