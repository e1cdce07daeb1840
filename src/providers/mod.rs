mod azure;

use async_trait::async_trait;

use crate::error::Result;

pub use azure::{AzureDevOpsClient, BuildStatus, DEFAULT_BASE_URL};

/// Source of the latest build status for the monitored pipeline.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Look up the status of the most recent run.
    ///
    /// `Ok(None)` means no usable status could be obtained this time.
    /// `Err` is reserved for faults that must stop monitoring.
    async fn latest_status(&self) -> Result<Option<BuildStatus>>;
}
