mod client;
mod types;


pub use client::{AzureDevOpsClient, DEFAULT_BASE_URL};
pub use types::BuildStatus;
