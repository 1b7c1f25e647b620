use anyhow::Result;
use async_trait::async_trait;

/// Reads document text on behalf of the tracker, e.g. to compute baselines
/// when a document is first observed. Failures are surfaced to the caller and
/// logged there; the triggering transition is abandoned, never crashed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentReader: Send + Sync {
    async fn read(&self, path: &str) -> Result<String>;
}

pub struct FsContentReader;

#[async_trait]
impl ContentReader for FsContentReader {
    async fn read(&self, path: &str) -> Result<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}
