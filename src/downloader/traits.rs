// Media provider trait definition

use async_trait::async_trait;

use super::errors::MediaError;
use super::models::{DownloadedMedia, ExtractionResult};
use super::options::ProviderConfig;

/// Something that can turn a URL into metadata and a local media file
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Name of the provider (for logging)
    fn name(&self) -> &'static str;

    /// Fetch metadata only; writes nothing to disk
    async fn extract_info(
        &self,
        url: &str,
        config: &ProviderConfig,
    ) -> Result<ExtractionResult, MediaError>;

    /// Download into `config.output_dir` and return the file that actually exists
    async fn download(
        &self,
        url: &str,
        config: &ProviderConfig,
    ) -> Result<DownloadedMedia, MediaError>;
}
