// Downloader module - provider abstraction over yt-dlp

pub mod diagnostics;
pub mod errors;
pub mod format_selector;
pub mod models;
pub mod options;
pub mod output;
pub mod policy;
pub mod tools;
pub mod traits;
pub mod utils;
pub mod ytdlp;

pub use errors::MediaError;
pub use models::{DownloadedMedia, ExtractionResult, MediaKind, MediaRequest};
pub use options::ProviderConfig;
pub use output::{resolve_output, JobDir};
pub use traits::MediaProvider;
pub use ytdlp::YtDlpProvider;
