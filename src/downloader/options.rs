// Provider configuration: everything yt-dlp needs for one request

use std::path::{Path, PathBuf};

use super::format_selector::FormatSelector;
use super::models::MediaKind;
use super::policy::{ClientProfile, CLIENT_POLICY};
use crate::config::Settings;

/// Container produced by the merge step for video requests
pub const MERGE_CONTAINER: &str = "mp4";

/// Codec (and extension) produced by audio extraction
pub const AUDIO_CODEC: &str = "mp3";

/// Filename template, relative to the job directory
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessing {
    /// Merge separate video and audio streams into one container
    Merge { container: &'static str },
    /// Re-encode to an audio codec at the given `--audio-quality` value
    ExtractAudio { codec: &'static str, quality: String },
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: MediaKind,
    pub format_selector: String,
    pub output_dir: Option<PathBuf>,
    pub cookies_path: Option<PathBuf>,
    pub client: ClientProfile,
    pub user_agent: String,
    pub post_processing: PostProcessing,
    pub ffmpeg_location: Option<PathBuf>,
    pub force_ipv4: bool,
    pub verify_certificates: bool,
    pub use_cache: bool,
}

impl ProviderConfig {
    /// Map (kind, quality) to a provider configuration. Never fails.
    pub fn build(kind: MediaKind, quality: &str, settings: &Settings) -> Self {
        let cookies_path = settings.cookies_path().map(Path::to_path_buf);
        let client = *CLIENT_POLICY.select(cookies_path.is_some());
        let user_agent = settings
            .user_agent_override
            .clone()
            .unwrap_or_else(|| client.user_agent.to_string());

        let post_processing = match kind {
            MediaKind::Audio => PostProcessing::ExtractAudio {
                codec: AUDIO_CODEC,
                quality: FormatSelector::audio_quality_arg(quality),
            },
            MediaKind::Video => PostProcessing::Merge {
                container: MERGE_CONTAINER,
            },
        };

        Self {
            kind,
            format_selector: FormatSelector::get_format_spec(kind, quality),
            output_dir: None,
            cookies_path,
            client,
            user_agent,
            post_processing,
            ffmpeg_location: settings.ffmpeg_location.clone(),
            force_ipv4: true,
            verify_certificates: false,
            use_cache: false,
        }
    }

    /// Write output under `dir` instead of the working directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn output_template(&self) -> String {
        match &self.output_dir {
            Some(dir) => dir.join(OUTPUT_TEMPLATE).to_string_lossy().to_string(),
            None => OUTPUT_TEMPLATE.to_string(),
        }
    }

    /// Extension the final file is expected to have
    pub fn final_extension(&self) -> &'static str {
        match &self.post_processing {
            PostProcessing::Merge { container } => container,
            PostProcessing::ExtractAudio { codec, .. } => codec,
        }
    }

    /// Arguments shared by metadata lookups and downloads
    pub fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--user-agent".to_string(),
            self.user_agent.clone(),
            "--extractor-args".to_string(),
            self.client.player_client_arg(),
        ];

        for (name, value) in self.client.headers {
            args.push("--add-header".to_string());
            args.push(format!("{}:{}", name, value));
        }

        if let Some(path) = &self.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.to_string_lossy().to_string());
        }

        if self.force_ipv4 {
            args.push("--force-ipv4".to_string());
        }
        if !self.verify_certificates {
            args.push("--no-check-certificates".to_string());
        }
        if !self.use_cache {
            args.push("--no-cache-dir".to_string());
        }

        args
    }

    /// Arguments for a download, without the URL
    pub fn download_args(&self) -> Vec<String> {
        let mut args = self.common_args();
        args.extend([
            "-f".to_string(),
            self.format_selector.clone(),
            "-o".to_string(),
            self.output_template(),
        ]);

        match &self.post_processing {
            PostProcessing::Merge { container } => {
                args.push("--merge-output-format".to_string());
                args.push(container.to_string());
            }
            PostProcessing::ExtractAudio { codec, quality } => {
                args.extend([
                    "-x".to_string(),
                    "--audio-format".to_string(),
                    codec.to_string(),
                    "--audio-quality".to_string(),
                    quality.clone(),
                ]);
            }
        }

        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.to_string_lossy().to_string());
        }

        args
    }
}
