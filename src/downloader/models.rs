// Common data models for the downloader

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default height ceiling for video downloads
pub const DEFAULT_VIDEO_QUALITY: &str = "1080";

/// Default bitrate (kbps) for audio extraction
pub const DEFAULT_AUDIO_QUALITY: &str = "192";

/// Kind of media the caller wants back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
}

impl MediaKind {
    pub fn default_quality(&self) -> &'static str {
        match self {
            Self::Video => DEFAULT_VIDEO_QUALITY,
            Self::Audio => DEFAULT_AUDIO_QUALITY,
        }
    }

    /// Content-Type of the file served for this kind
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Video => "video/mp4",
            Self::Audio => "audio/mpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::Audio => "mp3",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// JSON body accepted by both API endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaRequest {
    pub url: Option<String>,
    /// "video" or "audio"; anything other than "audio" means video
    pub format: Option<String>,
    /// Accepted as a string or a bare JSON number
    #[serde(default, deserialize_with = "string_or_number")]
    pub quality: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "quality must be a string or number, got {}",
            other
        ))),
    }
}

impl MediaRequest {
    /// The URL, if present and not blank
    pub fn url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn kind(&self) -> MediaKind {
        match self.format.as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("audio") => MediaKind::Audio,
            _ => MediaKind::Video,
        }
    }

    /// Quality hint with the per-kind default applied
    pub fn quality(&self) -> String {
        self.quality
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| self.kind().default_quality())
            .to_string()
    }
}

/// Metadata extracted by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    /// Duration in whole seconds
    pub duration: Option<u64>,
    pub uploader: Option<String>,
    /// Where the provider said it would write the file (download mode only)
    #[serde(skip)]
    pub predicted_path: Option<PathBuf>,
}

/// A finished download: metadata plus the file that actually exists on disk
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub info: ExtractionResult,
    pub path: PathBuf,
    pub kind: MediaKind,
}
