// Route handlers

use std::path::{Path, PathBuf};

use axum::{
    body::Bytes,
    extract::State,
    response::Response,
    Json,
};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use super::error::ApiError;
use super::stream::file_response;
use super::AppState;
use crate::config::Settings;
use crate::downloader::policy::CLIENT_POLICY;
use crate::downloader::tools::{ToolInfo, ToolManager, ToolType};
use crate::downloader::{ExtractionResult, JobDir, MediaKind, MediaRequest, ProviderConfig};

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub started_at: String,
    pub cookies: CookieReport,
    pub tools: Vec<ToolInfo>,
    pub environment: EnvironmentReport,
}

#[derive(Debug, Serialize)]
pub struct CookieReport {
    pub path: String,
    pub exists: bool,
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct EnvironmentReport {
    pub work_dir: String,
    pub user_agent_override: bool,
    pub client_policy_revision: u32,
    pub client_profile: &'static str,
    pub container: bool,
}

fn running_in_container() -> bool {
    Path::new("/.dockerenv").exists() || std::env::var_os("RENDER").is_some()
}

/// Parse a request body. An empty body counts as `{}` so a missing URL is
/// reported as such rather than as a JSON error.
fn parse_request(body: &Bytes) -> Result<MediaRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(MediaRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}

fn require_url(request: &MediaRequest) -> Result<String, ApiError> {
    request
        .url()
        .map(ToString::to_string)
        .ok_or_else(|| ApiError::bad_request("URL is required"))
}

/// Version check for yt-dlp and ffmpeg. Run once at startup; health reports
/// the cached result.
pub async fn detect_tools(settings: &Settings) -> Vec<ToolInfo> {
    let ytdlp_path = PathBuf::from(&settings.ytdlp_bin);
    let ffmpeg_path = settings.ffmpeg_location.as_ref().map(|p| {
        if p.is_dir() {
            p.join(ToolType::Ffmpeg.as_str())
        } else {
            p.clone()
        }
    });
    let (ytdlp, ffmpeg) = tokio::join!(
        ToolManager::tool_info(ToolType::YtDlp, Some(ytdlp_path.as_path())),
        ToolManager::tool_info(ToolType::Ffmpeg, ffmpeg_path.as_deref()),
    );
    vec![ytdlp, ffmpeg]
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let settings = &state.settings;

    Json(HealthReport {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at.format(&Rfc3339).unwrap_or_default(),
        cookies: CookieReport {
            path: settings.cookies.path().display().to_string(),
            exists: settings.cookies.exists(),
            size_bytes: settings.cookies.size_bytes(),
        },
        tools: state.tools.as_ref().clone(),
        environment: EnvironmentReport {
            work_dir: settings.work_dir.display().to_string(),
            user_agent_override: settings.user_agent_override.is_some(),
            client_policy_revision: CLIENT_POLICY.revision,
            client_profile: CLIENT_POLICY.select(settings.cookies_available).name,
            container: running_in_container(),
        },
    })
}

pub async fn video_info(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ExtractionResult>, ApiError> {
    let request = parse_request(&body)?;
    let url = require_url(&request)?;

    // Metadata does not depend on the requested format
    let kind = MediaKind::Video;
    let config = ProviderConfig::build(kind, kind.default_quality(), &state.settings);
    let info = state.provider.extract_info(&url, &config).await?;
    info!(
        "[{}] Info for {}: {:?}",
        state.provider.name(),
        url,
        info.title.as_deref().unwrap_or("<untitled>")
    );
    Ok(Json(info))
}

pub async fn download(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request = parse_request(&body)?;
    let url = require_url(&request)?;
    let kind = request.kind();
    let quality = request.quality();

    // Removed on every exit path once this guard is dropped
    let job = JobDir::create(&state.settings.work_dir).await?;
    info!(
        "[job {}] {} download of {} (quality {})",
        job.id(),
        kind,
        url,
        quality
    );

    let config = ProviderConfig::build(kind, &quality, &state.settings).with_output_dir(job.path());
    let media = state.provider.download(&url, &config).await?;

    Ok(file_response(media, job).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_empty_body_is_missing_url() {
        let request = parse_request(&Bytes::from_static(b"  ")).unwrap();
        let err = require_url(&request).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.detail, "URL is required");
    }

    #[test]
    fn test_malformed_json_is_bad_request() {
        let err = parse_request(&Bytes::from_static(b"{\"url\": ")).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.detail.starts_with("Invalid JSON body"));
    }

    #[test]
    fn test_numeric_quality_accepted() {
        let body = Bytes::from_static(br#"{"url": "https://youtu.be/x", "format": "audio", "quality": 320}"#);
        let request = parse_request(&body).unwrap();
        assert_eq!(require_url(&request).unwrap(), "https://youtu.be/x");
        assert_eq!(request.quality(), "320");
    }
}
