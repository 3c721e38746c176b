// yt-dlp provider - drives the native `yt-dlp` binary
//
// Metadata: `--dump-single-json --skip-download`.
// Download: `--no-simulate` with two prints, the info JSON at the video stage
// (carries the predicted `filename`) and `after_move:filepath` once
// post-processing is done. The reported path is then checked on disk.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::diagnostics::diagnose_error;
use super::errors::MediaError;
use super::models::{DownloadedMedia, ExtractionResult, MediaKind};
use super::options::ProviderConfig;
use super::output::resolve_output;
use super::traits::MediaProvider;
use super::utils::{error_text, run_output_with_timeout, stdout_lines};

pub struct YtDlpProvider {
    ytdlp_path: String,
    info_timeout_secs: u64,
    download_timeout_secs: u64,
}

impl YtDlpProvider {
    pub fn new(ytdlp_path: impl Into<String>, info_timeout_secs: u64, download_timeout_secs: u64) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            info_timeout_secs,
            download_timeout_secs,
        }
    }

    fn info_args(url: &str, config: &ProviderConfig) -> Vec<String> {
        let mut args = config.common_args();
        args.extend([
            "--dump-single-json".to_string(),
            "--skip-download".to_string(),
            url.to_string(),
        ]);
        args
    }

    fn download_args(url: &str, config: &ProviderConfig) -> Vec<String> {
        let mut args = config.download_args();
        args.extend([
            "--no-simulate".to_string(),
            "--print".to_string(),
            "video:%()j".to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            url.to_string(),
        ]);
        args
    }

    async fn run(&self, args: Vec<String>, timeout_secs: u64) -> Result<std::process::Output, MediaError> {
        debug!("[yt-dlp] {} {}", self.ytdlp_path, args.join(" "));
        let output = run_output_with_timeout(&self.ytdlp_path, args, timeout_secs)
            .await
            .inspect_err(|e| log_failure(&e.to_string()))?;

        if !output.status.success() {
            let message = error_text(&output);
            log_failure(&message);
            return Err(MediaError::ExtractionFailed(message));
        }
        Ok(output)
    }
}

fn log_failure(message: &str) {
    if let Some(reason) = diagnose_error(message) {
        warn!(
            "[yt-dlp] failed ({}; cookies might help: {}): {}",
            reason.description(),
            reason.cookies_might_help(),
            message
        );
    }
}

/// Parse an info JSON document. `null` or empty output means upstream gave us nothing.
pub fn parse_info(stdout: &str, stderr_hint: &str) -> Result<ExtractionResult, MediaError> {
    let trimmed = stdout.trim();
    let nothing = || {
        let hint = stderr_hint.trim();
        MediaError::ExtractionFailed(if hint.is_empty() {
            "yt-dlp returned no metadata for this URL".to_string()
        } else {
            hint.to_string()
        })
    };

    if trimmed.is_empty() {
        return Err(nothing());
    }

    let json: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| MediaError::ExtractionFailed(format!("Invalid JSON from yt-dlp: {}", e)))?;
    if json.as_object().map_or(true, |fields| fields.is_empty()) {
        return Err(nothing());
    }

    let text = |key: &str| json[key].as_str().map(ToString::to_string);

    Ok(ExtractionResult {
        title: text("title"),
        thumbnail: text("thumbnail"),
        duration: json["duration"]
            .as_u64()
            .or_else(|| json["duration"].as_f64().map(|d| d.max(0.0).round() as u64)),
        uploader: text("uploader"),
        predicted_path: text("filename")
            .or_else(|| text("_filename"))
            .map(PathBuf::from),
    })
}

/// Turn the `--print` output of a finished download into the file to serve.
/// An `after_move` path that exists wins; otherwise the info JSON's predicted
/// filename goes through the extension fallback.
pub fn parse_download_output(
    lines: &[String],
    stderr: &str,
    kind: MediaKind,
) -> Result<DownloadedMedia, MediaError> {
    let info = match lines.iter().find(|line| line.starts_with('{')) {
        Some(line) => parse_info(line, stderr)?,
        None => ExtractionResult::default(),
    };

    let moved_to = lines
        .iter()
        .rev()
        .find(|line| !line.starts_with('{'))
        .map(PathBuf::from)
        .filter(|path| path.is_file());

    let predicted = moved_to
        .or_else(|| info.predicted_path.clone())
        .ok_or_else(|| {
            MediaError::ExtractionFailed(if stderr.trim().is_empty() {
                "yt-dlp did not report an output filename".to_string()
            } else {
                stderr.trim().to_string()
            })
        })?;

    let path = resolve_output(&predicted, kind)?;
    Ok(DownloadedMedia { info, path, kind })
}

#[async_trait]
impl MediaProvider for YtDlpProvider {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract_info(
        &self,
        url: &str,
        config: &ProviderConfig,
    ) -> Result<ExtractionResult, MediaError> {
        info!("[yt-dlp] Fetching info for {} (client profile: {})", url, config.client.name);
        let output = self
            .run(Self::info_args(url, config), self.info_timeout_secs)
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_info(&stdout, &stderr).inspect_err(|e| log_failure(&e.to_string()))
    }

    async fn download(
        &self,
        url: &str,
        config: &ProviderConfig,
    ) -> Result<DownloadedMedia, MediaError> {
        info!(
            "[yt-dlp] Starting {} download for {} (format: {}, client profile: {})",
            config.kind, url, config.format_selector, config.client.name
        );
        let output = self
            .run(Self::download_args(url, config), self.download_timeout_secs)
            .await?;

        let lines = stdout_lines(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let kind = config.kind;

        // Output resolution stats the disk
        let media = tokio::task::spawn_blocking(move || parse_download_output(&lines, &stderr, kind))
            .await
            .map_err(|e| MediaError::ExtractionFailed(format!("Output resolution failed: {}", e)))??;
        info!("[yt-dlp] Download finished: {}", media.path.display());
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::config::{CookieStore, Settings};

    fn settings() -> Settings {
        Settings {
            host: "127.0.0.1".to_string(),
            port: 0,
            cookies: CookieStore::new("/nonexistent/cookies.txt"),
            cookies_available: false,
            user_agent_override: None,
            ytdlp_bin: "yt-dlp".to_string(),
            ffmpeg_location: None,
            work_dir: std::env::temp_dir(),
            download_timeout_secs: 60,
            info_timeout_secs: 10,
        }
    }

    #[test]
    fn test_parse_info_fields() {
        let json = r#"{"title": "Clip", "thumbnail": "https://i.ytimg.com/x.jpg",
            "duration": 212, "uploader": "Someone", "filename": "/tmp/job/Clip.webm"}"#;
        let info = parse_info(json, "").unwrap();

        assert_eq!(info.title.as_deref(), Some("Clip"));
        assert_eq!(info.thumbnail.as_deref(), Some("https://i.ytimg.com/x.jpg"));
        assert_eq!(info.duration, Some(212));
        assert_eq!(info.uploader.as_deref(), Some("Someone"));
        assert_eq!(info.predicted_path, Some(PathBuf::from("/tmp/job/Clip.webm")));
    }

    #[test]
    fn test_parse_info_fractional_duration() {
        let info = parse_info(r#"{"title": "x", "duration": 61.6}"#, "").unwrap();
        assert_eq!(info.duration, Some(62));
        assert!(info.uploader.is_none());
    }

    #[test]
    fn test_null_result_surfaces_upstream_text() {
        let err = parse_info("null", "ERROR: [youtube] abc: Sign in to confirm you're not a bot")
            .unwrap_err();
        match err {
            MediaError::ExtractionFailed(msg) => {
                assert_eq!(msg, "ERROR: [youtube] abc: Sign in to confirm you're not a bot")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_result_without_hint() {
        let err = parse_info("  \n", "").unwrap_err();
        assert_eq!(err.to_string(), "yt-dlp returned no metadata for this URL");
    }

    #[test]
    fn test_download_args_print_paths() {
        let config = ProviderConfig::build(MediaKind::Audio, "192", &settings())
            .with_output_dir("/work/job");
        let args = YtDlpProvider::download_args("https://youtu.be/abc", &config);

        assert!(args.contains(&"--no-simulate".to_string()));
        assert!(args.contains(&"after_move:filepath".to_string()));
        assert!(args.contains(&"/work/job/%(title)s.%(ext)s".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc"));
    }

    #[test]
    fn test_info_args_skip_download() {
        let config = ProviderConfig::build(MediaKind::Video, "1080", &settings());
        let args = YtDlpProvider::info_args("https://youtu.be/abc", &config);

        assert!(args.contains(&"--skip-download".to_string()));
        assert!(!args.contains(&"-o".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc"));
    }

    fn info_line(title: &str, filename: &Path) -> String {
        serde_json::json!({ "title": title, "filename": filename }).to_string()
    }

    #[test]
    fn test_after_move_path_is_served() {
        let dir = tempfile::tempdir().unwrap();
        let merged = dir.path().join("Clip.mp4");
        std::fs::write(&merged, b"data").unwrap();
        let lines = vec![
            info_line("Clip", &dir.path().join("Clip.f137.webm")),
            merged.display().to_string(),
        ];

        let media = parse_download_output(&lines, "", MediaKind::Video).unwrap();
        assert_eq!(media.path, merged);
        assert_eq!(media.info.title.as_deref(), Some("Clip"));
        assert_eq!(media.kind, MediaKind::Video);
    }

    #[test]
    fn test_missing_after_move_falls_back_to_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let mkv = dir.path().join("Clip.mkv");
        std::fs::write(&mkv, b"data").unwrap();
        let lines = vec![
            info_line("Clip", &dir.path().join("Clip.webm")),
            dir.path().join("Gone.mp4").display().to_string(),
        ];

        let media = parse_download_output(&lines, "", MediaKind::Video).unwrap();
        assert_eq!(media.path, mkv);
    }

    #[test]
    fn test_no_reported_path_is_extraction_failure() {
        let lines = vec![r#"{"title": "Clip"}"#.to_string()];

        let err = parse_download_output(&lines, "", MediaKind::Video).unwrap_err();
        assert_eq!(err.to_string(), "yt-dlp did not report an output filename");

        let err = parse_download_output(&[], "ERROR: Postprocessing: ffmpeg not found", MediaKind::Video)
            .unwrap_err();
        assert!(matches!(err, MediaError::ExtractionFailed(_)));
        assert_eq!(err.to_string(), "ERROR: Postprocessing: ffmpeg not found");
    }

    #[test]
    fn test_audio_after_move_is_mp3() {
        let dir = tempfile::tempdir().unwrap();
        let mp3 = dir.path().join("Ünïcode 日本.mp3");
        std::fs::write(&mp3, b"data").unwrap();
        let lines = vec![
            info_line("Ünïcode 日本", &dir.path().join("Ünïcode 日本.webm")),
            mp3.display().to_string(),
        ];

        let media = parse_download_output(&lines, "", MediaKind::Audio).unwrap();
        assert_eq!(media.path, mp3);
        assert_eq!(media.kind, MediaKind::Audio);
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_found() {
        let provider = YtDlpProvider::new("/nonexistent/yt-dlp", 5, 5);
        let config = ProviderConfig::build(MediaKind::Video, "best", &settings());
        let err = provider
            .extract_info("https://youtu.be/abc", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }
}
