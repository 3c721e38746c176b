// Process configuration, read once at startup and shared by every request.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tracing::{info, warn};

use crate::downloader::tools::{ToolManager, ToolType};

pub const APP_DIR_NAME: &str = "media-relay";

/// Default download timeout (seconds)
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 900;

/// Default metadata lookup timeout (seconds)
pub const DEFAULT_INFO_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("YTDLP_COOKIES_B64 is not valid base64: {0}")]
    CookieDecode(#[from] base64::DecodeError),

    #[error("failed to write cookie file {path}: {source}")]
    CookieWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// cookies.txt handed to yt-dlp. Written once at startup, read-only afterwards.
#[derive(Debug, Clone)]
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Decode the base64 blob (if any) into the cookie file
    pub fn bootstrap(path: impl Into<PathBuf>, blob: Option<&str>) -> Result<Self, ConfigError> {
        let store = Self::new(path);
        let Some(blob) = blob else {
            return Ok(store);
        };

        // Blobs pasted into dashboards often pick up line breaks
        let compact: String = blob.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD.decode(compact.as_bytes())?;

        if let Some(parent) = store.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CookieWrite {
                path: store.path.clone(),
                source,
            })?;
        }
        fs::write(&store.path, &bytes).map_err(|source| ConfigError::CookieWrite {
            path: store.path.clone(),
            source,
        })?;
        restrict_permissions(&store.path);

        info!(
            "Cookie file written to {} ({} bytes)",
            store.path.display(),
            bytes.len()
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn size_bytes(&self) -> Option<u64> {
        fs::metadata(&self.path).ok().map(|m| m.len())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        warn!("Could not restrict permissions on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub cookies: CookieStore,
    /// Whether cookies were present at startup. Requests never re-check the disk.
    pub cookies_available: bool,
    pub user_agent_override: Option<String>,
    pub ytdlp_bin: String,
    pub ffmpeg_location: Option<PathBuf>,
    pub work_dir: PathBuf,
    pub download_timeout_secs: u64,
    pub info_timeout_secs: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any variable source. Writes the cookie file as a side effect.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("."));

        let cookies_path = var("YTDLP_COOKIES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("cookies.txt"));
        let cookies = CookieStore::bootstrap(cookies_path, var("YTDLP_COOKIES_B64").as_deref())?;
        let cookies_available = cookies.exists();
        if !cookies_available {
            warn!("No cookie file found; requests will use the mobile client profile");
        }

        let ytdlp_bin = var("YTDLP_BIN")
            .or_else(|| ToolManager::locate(ToolType::YtDlp).map(|p| p.to_string_lossy().to_string()))
            .unwrap_or_else(|| "yt-dlp".to_string());

        let ffmpeg_location = var("FFMPEG_LOCATION")
            .map(PathBuf::from)
            .or_else(|| ToolManager::locate(ToolType::Ffmpeg));
        if ffmpeg_location.is_none() {
            warn!("ffmpeg not found; merging and audio extraction will fail");
        }

        let work_dir = var("MEDIA_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_work_dir);

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_number(&var, "PORT", DEFAULT_PORT)?,
            cookies,
            cookies_available,
            user_agent_override: var("YTDLP_USER_AGENT"),
            ytdlp_bin,
            ffmpeg_location,
            work_dir,
            download_timeout_secs: parse_number(
                &var,
                "YTDLP_TIMEOUT_SECS",
                DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            )?,
            info_timeout_secs: parse_number(&var, "YTDLP_INFO_TIMEOUT_SECS", DEFAULT_INFO_TIMEOUT_SECS)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Cookie file to pass to yt-dlp, if one was present at startup
    pub fn cookies_path(&self) -> Option<&Path> {
        self.cookies_available.then(|| self.cookies.path())
    }
}

fn default_work_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join("jobs")
}

fn parse_number<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var: key, value }),
        None => Ok(default),
    }
}
