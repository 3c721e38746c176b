use std::path::{Path, PathBuf};

use serde::Serialize;

use super::utils::run_output_with_timeout;

const VERSION_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_args(&self) -> Vec<String> {
        match self {
            ToolType::YtDlp => vec!["--version".to_string()],
            ToolType::Ffmpeg => vec!["-version".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub path: Option<String>,
    pub version: Option<String>,
    pub is_available: bool,
}

pub struct ToolManager;

impl ToolManager {
    /// Find a binary: common install prefixes first, then PATH
    pub fn locate(tool_type: ToolType) -> Option<PathBuf> {
        let binary_name = tool_type.as_str();

        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name), // Homebrew on Apple Silicon
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];

        for path in common_paths {
            let path = PathBuf::from(path);
            if path.is_file() {
                return Some(path);
            }
        }

        Self::search_path(binary_name)
    }

    fn search_path(binary_name: &str) -> Option<PathBuf> {
        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths)
            .map(|dir| dir.join(binary_name))
            .find(|candidate| candidate.is_file())
    }

    /// Probe a binary for its version string
    pub async fn tool_info(tool_type: ToolType, path: Option<&Path>) -> ToolInfo {
        let name = tool_type.as_str().to_string();
        let Some(path) = path else {
            return ToolInfo {
                name,
                path: None,
                version: None,
                is_available: false,
            };
        };

        let program = path.to_string_lossy().to_string();
        let version = match run_output_with_timeout(
            &program,
            tool_type.version_args(),
            VERSION_TIMEOUT_SECS,
        )
        .await
        {
            Ok(output) if output.status.success() => {
                // ffmpeg prints a banner; the first line carries the version
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .map(|line| line.trim().to_string())
            }
            _ => None,
        };

        ToolInfo {
            name,
            path: Some(program),
            is_available: version.is_some(),
            version,
        }
    }
}
