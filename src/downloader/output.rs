// Output resolution and request-scoped storage
//
// yt-dlp's predicted filename is not always what ends up on disk: merging
// changes the container and audio extraction changes the extension. The
// resolver probes the known post-processing extensions to find the real file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::errors::MediaError;
use super::models::MediaKind;
use super::options::AUDIO_CODEC;

/// Extensions tried, in order, when the predicted file is missing
pub const PROBE_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "webm", AUDIO_CODEC];

/// Map the predicted path to the file that actually exists.
pub fn resolve_output(predicted: &Path, kind: MediaKind) -> Result<PathBuf, MediaError> {
    let mut resolved = predicted.to_path_buf();

    if !resolved.is_file() {
        if let Some(found) = PROBE_EXTENSIONS
            .iter()
            .map(|ext| predicted.with_extension(ext))
            .find(|candidate| candidate.is_file())
        {
            debug!(
                "Predicted {} missing, found {}",
                predicted.display(),
                found.display()
            );
            resolved = found;
        }
    }

    // Audio extraction always leaves an mp3 behind, whatever was predicted
    if kind == MediaKind::Audio {
        resolved.set_extension(AUDIO_CODEC);
    }

    if resolved.is_file() {
        Ok(resolved)
    } else {
        Err(MediaError::OutputNotFound(resolved))
    }
}

/// Directory owned by exactly one request. Removed, with everything in it,
/// when dropped.
#[derive(Debug)]
pub struct JobDir {
    id: Uuid,
    path: PathBuf,
}

impl JobDir {
    pub async fn create(work_dir: &Path) -> Result<Self, MediaError> {
        let id = Uuid::new_v4();
        let path = work_dir.join(id.to_string());
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { id, path })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobDir {
    fn drop(&mut self) {
        let id = self.id;
        let path = std::mem::take(&mut self.path);
        run_cleanup(move || match std::fs::remove_dir_all(&path) {
            Ok(()) => debug!("[job {}] Removed {}", id, path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("[job {}] Failed to remove {}: {}", id, path.display(), e),
        });
    }
}

/// Run blocking file-system cleanup on the blocking pool when inside a
/// runtime, inline otherwise.
pub fn run_cleanup<F>(cleanup: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(cleanup);
        }
        Err(_) => cleanup(),
    }
}
