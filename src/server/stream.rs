// Streams a downloaded file back to the client and deletes it afterwards.
//
// The file is owned by the response body. Whether the body is read to the end
// or dropped because the client went away, the guard's Drop removes the file
// and its job directory, once.

use std::borrow::Cow;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue,
    },
    response::{IntoResponse, Response},
};
use futures::Stream;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::downloader::output::run_cleanup;
use crate::downloader::{DownloadedMedia, JobDir, MediaError};

const DISPOSITION_PREFIX: &str = "attachment; filename*=UTF-8''";

/// Deletes the served file (then its job directory) when dropped
struct ServedFile {
    path: PathBuf,
    len: u64,
    sent: u64,
    job: Option<JobDir>,
}

impl Drop for ServedFile {
    fn drop(&mut self) {
        let Some(job) = self.job.take() else {
            return;
        };
        let job_id = job.id();
        if self.sent < self.len {
            info!(
                "[job {}] Stream aborted after {}/{} bytes",
                job_id, self.sent, self.len
            );
        } else {
            debug!("[job {}] Stream finished ({} bytes)", job_id, self.sent);
        }

        let path = std::mem::take(&mut self.path);
        run_cleanup(move || {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("[job {}] Failed to delete {}: {}", job_id, path.display(), e);
                }
            }
            drop(job);
        });
    }
}

/// File chunks, finite and not restartable
struct CleanupStream {
    inner: ReaderStream<File>,
    guard: ServedFile,
}

impl Stream for CleanupStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &poll {
            self.guard.sent += chunk.len() as u64;
        }
        poll
    }
}

/// File name for the Content-Disposition header. Latin-1 names pass through,
/// anything else is percent-encoded.
pub fn safe_filename(name: &str) -> Cow<'_, str> {
    if name.chars().all(|c| (c as u32) <= 0xFF) {
        Cow::Borrowed(name)
    } else {
        urlencoding::encode(name)
    }
}

pub fn content_disposition(name: &str) -> HeaderValue {
    let safe = safe_filename(name);

    // Header bytes are Latin-1, one byte per char
    let mut bytes = DISPOSITION_PREFIX.as_bytes().to_vec();
    bytes.extend(safe.chars().map(|c| c as u32 as u8));
    if let Ok(value) = HeaderValue::from_bytes(&bytes) {
        return value;
    }

    // Control characters can't go in a header verbatim
    let encoded = format!("{}{}", DISPOSITION_PREFIX, urlencoding::encode(name));
    HeaderValue::from_str(&encoded)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Build the streaming response for a finished download. Takes ownership of
/// the job directory; it is removed when the body is done.
pub async fn file_response(media: DownloadedMedia, job: JobDir) -> Result<Response, MediaError> {
    if !media.path.starts_with(job.path()) {
        warn!(
            "[job {}] Refusing to serve {} outside the job directory",
            job.id(),
            media.path.display()
        );
        return Err(MediaError::OutputNotFound(media.path));
    }

    let job_id = job.id();
    let len = tokio::fs::metadata(&media.path).await?.len();
    let guard = ServedFile {
        path: media.path.clone(),
        len,
        sent: 0,
        job: Some(job),
    };
    let file = File::open(&media.path).await?;

    let filename = media
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("download.{}", media.kind.extension()));

    info!(
        "[job {}] Serving {:?} from {} ({} bytes)",
        job_id,
        media.info.title.as_deref().unwrap_or("<untitled>"),
        media.path.display(),
        len
    );

    let body = Body::from_stream(CleanupStream {
        inner: ReaderStream::new(file),
        guard,
    });

    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static(media.kind.mime_type())),
        (CONTENT_LENGTH, HeaderValue::from(len)),
        (CONTENT_DISPOSITION, content_disposition(&filename)),
    ];
    Ok((headers, body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_name_passes_through() {
        assert_eq!(safe_filename("Café au lait.mp3"), "Café au lait.mp3");
        assert!(matches!(safe_filename("plain.mp4"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_non_latin1_name_is_percent_encoded() {
        assert_eq!(
            safe_filename("日本.mp4"),
            "%E6%97%A5%E6%9C%AC.mp4"
        );
        assert_eq!(safe_filename("a – b.mp4"), "a%20%E2%80%93%20b.mp4");
    }

    #[test]
    fn test_disposition_header_ascii() {
        let value = content_disposition("My Clip.mp4");
        assert_eq!(value.to_str().unwrap(), "attachment; filename*=UTF-8''My Clip.mp4");
    }

    #[test]
    fn test_disposition_header_latin1_bytes() {
        let value = content_disposition("Café.mp3");
        let mut expected = b"attachment; filename*=UTF-8''Caf".to_vec();
        expected.push(0xE9);
        expected.extend_from_slice(b".mp3");
        assert_eq!(value.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_disposition_header_control_chars_encoded() {
        let value = content_disposition("bad\nname.mp4");
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename*=UTF-8''bad%0Aname.mp4"
        );
    }
}
