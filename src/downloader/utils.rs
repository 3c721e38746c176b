// Helper functions for running external tools

use std::io::ErrorKind;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration as TokioDuration};
use tracing::warn;

use super::errors::MediaError;

/// The child's process group. yt-dlp starts ffmpeg for merging and audio
/// extraction, so killing only the child would leave those running.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        if e != nix::errno::Errno::ESRCH {
            warn!("Failed to kill process group {}: {}", pgid, e);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Run command with timeout, collecting stdout and stderr.
/// The child and everything it spawned are killed on timeout and when the
/// returned future is dropped.
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, MediaError> {
    let mut command = TokioCommand::new(program);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                MediaError::ToolNotFound(format!("{}: {}", program, e))
            } else {
                MediaError::ExtractionFailed(format!("Failed to start {}: {}", program, e))
            }
        })?;
    let mut group = ProcessGroup { pgid: child.id() };

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
        MediaError::ExtractionFailed(format!("Failed to capture stdout from {}", program))
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
        MediaError::ExtractionFailed(format!("Failed to capture stderr from {}", program))
    })?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let waited = timeout(TokioDuration::from_secs(timeout_secs), child.wait()).await;
    match waited {
        Ok(status_res) => {
            let status = status_res?;
            group.disarm();
            let stdout = join_pipe(stdout_task, "stdout").await?;
            let stderr = join_pipe(stderr_task, "stderr").await?;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            group.kill();
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(MediaError::ExtractionFailed(format!(
                "{} timed out after {}s",
                program, timeout_secs
            )))
        }
    }
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
    name: &str,
) -> Result<Vec<u8>, MediaError> {
    task.await
        .map_err(|e| MediaError::ExtractionFailed(format!("{} task failed: {}", name, e)))?
        .map_err(MediaError::from)
}

/// The provider's own error text from a failed run.
/// Prefers yt-dlp's `ERROR:` lines, falls back to all of stderr.
pub fn error_text(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let error_lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("ERROR:"))
        .collect();

    if !error_lines.is_empty() {
        return error_lines.join("\n");
    }

    let trimmed = stderr.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    match output.status.code() {
        Some(code) => format!("yt-dlp exited with status {} and no output", code),
        None => "yt-dlp was terminated by a signal".to_string(),
    }
}

/// Non-empty trimmed lines of stdout
pub fn stdout_lines(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};

    fn output(code: i32, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_error_text_prefers_error_lines() {
        let out = output(
            1,
            "[youtube] abc: Downloading webpage\nERROR: [youtube] abc: Video unavailable\n",
        );
        assert_eq!(error_text(&out), "ERROR: [youtube] abc: Video unavailable");
    }

    #[test]
    fn test_error_text_falls_back_to_stderr() {
        let out = output(2, "  usage: yt-dlp [OPTIONS] URL  \n");
        assert_eq!(error_text(&out), "usage: yt-dlp [OPTIONS] URL");
    }

    #[test]
    fn test_error_text_without_output() {
        let out = output(1, "");
        assert_eq!(error_text(&out), "yt-dlp exited with status 1 and no output");
    }

    #[test]
    fn test_stdout_lines_skips_blanks() {
        assert_eq!(
            stdout_lines(b"\n/tmp/a.webm\n\n/tmp/a.mp4\n"),
            vec!["/tmp/a.webm".to_string(), "/tmp/a.mp4".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_tool_not_found() {
        let err = run_output_with_timeout("/nonexistent/yt-dlp", vec![], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let err = run_output_with_timeout("sleep", vec!["5".to_string()], 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out after 1s"));
    }

    #[cfg(target_os = "linux")]
    fn is_running(pid: &str) -> bool {
        // Zombies are dead, they just have not been reaped yet
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => !stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| rest.trim_start().starts_with('Z')),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("sleeper.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());

        let err = run_output_with_timeout("sh", vec!["-c".to_string(), script], 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let mut running = is_running(&pid);
        for _ in 0..50 {
            if !running {
                break;
            }
            tokio::time::sleep(TokioDuration::from_millis(20)).await;
            running = is_running(&pid);
        }
        assert!(!running, "background sleep {} survived the timeout", pid);
    }

    #[tokio::test]
    async fn test_collects_stdout() {
        let out = run_output_with_timeout("echo", vec!["hello".to_string()], 5)
            .await
            .unwrap();
        assert!(out.status.success());
        assert_eq!(stdout_lines(&out.stdout), vec!["hello".to_string()]);
    }
}
