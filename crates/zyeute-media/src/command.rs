//! Building and running ffmpeg invocations.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tracing::{debug, trace, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

const STDERR_TAIL_LINES: usize = 20;

/// One ffmpeg invocation: a single input file rendered to a single output file.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    seek: Option<String>,
    filter: Option<String>,
    codec_args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            seek: None,
            filter: None,
            codec_args: Vec::new(),
        }
    }

    /// Start reading the input at `position` (e.g. `00:00:01`).
    pub fn seek(mut self, position: impl Into<String>) -> Self {
        self.seek = Some(position.into());
        self
    }

    /// Set the `-vf` chain. A second call replaces the first.
    pub fn video_filter(mut self, chain: impl Into<String>) -> Self {
        self.filter = Some(chain.into());
        self
    }

    pub fn single_frame(self) -> Self {
        self.output_args(["-frames:v", "1"])
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.codec_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Full argument list, without the `ffmpeg` program name.
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-v", "error", "-nostdin", "-progress", "pipe:2"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        if let Some(position) = &self.seek {
            args.extend(["-ss".to_string(), position.clone()]);
        }
        args.extend(["-i".to_string(), self.input.to_string_lossy().into_owned()]);
        if let Some(chain) = &self.filter {
            args.extend(["-vf".to_string(), chain.clone()]);
        }
        args.extend(self.codec_args.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Runs [`FfmpegCommand`]s, killing any that outlive the timeout.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!(output = %cmd.output.display(), "ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stderr not captured"))?;
        let reader = tokio::spawn(read_stderr(stderr));

        let status = match self.timeout {
            None => child.wait().await.map_err(MediaError::from),
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status.map_err(MediaError::from),
                Err(_) => {
                    warn!("ffmpeg still running after {:?}, killing it", limit);
                    let _ = child.kill().await;
                    Err(MediaError::Timeout(limit.as_secs()))
                }
            },
        };
        let tail = reader.await.unwrap_or_default();

        check_status(status?, tail)
    }
}

/// Drain ffmpeg's stderr, tracing progress blocks and keeping the last
/// non-progress lines for error reports.
async fn read_stderr(stderr: ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut progress = FfmpegProgress::default();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

    while let Ok(Some(line)) = lines.next_line().await {
        let is_progress = line.contains('=') && !line.contains(' ');
        if is_progress {
            if let Some(snapshot) = progress.apply_line(&line) {
                trace!(frame = snapshot.frame, out_time_ms = snapshot.out_time_ms, "ffmpeg progress");
            }
            continue;
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    Vec::from(tail).join("\n")
}

fn check_status(status: ExitStatus, stderr_tail: String) -> MediaResult<()> {
    if status.success() {
        return Ok(());
    }
    Err(MediaError::ffmpeg_failed(
        "ffmpeg exited with non-zero status",
        (!stderr_tail.is_empty()).then_some(stderr_tail),
        status.code(),
    ))
}

pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_before_input_filter_after() {
        let args = FfmpegCommand::new("input.mp4", "output.jpg")
            .seek("00:00:01")
            .single_frame()
            .video_filter("scale=360:640")
            .build_args();

        let i = args.iter().position(|a| a == "-i").unwrap();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let vf = args.iter().position(|a| a == "-vf").unwrap();

        assert!(ss < i);
        assert!(vf > i);
        assert_eq!(args[0], "-y");
        assert_eq!(args.last().unwrap(), "output.jpg");
    }

    #[test]
    fn test_filter_replaced_not_duplicated() {
        let args = FfmpegCommand::new("a.mp4", "b.mp4")
            .video_filter("scale=1:1")
            .video_filter("scale=2:2")
            .output_args(["-c:v", "libx264"])
            .build_args();

        assert_eq!(args.iter().filter(|a| *a == "-vf").count(), 1);
        assert!(args.contains(&"scale=2:2".to_string()));
        let pos = args.iter().position(|a| a == "-c:v").unwrap();
        assert_eq!(args[pos + 1], "libx264");
    }
}
