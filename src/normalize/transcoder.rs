//! External `ffmpeg` invocation with hard time bounds.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::codec::{CANONICAL_CHANNELS, CANONICAL_SAMPLE_RATE};
use crate::config::TranscoderSettings;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Trailing stderr kept for diagnostics.
const STDERR_TAIL_BYTES: usize = 2_048;

/// Why the transcoder path did not produce a canonical file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscodeFailure {
    #[error("transcoder disabled by configuration")]
    Disabled,
    #[error("transcoder not available")]
    Unavailable,
    #[error("path {} is outside the scratch directory", .path.display())]
    OutsideScratch { path: PathBuf },
    #[error("failed to start transcoder: {reason}")]
    Spawn { reason: String },
    #[error("transcoder timed out after {} s", .after.as_secs())]
    TimedOut { after: Duration },
    #[error("transcoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("transcoder produced no output")]
    EmptyOutput,
}

/// Handle on the external transcoder program.
#[derive(Debug, Clone)]
pub struct Transcoder {
    program: PathBuf,
    timeout: Duration,
    probe_timeout: Duration,
}

impl Transcoder {
    pub fn new(settings: &TranscoderSettings) -> Self {
        Self {
            program: settings.program.clone(),
            timeout: settings.timeout(),
            probe_timeout: settings.probe_timeout(),
        }
    }

    /// Run the version probe. Any failure, including a probe timeout, means unavailable.
    pub fn is_available(&self) -> bool {
        let mut command = Command::new(&self.program);
        command.arg("-version");
        match run_bounded(&mut command, self.probe_timeout) {
            Ok((status, _)) => status.success(),
            Err(err) => {
                tracing::debug!(program = %self.program.display(), "transcoder probe failed: {err}");
                false
            }
        }
    }

    /// Convert `input` to 22050 Hz mono 16-bit PCM WAV at `output`, overwriting it.
    pub fn convert(&self, input: &Path, output: &Path) -> Result<(), TranscodeFailure> {
        let mut command = Command::new(&self.program);
        command
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-ar", &CANONICAL_SAMPLE_RATE.to_string()])
            .args(["-ac", &CANONICAL_CHANNELS.to_string()])
            .args(["-acodec", "pcm_s16le"])
            .arg(output);
        tracing::debug!("transcoder command: {command:?}");
        let (status, stderr) = run_bounded(&mut command, self.timeout)?;
        if !status.success() {
            return Err(TranscodeFailure::Failed {
                status: status.to_string(),
                stderr: tail(&stderr),
            });
        }
        Ok(())
    }
}

/// Spawn `command` with stdin closed, collect stderr, and kill it once `limit` elapses.
fn run_bounded(
    command: &mut Command,
    limit: Duration,
) -> Result<(ExitStatus, String), TranscodeFailure> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    let mut child = command.spawn().map_err(|err| TranscodeFailure::Spawn {
        reason: err.to_string(),
    })?;
    // Drain stderr on its own thread so a chatty child never blocks on a full pipe.
    let reader = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(err) = pipe.read_to_end(&mut buf) {
                tracing::warn!("reading transcoder stderr failed: {err}");
            }
            String::from_utf8_lossy(&buf).into_owned()
        })
    });

    let status = wait_with_deadline(&mut child, limit);
    let stderr = reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    match status {
        Some(status) => Ok((status, stderr)),
        None => Err(TranscodeFailure::TimedOut { after: limit }),
    }
}

/// Wait for the child; on expiry kill and reap it and return `None`.
fn wait_with_deadline(child: &mut Child, limit: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + limit;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
            Ok(None) => break,
            Err(err) => {
                tracing::warn!("waiting on transcoder failed: {err}");
                break;
            }
        }
    }
    if let Err(err) = child.kill() {
        tracing::warn!("failed to kill transcoder: {err}");
    }
    if let Err(err) = child.wait() {
        tracing::warn!("failed to reap transcoder: {err}");
    }
    None
}

fn tail(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}
