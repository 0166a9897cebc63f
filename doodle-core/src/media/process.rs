use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::media::error::MediaError;

const POLL_STEP: Duration = Duration::from_millis(10);

/// Captured output of a finished process.
#[derive(Debug)]
pub(crate) struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Turn a non-zero exit into [`MediaError::ExecutionFailed`].
    pub fn success_or(self, program: &'static str) -> Result<Self, MediaError> {
        if self.status.success() {
            return Ok(self);
        }
        Err(MediaError::ExecutionFailed {
            program,
            exit_code: self.status.code(),
            stderr: String::from_utf8_lossy(&self.stderr).trim().to_string(),
        })
    }
}

/// Run `cmd` to completion, killing it if `deadline` passes first.
///
/// stdout/stderr are drained on helper threads so a chatty child cannot block on a full pipe
/// while we wait on it.
pub(crate) fn output_with_deadline(
    program: &'static str,
    cmd: &mut Command,
    deadline: Option<Instant>,
) -> Result<CommandOutput, MediaError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd
        .spawn()
        .map_err(|source| MediaError::NotFound { program, source })?;

    let stdout_drain = drain(child.stdout.take());
    let stderr_drain = drain(child.stderr.take());

    let status = match wait_until(&mut child, deadline)? {
        Some(status) => status,
        None => {
            kill_and_reap(&mut child);
            // Pipes are closed now; the drains finish promptly.
            let _ = join_drain(stdout_drain);
            let _ = join_drain(stderr_drain);
            return Err(MediaError::TimedOut { program });
        }
    };

    Ok(CommandOutput {
        status,
        stdout: join_drain(stdout_drain)?,
        stderr: join_drain(stderr_drain)?,
    })
}

/// Poll `child` until it exits or `deadline` passes. `None` means the deadline won.
pub(crate) fn wait_until(
    child: &mut Child,
    deadline: Option<Instant>,
) -> Result<Option<ExitStatus>, MediaError> {
    let Some(deadline) = deadline else {
        return Ok(Some(child.wait()?));
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_STEP.min(deadline - now));
    }
}

/// Best-effort kill; the child may already have exited.
pub(crate) fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

pub(crate) type Drain = Option<JoinHandle<std::io::Result<Vec<u8>>>>;

pub(crate) fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Drain {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut bytes = Vec::new();
            pipe.read_to_end(&mut bytes)?;
            Ok(bytes)
        })
    })
}

pub(crate) fn join_drain(handle: Drain) -> Result<Vec<u8>, MediaError> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| std::io::Error::other("pipe drain thread panicked"))?
            .map_err(MediaError::from),
        None => Ok(Vec::new()),
    }
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    tool_on_path("ffmpeg")
}

/// Return `true` when `ffprobe` can be invoked from `PATH`.
pub fn is_ffprobe_on_path() -> bool {
    tool_on_path("ffprobe")
}

fn tool_on_path(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(all(test, unix))]
#[path = "../../tests/unit/media/process.rs"]
mod tests;
