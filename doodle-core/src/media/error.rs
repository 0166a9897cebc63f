/// Error type for `ffmpeg`/`ffprobe` invocations.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The binary could not be spawned at all.
    #[error("{program} could not be started (is it installed and on PATH?): {source}")]
    NotFound {
        /// Binary name.
        program: &'static str,
        /// Spawn failure.
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("{program} failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        /// Binary name.
        program: &'static str,
        /// Exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
        /// Trimmed stderr.
        stderr: String,
    },

    /// The process output could not be interpreted.
    #[error("failed to parse {program} output: {msg}")]
    Parse {
        /// Binary name.
        program: &'static str,
        /// What was wrong.
        msg: String,
    },

    /// The deadline passed before the process finished; it has been killed.
    #[error("{program} did not finish before the deadline")]
    TimedOut {
        /// Binary name.
        program: &'static str,
    },

    /// Pipe or wait failure while talking to the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// `true` when the deadline expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}
