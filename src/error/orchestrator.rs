use thiserror::Error;

/// Errors related to the settlement orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The subprocess exited non-zero without a continuation signal.
    ///
    /// Captured output is carried for operator diagnosis; it is logged but
    /// never serialized into a caller-facing response.
    #[error("orchestrator exited with {exit_code:?}")]
    Failed {
        /// The subprocess exit code, if it exited at all.
        exit_code: Option<i32>,
        /// Captured stdout.
        stdout: String,
        /// Captured stderr.
        stderr: String,
    },
    /// The subprocess exited cleanly but its result file was missing or
    /// unparseable.
    #[error("orchestrator produced a malformed result: {0}")]
    MalformedResult(String),
}

impl OrchestratorError {
    /// The stable error code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "ORCHESTRATOR_FAILED",
            Self::MalformedResult(_) => "ORCHESTRATOR_BAD_RESULT",
        }
    }

    /// The HTTP status the error surfaces as.
    pub fn status(&self) -> u16 {
        502
    }

    /// The caller-facing message, with subprocess output stripped.
    pub fn public_message(&self) -> String {
        match self {
            Self::Failed { exit_code, .. } => {
                format!("settlement failed (exit {exit_code:?})")
            }
            Self::MalformedResult(_) => "settlement produced no usable result".into(),
        }
    }
}
