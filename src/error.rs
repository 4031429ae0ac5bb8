// Error types shared by the engine session and the job controller

use thiserror::Error;

/// Failures raised by [`crate::engine::EngineSession`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is already loading")]
    AlreadyLoading,

    #[error("engine is not ready")]
    NotReady,

    #[error("a job is already running")]
    JobAlreadyRunning,

    #[error("failed to load engine: {message}")]
    LoadFailed { message: String },

    /// The engine rejected the argument plan or terminated abnormally.
    /// `tail` holds the last log lines emitted before the failure.
    #[error("engine execution failed: {message}")]
    ExecutionFailed { message: String, tail: Vec<String> },

    #[error("working storage error on {name}: {message}")]
    Storage { name: String, message: String },
}

/// Programming/UI-state errors. Controls should be disabled so these never
/// reach the user, but the controller enforces them regardless of entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("engine is already loading")]
    AlreadyLoading,

    #[error("engine is not ready")]
    EngineNotReady,

    #[error("a job is already running")]
    JobAlreadyRunning,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("engine failed to load: {message}")]
    EngineLoadFailure { message: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("engine execution failed: {message}")]
    EngineExecutionFailure { message: String, tail: Vec<String> },

    #[error("operation rejected: {0}")]
    ConcurrencyViolation(#[from] Violation),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControllerError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// The single message shown to the user. Details stay in the log buffer.
    pub fn user_message(&self) -> String {
        match self {
            Self::EngineLoadFailure { .. } => {
                "Failed to load converter. Please check your connection.".to_string()
            }
            Self::InvalidInput { reason } => reason.clone(),
            Self::EngineExecutionFailure { .. } | Self::Io(_) => {
                "Failed to process video. Please try another video.".to_string()
            }
            Self::ConcurrencyViolation(v) => format!("Not now: {}.", v),
        }
    }
}

impl From<EngineError> for ControllerError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::AlreadyLoading => Self::ConcurrencyViolation(Violation::AlreadyLoading),
            EngineError::NotReady => Self::ConcurrencyViolation(Violation::EngineNotReady),
            EngineError::JobAlreadyRunning => {
                Self::ConcurrencyViolation(Violation::JobAlreadyRunning)
            }
            EngineError::LoadFailed { message } => Self::EngineLoadFailure { message },
            EngineError::ExecutionFailed { message, tail } => {
                Self::EngineExecutionFailure { message, tail }
            }
            EngineError::Storage { name, message } => Self::EngineExecutionFailure {
                message: format!("{}: {}", name, message),
                tail: Vec::new(),
            },
        }
    }
}
