use thiserror::Error;

/// Marker the training tool prints when a newer release must be installed
/// before it will train again.
pub const TOOL_OUTDATED_MARKER: &str = "New Ultralytics Yolo8 version detected";

/// Orchestrator errors.
///
/// Cancellation is deliberately absent: a cancelled stage returns `Ok(None)`
/// and a cancelled cycle returns [`CycleOutcome::Cancelled`].
///
/// [`CycleOutcome::Cancelled`]: crate::orchestrator::CycleOutcome::Cancelled
#[derive(Debug, Error)]
pub enum Error {
    #[error("Automatic training is already running")]
    AlreadyRunning,

    #[error("Automatic training is not running")]
    NotRunning,

    /// The training tool refuses to run until it is updated.
    #[error("Training tool is outdated: {0}")]
    ToolOutdated(String),

    /// Local and remote state disagree (unmapped frame or label, missing artifact).
    #[error("Inconsistent state: {0}")]
    Inconsistent(String),

    /// Network, auth or subprocess failure reported by a collaborator.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classify a raw failure message coming out of the training tool.
    ///
    /// Adapters that only see the tool's stderr use this to surface the
    /// outdated condition as [`Error::ToolOutdated`] instead of a generic failure.
    pub fn from_tool_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message
            .to_lowercase()
            .contains(&TOOL_OUTDATED_MARKER.to_lowercase())
        {
            Self::ToolOutdated(message)
        } else {
            Self::Collaborator(anyhow::anyhow!(message))
        }
    }

    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::Inconsistent(message.into())
    }

    pub fn is_tool_outdated(&self) -> bool {
        matches!(self, Self::ToolOutdated(_))
    }

    /// Usage errors come from calling start/stop in the wrong state.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::AlreadyRunning | Self::NotRunning)
    }
}
