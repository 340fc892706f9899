use std::time::Duration;

/// Failure to obtain a snapshot from the status endpoint.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("status request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("status request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("status endpoint unreachable: {0}")]
    Unavailable(String),

    #[error("malformed status payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A decoded snapshot that breaks a structural invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("gpu {hostname}/{index} has {actual} calendar days, date list has {expected}")]
    CalendarLength {
        hostname: String,
        index: u32,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("snapshot rejected: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl PollError {
    pub fn kind(&self) -> &'static str {
        match self {
            PollError::Fetch(FetchError::Timeout(_)) => "timeout",
            PollError::Fetch(FetchError::Transport(_) | FetchError::Unavailable(_)) => "transport",
            PollError::Fetch(FetchError::Malformed(_)) => "malformed",
            PollError::Snapshot(_) => "invalid_snapshot",
        }
    }

    /// Malformed or inconsistent payloads, as opposed to the endpoint being
    /// slow or unreachable.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            PollError::Fetch(FetchError::Malformed(_)) | PollError::Snapshot(_)
        )
    }
}
