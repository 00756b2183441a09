//! Error taxonomy for report generation and submission.

/// Failures that abort report generation or delivery.
///
/// Disk-branch errors (`Enumeration`, `SpaceResolution`) are fatal to the
/// whole report. Host status reads never produce an error here; that
/// branch omits unavailable fields instead.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to enumerate storage volumes: {0}")]
    Enumeration(String),

    #[error("Cannot resolve disk space for {device}: {reason}")]
    SpaceResolution { device: String, reason: String },

    #[error("Collection task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Report submission failed: {0}")]
    Submission(#[from] reqwest::Error),
}
