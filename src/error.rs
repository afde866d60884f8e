//! Failures of the entry save and ticket sync workflows.

use crate::entries::EntryId;
use crate::projects::ProjectId;
use crate::tracker::TrackerError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("project {0} doesn't exist")]
    ProjectNotFound(ProjectId),
    #[error("entry {0} doesn't exist")]
    EntryNotFound(EntryId),
    #[error("no ticket system is configured for project \"{project}\"")]
    NoTicketSystem { project: String },
    #[error("project \"{project}\" has no lead user")]
    ProjectLeadMissing { project: String },
    #[error("user \"{user}\" has no access token for ticket system \"{ticket_system}\"")]
    MissingToken { user: String, ticket_system: String },
    /// Input rejected before anything was written.
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("storage error")]
    Storage(#[from] diesel::result::Error),
}

impl SyncError {
    /// HTTP-like status a caller can surface.
    pub fn status(&self) -> u16 {
        match self {
            SyncError::ProjectNotFound(_) | SyncError::EntryNotFound(_) => 404,
            SyncError::NoTicketSystem { .. } | SyncError::ProjectLeadMissing { .. } => 400,
            SyncError::MissingToken { .. } => 401,
            SyncError::Validation(_) => 422,
            SyncError::Tracker(TrackerError::Unauthorized(_)) => 401,
            SyncError::Tracker(TrackerError::InvalidResource(_)) => 404,
            SyncError::Tracker(TrackerError::Generic { .. }) => 502,
            SyncError::Storage(_) => 500,
        }
    }

    /// The user has to (re)authorize against the ticket system before sync
    /// can work.
    pub fn needs_authorization(&self) -> bool {
        matches!(
            self,
            SyncError::MissingToken { .. } | SyncError::Tracker(TrackerError::Unauthorized(_))
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation(message.into())
    }
}
