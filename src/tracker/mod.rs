//! Remote issue tracker access used by work-log reconciliation and
//! sub-ticket discovery.

use crate::ticket_systems::{TicketSystem, TicketSystemKind};
use crate::users::AccessToken;
use thiserror::Error;
use time::PrimitiveDateTime;

pub mod jira;

#[cfg(test)]
pub mod fake;

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Failure reported by a remote tracker call.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The token was rejected; the user has to authorize again.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The remote object (issue, work-log) does not exist.
    #[error("resource not found: {0}")]
    InvalidResource(String),
    #[error("{message}")]
    Generic {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl TrackerError {
    pub fn generic(message: impl Into<String>) -> Self {
        TrackerError::Generic {
            message: message.into(),
            source: None,
        }
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "unable to connect to the ticket system".to_string()
        } else {
            "ticket system request failed".to_string()
        };
        TrackerError::Generic {
            message,
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Generic {
            message: "unexpected ticket system response".to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub key: String,
    pub summary: Option<String>,
}

/// Issue to open in the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    pub summary: String,
    pub description: String,
}

/// Time booking mirrored into a remote work-log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklogDraft {
    pub started: PrimitiveDateTime,
    pub duration_minutes: i32,
    pub comment: String,
}

/// Calls against one tracker instance on behalf of one user.
pub trait ExternalTracker {
    fn search_issues(&self, jql: &str, fields: &[&str], limit: u32) -> Result<Vec<Issue>>;

    /// Opens an issue in `project_key` and returns its key.
    fn create_issue(&self, project_key: &str, issue: &IssueDraft) -> Result<String>;

    /// Returns the id of the new work-log.
    fn create_worklog(&self, issue_key: &str, worklog: &WorklogDraft) -> Result<String>;

    fn update_worklog(&self, issue_key: &str, worklog_id: &str, worklog: &WorklogDraft)
    -> Result<()>;

    fn delete_worklog(&self, issue_key: &str, worklog_id: &str) -> Result<()>;

    /// Keys of every ticket below `issue_key`, as far down as the tracker
    /// nests them.
    fn get_subtickets(&self, issue_key: &str) -> Result<Vec<String>>;
}

/// Builds authenticated clients for a ticket system.
pub trait TrackerFactory {
    fn connect(
        &self,
        ticket_system: &TicketSystem,
        token: &AccessToken,
    ) -> Result<Box<dyn ExternalTracker>>;
}

/// Connects to real trackers over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTrackerFactory {
    pub timeout: std::time::Duration,
}

impl TrackerFactory for HttpTrackerFactory {
    fn connect(
        &self,
        ticket_system: &TicketSystem,
        token: &AccessToken,
    ) -> Result<Box<dyn ExternalTracker>> {
        match ticket_system.kind {
            TicketSystemKind::Jira => {
                let client = jira::JiraClient::new(&ticket_system.url, token, self.timeout)?;
                Ok(Box::new(client))
            }
            TicketSystemKind::Otrs => Err(TrackerError::generic(format!(
                "ticket system \"{}\" of kind {} has no API support",
                ticket_system.name, ticket_system.kind
            ))),
        }
    }
}
