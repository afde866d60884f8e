//! In-process tracker double that records every call.

use super::{
    ExternalTracker, Issue, IssueDraft, Result, TrackerError, TrackerFactory, WorklogDraft,
};
use crate::ticket_systems::TicketSystem;
use crate::users::AccessToken;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect { ticket_system: String },
    Search { jql: String },
    CreateIssue { project_key: String, summary: String },
    CreateWorklog { issue_key: String },
    UpdateWorklog { issue_key: String, worklog_id: String },
    DeleteWorklog { issue_key: String, worklog_id: String },
    GetSubtickets { issue_key: String },
}

/// Which call should fail, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Unauthorized,
    NotFound,
    Generic,
}

impl Failure {
    fn error(self, what: &str) -> TrackerError {
        match self {
            Failure::Unauthorized => TrackerError::Unauthorized(what.to_string()),
            Failure::NotFound => TrackerError::InvalidResource(what.to_string()),
            Failure::Generic => TrackerError::generic(format!("{what} failed")),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    issues: Vec<Issue>,
    subtickets: HashMap<String, Vec<String>>,
    next_id: u32,
    fail_create_worklog: Option<Failure>,
    fail_update_worklog: Option<Failure>,
    fail_delete_worklog: Option<Failure>,
}

/// Cloning shares the recorded state, so a test keeps one handle while the
/// code under test owns the connected clients.
#[derive(Debug, Clone, Default)]
pub struct FakeTracker {
    state: Rc<RefCell<State>>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| matches(c)).count()
    }

    pub fn with_issue(self, key: &str, summary: &str) -> Self {
        self.state.borrow_mut().issues.push(Issue {
            key: key.to_string(),
            summary: Some(summary.to_string()),
        });
        self
    }

    pub fn with_subtickets(self, key: &str, children: &[&str]) -> Self {
        self.state.borrow_mut().subtickets.insert(
            key.to_string(),
            children.iter().map(ToString::to_string).collect(),
        );
        self
    }

    pub fn failing_create_worklog(self, failure: Failure) -> Self {
        self.state.borrow_mut().fail_create_worklog = Some(failure);
        self
    }

    pub fn failing_update_worklog(self, failure: Failure) -> Self {
        self.state.borrow_mut().fail_update_worklog = Some(failure);
        self
    }

    pub fn failing_delete_worklog(self, failure: Failure) -> Self {
        self.state.borrow_mut().fail_delete_worklog = Some(failure);
        self
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }

    fn next_id(&self) -> u32 {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.next_id
    }
}

impl TrackerFactory for FakeTracker {
    fn connect(
        &self,
        ticket_system: &TicketSystem,
        _token: &AccessToken,
    ) -> Result<Box<dyn ExternalTracker>> {
        self.record(Call::Connect {
            ticket_system: ticket_system.name.clone(),
        });
        Ok(Box::new(self.clone()))
    }
}

impl ExternalTracker for FakeTracker {
    fn search_issues(&self, jql: &str, _fields: &[&str], limit: u32) -> Result<Vec<Issue>> {
        self.record(Call::Search {
            jql: jql.to_string(),
        });
        let state = self.state.borrow();
        Ok(state
            .issues
            .iter()
            .filter(|issue| {
                issue
                    .summary
                    .as_deref()
                    .is_some_and(|summary| jql.contains(summary))
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn create_issue(&self, project_key: &str, issue: &IssueDraft) -> Result<String> {
        self.record(Call::CreateIssue {
            project_key: project_key.to_string(),
            summary: issue.summary.clone(),
        });
        let key = format!("{project_key}-{}", self.next_id());
        self.state.borrow_mut().issues.push(Issue {
            key: key.clone(),
            summary: Some(issue.summary.clone()),
        });
        Ok(key)
    }

    fn create_worklog(&self, issue_key: &str, _worklog: &WorklogDraft) -> Result<String> {
        self.record(Call::CreateWorklog {
            issue_key: issue_key.to_string(),
        });
        if let Some(failure) = self.state.borrow().fail_create_worklog {
            return Err(failure.error("create worklog"));
        }
        Ok(format!("wl-{}", self.next_id()))
    }

    fn update_worklog(
        &self,
        issue_key: &str,
        worklog_id: &str,
        _worklog: &WorklogDraft,
    ) -> Result<()> {
        self.record(Call::UpdateWorklog {
            issue_key: issue_key.to_string(),
            worklog_id: worklog_id.to_string(),
        });
        match self.state.borrow().fail_update_worklog {
            Some(failure) => Err(failure.error("update worklog")),
            None => Ok(()),
        }
    }

    fn delete_worklog(&self, issue_key: &str, worklog_id: &str) -> Result<()> {
        self.record(Call::DeleteWorklog {
            issue_key: issue_key.to_string(),
            worklog_id: worklog_id.to_string(),
        });
        match self.state.borrow().fail_delete_worklog {
            Some(failure) => Err(failure.error("delete worklog")),
            None => Ok(()),
        }
    }

    fn get_subtickets(&self, issue_key: &str) -> Result<Vec<String>> {
        self.record(Call::GetSubtickets {
            issue_key: issue_key.to_string(),
        });
        Ok(self
            .state
            .borrow()
            .subtickets
            .get(issue_key)
            .cloned()
            .unwrap_or_default())
    }
}
