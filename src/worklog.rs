//! Keeps remote work-logs in line with local entries.
//!
//! Runs after the entry is already stored. Errors are returned to the caller,
//! which decides whether they are fatal; nothing here swallows a remote
//! failure except a work-log that is already gone.
//!
//! A work-log that has to go is recorded in `stale_worklogs` before the
//! delete is sent, and stays there until the tracker confirms it. Nothing is
//! created or updated for a user while one of their deletions is pending.

use crate::activities;
use crate::entries::{self, TimeEntry};
use crate::error::{Result, SyncError};
use crate::projects::{self, Project};
use crate::stale_worklogs::{self, StaleWorklog};
use crate::ticket_systems::{self, TicketSystem};
use crate::tracker::{ExternalTracker, IssueDraft, TrackerError, TrackerFactory, WorklogDraft};
use crate::users::{self, UserId};
use diesel::SqliteConnection;

const INTERNAL_SEARCH_LIMIT: u32 = 50;

/// Ticket system that governs entries of a project.
#[derive(Debug, Clone)]
pub struct Route {
    pub ticket_system: TicketSystem,
    /// Project key in the internal tracker, when that tracker is in charge.
    pub internal_project_key: Option<String>,
}

impl Route {
    pub fn books_worklogs(&self) -> bool {
        self.ticket_system.books_worklogs()
    }
}

/// The internal tracker wins over the directly configured one.
pub fn route(conn: &mut SqliteConnection, project: &Project) -> Result<Option<Route>> {
    if let Some(key) = project.internal_project_key() {
        let system = match project.internal_ticket_system_id {
            Some(id) => ticket_systems::find(conn, id)?,
            None => None,
        }
        .ok_or_else(|| SyncError::NoTicketSystem {
            project: project.name.clone(),
        })?;
        return Ok(Some(Route {
            ticket_system: system,
            internal_project_key: Some(key.to_string()),
        }));
    }

    let Some(id) = project.ticket_system_id else {
        return Ok(None);
    };
    Ok(ticket_systems::find(conn, id)?.map(|ticket_system| Route {
        ticket_system,
        internal_project_key: None,
    }))
}

/// Brings the remote work-log of `current` up to date. `previous` is the
/// entry as it was before this save, `None` for a new entry.
pub fn reconcile(
    conn: &mut SqliteConnection,
    factory: &dyn TrackerFactory,
    current: &mut TimeEntry,
    previous: Option<&TimeEntry>,
) -> Result<()> {
    retry_stale(conn, factory, current.user_id)?;

    let project = projects::find(conn, current.project_id)?
        .ok_or(SyncError::ProjectNotFound(current.project_id))?;
    let route = route(conn, &project)?.filter(Route::books_worklogs);

    if let Some(Route {
        ticket_system,
        internal_project_key: Some(key),
    }) = &route
    {
        resolve_internal_ticket(conn, factory, current, ticket_system, key)?;
    }

    if let Some(previous) = previous.filter(|previous| moved_to_other_ticket(current, previous)) {
        let deleted = delete_stale(conn, factory, previous);
        // Still pending on failure, so the id no longer belongs to this entry.
        if current.worklog_id.take().is_some() {
            entries::save(conn, current)?;
        }
        deleted?;
    }

    let Some(route) = route else {
        tracing::debug!(entry = %current.id, "project does not book work-logs");
        return Ok(());
    };
    if current.ticket.is_empty() {
        return Ok(());
    }

    let tracker = connect(conn, factory, current.user_id, &route.ticket_system)?;
    let draft = draft(conn, current)?;
    let worklog_id = upsert(tracker.as_ref(), current, &draft)?;
    if current.worklog_id.as_deref() != Some(worklog_id.as_str()) {
        current.worklog_id = Some(worklog_id);
        entries::save(conn, current)?;
    }
    Ok(())
}

/// Removes the remote work-log of an entry that is being deleted.
pub fn remove(
    conn: &mut SqliteConnection,
    factory: &dyn TrackerFactory,
    entry: &TimeEntry,
) -> Result<()> {
    delete_stale(conn, factory, entry)
}

/// The ticket changed, and not merely because the internal tracker replaced
/// the typed ticket with its own key.
fn moved_to_other_ticket(current: &TimeEntry, previous: &TimeEntry) -> bool {
    current.ticket != previous.ticket
        && current.original_ticket_key.as_deref() != Some(current.ticket.as_str())
}

fn resolve_internal_ticket(
    conn: &mut SqliteConnection,
    factory: &dyn TrackerFactory,
    entry: &mut TimeEntry,
    internal: &TicketSystem,
    project_key: &str,
) -> Result<()> {
    let identifier = entry
        .original_ticket_key
        .clone()
        .filter(|key| !key.is_empty())
        .unwrap_or_else(|| entry.ticket.clone());
    if identifier.is_empty() {
        return Ok(());
    }

    let tracker = connect(conn, factory, entry.user_id, internal)?;
    let jql = format!(
        "project = {project_key} AND summary ~ \"{}\"",
        identifier.replace('"', "\\\"")
    );
    let found = tracker
        .search_issues(&jql, &["key", "summary"], INTERNAL_SEARCH_LIMIT)?
        .into_iter()
        .find(|issue| {
            issue
                .summary
                .as_deref()
                .is_some_and(|summary| summary.trim().eq_ignore_ascii_case(&identifier))
        });
    let key = match found {
        Some(issue) => issue.key,
        None => {
            let key = tracker.create_issue(
                project_key,
                &IssueDraft {
                    summary: identifier.clone(),
                    description: entry.description.clone(),
                },
            )?;
            tracing::info!(entry = %entry.id, %key, "created internal ticket");
            key
        }
    };

    tracing::debug!(entry = %entry.id, %identifier, %key, "resolved internal ticket");
    entry.original_ticket_key = Some(identifier);
    entry.ticket = key;
    entries::save(conn, entry)?;
    Ok(())
}

/// Deletes the work-log `entry` points at, on the ticket system of its own
/// project.
fn delete_stale(
    conn: &mut SqliteConnection,
    factory: &dyn TrackerFactory,
    entry: &TimeEntry,
) -> Result<()> {
    let Some(worklog_id) = entry.worklog_id.as_deref() else {
        return Ok(());
    };
    if entry.ticket.is_empty() {
        return Ok(());
    }
    let Some(project) = projects::find(conn, entry.project_id)? else {
        return Ok(());
    };
    let Some(route) = route(conn, &project)?.filter(Route::books_worklogs) else {
        return Ok(());
    };

    stale_worklogs::record(
        conn,
        entry.user_id,
        route.ticket_system.id,
        &entry.ticket,
        worklog_id,
    )?;
    retry_stale(conn, factory, entry.user_id)
}

/// Sends every pending deletion of `user_id` once. The first failure is
/// returned after all of them were tried.
fn retry_stale(
    conn: &mut SqliteConnection,
    factory: &dyn TrackerFactory,
    user_id: UserId,
) -> Result<()> {
    let mut failure = None;
    for stale in stale_worklogs::for_user(conn, user_id)? {
        if let Err(e) = delete_pending(conn, factory, &stale) {
            tracing::warn!(ticket = %stale.ticket, worklog_id = %stale.worklog_id, error = %e, "work-log deletion still pending");
            failure.get_or_insert(e);
        }
    }
    failure.map_or(Ok(()), Err)
}

fn delete_pending(
    conn: &mut SqliteConnection,
    factory: &dyn TrackerFactory,
    stale: &StaleWorklog,
) -> Result<()> {
    if let Some(ticket_system) = ticket_systems::find(conn, stale.ticket_system_id)? {
        let tracker = connect(conn, factory, stale.user_id, &ticket_system)?;
        match tracker.delete_worklog(&stale.ticket, &stale.worklog_id) {
            Ok(()) => {
                tracing::info!(ticket = %stale.ticket, worklog_id = %stale.worklog_id, "deleted work-log");
            }
            Err(TrackerError::InvalidResource(what)) => {
                tracing::warn!(ticket = %stale.ticket, %what, "work-log already gone");
            }
            Err(e) => return Err(e.into()),
        }
    }
    stale_worklogs::forget(conn, stale.id)?;
    Ok(())
}

fn upsert(
    tracker: &dyn ExternalTracker,
    entry: &TimeEntry,
    draft: &WorklogDraft,
) -> Result<String> {
    if let Some(worklog_id) = entry.worklog_id.as_deref() {
        match tracker.update_worklog(&entry.ticket, worklog_id, draft) {
            Ok(()) => {
                tracing::info!(entry = %entry.id, ticket = %entry.ticket, worklog_id, "updated work-log");
                return Ok(worklog_id.to_string());
            }
            Err(TrackerError::InvalidResource(_)) => {
                tracing::warn!(entry = %entry.id, worklog_id, "work-log vanished, creating a new one");
            }
            Err(e) => return Err(e.into()),
        }
    }
    let worklog_id = tracker.create_worklog(&entry.ticket, draft)?;
    tracing::info!(entry = %entry.id, ticket = %entry.ticket, %worklog_id, "created work-log");
    Ok(worklog_id)
}

fn connect(
    conn: &mut SqliteConnection,
    factory: &dyn TrackerFactory,
    user_id: UserId,
    ticket_system: &TicketSystem,
) -> Result<Box<dyn ExternalTracker>> {
    match users::token(conn, user_id, ticket_system.id)? {
        Some(token) => Ok(factory.connect(ticket_system, &token)?),
        None => {
            let user = users::find(conn, user_id)?
                .map(|user| user.username)
                .unwrap_or_else(|| user_id.to_string());
            Err(SyncError::MissingToken {
                user,
                ticket_system: ticket_system.name.clone(),
            })
        }
    }
}

fn draft(conn: &mut SqliteConnection, entry: &TimeEntry) -> Result<WorklogDraft> {
    let activity = match entry.activity_id {
        Some(id) => activities::find(conn, id)?.map(|activity| activity.name),
        None => None,
    };
    Ok(WorklogDraft {
        started: entry.started_at(),
        duration_minutes: entry.duration_minutes,
        comment: match activity {
            Some(activity) => format!("#{}: {activity}: {}", entry.id, entry.description),
            None => format!("#{}: {}", entry.id, entry.description),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use crate::ticket_systems::TicketSystemKind;
    use crate::tracker::fake::{Call, Failure, FakeTracker};
    use time::macros::date;

    const DAY: time::Date = time::macros::date!(2025 - 01 - 06);

    fn with_worklog(fixture: &mut Fixture, ticket: &str, worklog_id: &str) -> TimeEntry {
        let mut entry = fixture.insert_entry(DAY, "08:00", "09:00", ticket);
        entry.worklog_id = Some(worklog_id.to_string());
        entries::save(&mut fixture.conn, &entry).unwrap();
        entry
    }

    #[test]
    fn new_entry_creates_worklog() {
        let mut fixture = Fixture::new();
        let mut entry = fixture.insert_entry(DAY, "08:00", "09:30", "ABC-1");
        let tracker = FakeTracker::new();

        reconcile(&mut fixture.conn, &tracker, &mut entry, None).unwrap();

        assert_eq!(entry.worklog_id.as_deref(), Some("wl-1"));
        assert_eq!(fixture.reload(&entry).worklog_id.as_deref(), Some("wl-1"));
        assert_eq!(
            tracker.calls(),
            [
                Call::Connect {
                    ticket_system: "jira".to_string()
                },
                Call::CreateWorklog {
                    issue_key: "ABC-1".to_string()
                }
            ]
        );
    }

    #[test]
    fn existing_worklog_is_updated() {
        let mut fixture = Fixture::new();
        let previous = with_worklog(&mut fixture, "ABC-1", "77");
        let mut current = previous.clone();
        current.description = "more detail".to_string();
        let tracker = FakeTracker::new();

        reconcile(&mut fixture.conn, &tracker, &mut current, Some(&previous)).unwrap();

        assert_eq!(current.worklog_id.as_deref(), Some("77"));
        assert_eq!(
            tracker.count(|c| matches!(c, Call::UpdateWorklog { worklog_id, .. } if worklog_id == "77")),
            1
        );
        assert_eq!(tracker.count(|c| matches!(c, Call::DeleteWorklog { .. })), 0);
    }

    #[test]
    fn vanished_worklog_is_recreated() {
        let mut fixture = Fixture::new();
        let previous = with_worklog(&mut fixture, "ABC-1", "77");
        let mut current = previous.clone();
        let tracker = FakeTracker::new().failing_update_worklog(Failure::NotFound);

        reconcile(&mut fixture.conn, &tracker, &mut current, Some(&previous)).unwrap();

        assert_eq!(current.worklog_id.as_deref(), Some("wl-1"));
        assert_eq!(tracker.count(|c| matches!(c, Call::CreateWorklog { .. })), 1);
    }

    #[test]
    fn ticket_move_deletes_old_worklog_first() {
        let mut fixture = Fixture::new();
        let mut previous = with_worklog(&mut fixture, "ABC-1", "77");
        previous.original_ticket_key = Some("ABC-1".to_string());
        entries::save(&mut fixture.conn, &previous).unwrap();
        let mut current = previous.clone();
        current.ticket = "ABC-2".to_string();
        entries::save(&mut fixture.conn, &current).unwrap();
        let tracker = FakeTracker::new();

        reconcile(&mut fixture.conn, &tracker, &mut current, Some(&previous)).unwrap();

        let remote: Vec<_> = tracker
            .calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Connect { .. }))
            .collect();
        assert_eq!(
            remote,
            [
                Call::DeleteWorklog {
                    issue_key: "ABC-1".to_string(),
                    worklog_id: "77".to_string()
                },
                Call::CreateWorklog {
                    issue_key: "ABC-2".to_string()
                }
            ]
        );
        assert_eq!(fixture.reload(&current).worklog_id.as_deref(), Some("wl-1"));
    }

    #[test]
    fn already_deleted_worklog_is_not_an_error() {
        let mut fixture = Fixture::new();
        let previous = with_worklog(&mut fixture, "ABC-1", "77");
        let mut current = previous.clone();
        current.ticket = "ABC-2".to_string();
        let tracker = FakeTracker::new().failing_delete_worklog(Failure::NotFound);

        reconcile(&mut fixture.conn, &tracker, &mut current, Some(&previous)).unwrap();

        assert_eq!(current.worklog_id.as_deref(), Some("wl-1"));
    }

    #[test]
    fn failed_move_delete_is_retried_before_booking() {
        let mut fixture = Fixture::new();
        let previous = with_worklog(&mut fixture, "ABC-1", "77");
        let mut current = previous.clone();
        current.ticket = "ABC-2".to_string();
        entries::save(&mut fixture.conn, &current).unwrap();
        let failing = FakeTracker::new().failing_delete_worklog(Failure::Generic);

        reconcile(&mut fixture.conn, &failing, &mut current, Some(&previous)).unwrap_err();

        assert_eq!(current.worklog_id, None);
        assert_eq!(fixture.reload(&current).worklog_id, None);
        assert_eq!(failing.count(|c| matches!(c, Call::CreateWorklog { .. })), 0);
        let user = fixture.user.id;
        assert_eq!(stale_worklogs::for_user(&mut fixture.conn, user).unwrap().len(), 1);

        let previous = fixture.reload(&current);
        let tracker = FakeTracker::new();
        reconcile(&mut fixture.conn, &tracker, &mut current, Some(&previous)).unwrap();

        let remote: Vec<_> = tracker
            .calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Connect { .. }))
            .collect();
        assert_eq!(
            remote,
            [
                Call::DeleteWorklog {
                    issue_key: "ABC-1".to_string(),
                    worklog_id: "77".to_string()
                },
                Call::CreateWorklog {
                    issue_key: "ABC-2".to_string()
                }
            ]
        );
        assert!(stale_worklogs::for_user(&mut fixture.conn, user).unwrap().is_empty());
    }

    #[test]
    fn pending_deletion_holds_back_new_worklogs() {
        let mut fixture = Fixture::new();
        let (user, jira) = (fixture.user.id, fixture.jira.id);
        stale_worklogs::record(&mut fixture.conn, user, jira, "ABC-9", "55").unwrap();
        let mut entry = fixture.insert_entry(DAY, "08:00", "09:00", "ABC-1");
        let tracker = FakeTracker::new().failing_delete_worklog(Failure::Generic);

        let err = reconcile(&mut fixture.conn, &tracker, &mut entry, None).unwrap_err();

        assert_eq!(err.status(), 502);
        assert_eq!(tracker.count(|c| matches!(c, Call::CreateWorklog { .. })), 0);
        assert_eq!(entry.worklog_id, None);
        assert_eq!(stale_worklogs::for_user(&mut fixture.conn, user).unwrap().len(), 1);
    }

    #[test]
    fn remote_failures_propagate() {
        let mut fixture = Fixture::new();
        let mut entry = fixture.insert_entry(DAY, "08:00", "09:00", "ABC-1");
        let tracker = FakeTracker::new().failing_create_worklog(Failure::Unauthorized);

        let err = reconcile(&mut fixture.conn, &tracker, &mut entry, None).unwrap_err();

        assert!(err.needs_authorization());
        assert_eq!(fixture.reload(&entry).worklog_id, None);
    }

    #[test]
    fn entries_without_ticket_or_booking_are_skipped() {
        let mut fixture = Fixture::new();
        let mut no_ticket = fixture.insert_entry(DAY, "08:00", "09:00", "");
        let tracker = FakeTracker::new();
        reconcile(&mut fixture.conn, &tracker, &mut no_ticket, None).unwrap();

        let otrs = fixture.ticket_system("helpdesk", TicketSystemKind::Otrs, true);
        fixture.project.ticket_system_id = Some(otrs.id);
        projects::save(&mut fixture.conn, &fixture.project).unwrap();
        let mut unsupported = fixture.insert_entry(DAY, "09:00", "10:00", "ABC-1");
        reconcile(&mut fixture.conn, &tracker, &mut unsupported, None).unwrap();

        assert!(tracker.calls().is_empty());
    }

    #[test]
    fn missing_token_is_reported_before_connecting() {
        let mut fixture = Fixture::new();
        let other = fixture.other_user("john");
        let mut entry = fixture.insert_entry_for(other, DAY, "08:00", "09:00", "ABC-1");
        let tracker = FakeTracker::new();

        let err = reconcile(&mut fixture.conn, &tracker, &mut entry, None).unwrap_err();

        assert!(matches!(err, SyncError::MissingToken { ref user, .. } if user == "john"));
        assert!(tracker.calls().is_empty());
    }

    #[test]
    fn internal_ticket_is_created_then_reused() {
        let mut fixture = Fixture::new();
        let internal = fixture.ticket_system("internal", TicketSystemKind::Jira, true);
        let project = fixture.internal_project("INT", &internal);
        fixture.project = project;
        let mut entry = fixture.insert_entry(DAY, "08:00", "09:00", "CUST-12");
        let tracker = FakeTracker::new();

        reconcile(&mut fixture.conn, &tracker, &mut entry, None).unwrap();

        assert_eq!(entry.ticket, "INT-1");
        assert_eq!(entry.original_ticket_key.as_deref(), Some("CUST-12"));
        assert_eq!(
            tracker.count(|c| matches!(c, Call::CreateIssue { project_key, summary }
                if project_key == "INT" && summary == "CUST-12")),
            1
        );
        assert_eq!(
            tracker.count(|c| matches!(c, Call::CreateWorklog { issue_key } if issue_key == "INT-1")),
            1
        );

        // Saving again finds the issue by its summary and leaves the work-log
        // where it is.
        let previous = fixture.reload(&entry);
        let mut current = previous.clone();
        current.description = "follow-up".to_string();
        reconcile(&mut fixture.conn, &tracker, &mut current, Some(&previous)).unwrap();

        assert_eq!(current.ticket, "INT-1");
        assert_eq!(tracker.count(|c| matches!(c, Call::CreateIssue { .. })), 1);
        assert_eq!(tracker.count(|c| matches!(c, Call::DeleteWorklog { .. })), 0);
        assert_eq!(tracker.count(|c| matches!(c, Call::UpdateWorklog { .. })), 1);
    }

    #[test]
    fn internal_rewrite_to_same_key_does_not_delete() {
        let mut fixture = Fixture::new();
        let internal = fixture.ticket_system("internal", TicketSystemKind::Jira, true);
        fixture.project = fixture.internal_project("ABC", &internal);
        let previous = with_worklog(&mut fixture, "", "77");
        let mut current = previous.clone();
        current.ticket = "ABC-1".to_string();
        let tracker = FakeTracker::new().with_issue("ABC-1", "ABC-1");

        reconcile(&mut fixture.conn, &tracker, &mut current, Some(&previous)).unwrap();

        assert_eq!(current.ticket, "ABC-1");
        assert_eq!(current.original_ticket_key.as_deref(), Some("ABC-1"));
        assert_eq!(tracker.count(|c| matches!(c, Call::DeleteWorklog { .. })), 0);
        assert_eq!(tracker.count(|c| matches!(c, Call::CreateIssue { .. })), 0);
    }

    #[test]
    fn internal_tracker_takes_precedence() {
        let mut fixture = Fixture::new();
        let internal = fixture.ticket_system("internal", TicketSystemKind::Jira, true);
        let project = fixture.internal_project("INT", &internal);

        let route = route(&mut fixture.conn, &project).unwrap().unwrap();

        assert_eq!(route.ticket_system.id, internal.id);
        assert_eq!(route.internal_project_key.as_deref(), Some("INT"));

        let direct = super::route(&mut fixture.conn, &fixture.project)
            .unwrap()
            .unwrap();
        assert_eq!(direct.ticket_system.id, fixture.jira.id);
        assert_eq!(direct.internal_project_key, None);
    }

    #[test]
    fn draft_carries_span_and_comment() {
        let mut fixture = Fixture::new();
        let mut entry = fixture.insert_entry(date!(2025 - 02 - 03), "13:15", "14:00", "ABC-1");
        entry.description = "review".to_string();

        let draft = draft(&mut fixture.conn, &entry).unwrap();

        assert_eq!(draft.started, time::macros::datetime!(2025-02-03 13:15));
        assert_eq!(draft.duration_minutes, 45);
        assert_eq!(draft.comment, format!("#{}: Development: review", entry.id));
    }

    #[test]
    fn draft_without_activity_leaves_it_out() {
        let mut fixture = Fixture::new();
        let mut entry = fixture.insert_entry(DAY, "08:00", "09:00", "ABC-1");
        entry.activity_id = None;
        entry.description = "review".to_string();

        let draft = draft(&mut fixture.conn, &entry).unwrap();

        assert_eq!(draft.comment, format!("#{}: review", entry.id));
    }
}
