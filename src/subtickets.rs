//! Flattens the sub-tickets of a project's main tickets into the project's
//! subticket cache.

use crate::error::{Result, SyncError};
use crate::projects::{self, Project, ProjectId};
use crate::ticket_systems;
use crate::tracker::TrackerFactory;
use crate::users;
use crate::utils::natural_cmp;
use diesel::SqliteConnection;

/// Refreshes the subticket cache of `project_id` and returns the stored keys.
pub fn resolve(
    conn: &mut SqliteConnection,
    factory: &dyn TrackerFactory,
    project_id: ProjectId,
) -> Result<Vec<String>> {
    let mut project =
        projects::find(conn, project_id)?.ok_or(SyncError::ProjectNotFound(project_id))?;

    let no_ticket_system = || SyncError::NoTicketSystem {
        project: project.name.clone(),
    };
    let ticket_system_id = project.ticket_system_id.ok_or_else(no_ticket_system)?;
    let ticket_system = ticket_systems::find(conn, ticket_system_id)?.ok_or_else(no_ticket_system)?;

    let main_tickets = project.main_ticket_keys();
    if main_tickets.is_empty() {
        if !project.subtickets.is_empty() {
            tracing::info!(project = %project.id, "no main tickets left, clearing subtickets");
            project.subtickets.clear();
            projects::save(conn, &project)?;
        }
        return Ok(Vec::new());
    }

    let lead = match project.lead_user_id {
        Some(id) => users::find(conn, id)?,
        None => None,
    }
    .ok_or_else(|| SyncError::ProjectLeadMissing {
        project: project.name.clone(),
    })?;
    let token = users::token(conn, lead.id, ticket_system.id)?.ok_or_else(|| {
        SyncError::MissingToken {
            user: lead.username.clone(),
            ticket_system: ticket_system.name.clone(),
        }
    })?;

    let tracker = factory.connect(&ticket_system, &token)?;
    let mut keys = Vec::new();
    for main in main_tickets {
        let children = tracker.get_subtickets(&main)?;
        tracing::debug!(project = %project.id, main = %main, found = children.len(), "fetched subtickets");
        // A main ticket is part of its own set so prefix checks only need
        // the cache.
        keys.push(main);
        keys.extend(children);
    }
    keys.sort_by(|a, b| natural_cmp(a, b));

    project.subtickets = keys.join(",");
    projects::save(conn, &project)?;
    tracing::info!(project = %project.id, count = keys.len(), "stored subtickets");
    Ok(keys)
}

/// Outcome of refreshing one project during [`sync_all`].
#[derive(Debug)]
pub struct ProjectSync {
    pub project: Project,
    pub result: Result<Vec<String>>,
}

/// Refreshes every active project that has main tickets. A failing project
/// does not stop the others.
pub fn sync_all(
    conn: &mut SqliteConnection,
    factory: &dyn TrackerFactory,
) -> Result<Vec<ProjectSync>> {
    let candidates = projects::with_main_tickets(conn)?;
    let mut outcomes = Vec::with_capacity(candidates.len());
    for project in candidates {
        let result = resolve(conn, factory, project.id);
        if let Err(e) = &result {
            tracing::warn!(project = %project.id, error = %e, "subticket sync failed");
        }
        outcomes.push(ProjectSync { project, result });
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projects::NewProject;
    use crate::testing::Fixture;
    use crate::tracker::fake::{Call, FakeTracker};

    fn with_main_tickets(fixture: &mut Fixture, main: &str) -> Project {
        let mut project = fixture.project.clone();
        project.main_tickets = Some(main.to_string());
        projects::save(&mut fixture.conn, &project).unwrap();
        project
    }

    #[test]
    fn flattens_and_sorts_naturally() {
        let mut fixture = Fixture::new();
        let project = with_main_tickets(&mut fixture, "DEF-2, ABC-1");
        let tracker = FakeTracker::new().with_subtickets("ABC-1", &["ABC-10", "ABC-2"]);

        let keys = resolve(&mut fixture.conn, &tracker, project.id).unwrap();

        assert_eq!(keys, ["ABC-1", "ABC-2", "ABC-10", "DEF-2"]);
        let stored = fixture.reload_project(&project);
        assert_eq!(stored.subtickets, "ABC-1,ABC-2,ABC-10,DEF-2");
        assert_eq!(
            tracker.count(|c| matches!(c, Call::GetSubtickets { .. })),
            2
        );
    }

    #[test]
    fn main_ticket_without_children_is_kept() {
        let mut fixture = Fixture::new();
        let project = with_main_tickets(&mut fixture, "DEF-2,ABC-1");
        let tracker = FakeTracker::new().with_subtickets("ABC-1", &["ABC-2"]);

        let keys = resolve(&mut fixture.conn, &tracker, project.id).unwrap();

        assert_eq!(keys, ["ABC-1", "ABC-2", "DEF-2"]);
        assert_eq!(fixture.reload_project(&project).subtickets, "ABC-1,ABC-2,DEF-2");
    }

    #[test]
    fn duplicates_are_kept() {
        let mut fixture = Fixture::new();
        let project = with_main_tickets(&mut fixture, "ABC-1,ABC-2");
        let tracker = FakeTracker::new().with_subtickets("ABC-1", &["ABC-2"]);

        let keys = resolve(&mut fixture.conn, &tracker, project.id).unwrap();

        assert_eq!(keys, ["ABC-1", "ABC-2", "ABC-2"]);
    }

    #[test]
    fn empty_main_tickets_clear_cache_once() {
        let mut fixture = Fixture::new();
        let mut project = fixture.project.clone();
        project.main_tickets = Some(" ".to_string());
        project.subtickets = "ABC-1,ABC-2".to_string();
        projects::save(&mut fixture.conn, &project).unwrap();
        let tracker = FakeTracker::new();

        assert!(resolve(&mut fixture.conn, &tracker, project.id).unwrap().is_empty());
        assert_eq!(fixture.reload_project(&project).subtickets, "");
        assert!(resolve(&mut fixture.conn, &tracker, project.id).unwrap().is_empty());
        assert!(tracker.calls().is_empty());
    }

    #[test]
    fn missing_project() {
        let mut fixture = Fixture::new();
        let tracker = FakeTracker::new();

        let err = resolve(&mut fixture.conn, &tracker, ProjectId(999)).unwrap_err();

        assert!(matches!(err, SyncError::ProjectNotFound(ProjectId(999))));
    }

    #[test]
    fn no_ticket_system_fails_before_any_remote_call() {
        let mut fixture = Fixture::new();
        let project = projects::create(
            &mut fixture.conn,
            NewProject {
                name: "Offline",
                main_tickets: Some("ABC-1"),
                lead_user_id: Some(fixture.user.id),
                ..Default::default()
            },
        )
        .unwrap();
        let tracker = FakeTracker::new().with_subtickets("ABC-1", &["ABC-2"]);

        let err = resolve(&mut fixture.conn, &tracker, project.id).unwrap_err();

        assert!(matches!(err, SyncError::NoTicketSystem { .. }));
        assert_eq!(
            tracker.count(|c| matches!(c, Call::GetSubtickets { .. })),
            0
        );
    }

    #[test]
    fn lead_and_token_are_required() {
        let mut fixture = Fixture::new();
        let mut project = with_main_tickets(&mut fixture, "ABC-1");
        project.lead_user_id = None;
        projects::save(&mut fixture.conn, &project).unwrap();
        let tracker = FakeTracker::new();

        let err = resolve(&mut fixture.conn, &tracker, project.id).unwrap_err();
        assert!(matches!(err, SyncError::ProjectLeadMissing { .. }));

        project.lead_user_id = Some(fixture.other_user("john"));
        projects::save(&mut fixture.conn, &project).unwrap();
        let err = resolve(&mut fixture.conn, &tracker, project.id).unwrap_err();
        assert!(matches!(err, SyncError::MissingToken { ref user, .. } if user == "john"));

        assert!(tracker.calls().is_empty());
        assert_eq!(fixture.reload_project(&project).subtickets, "");
    }

    #[test]
    fn sync_all_reports_each_project() {
        let mut fixture = Fixture::new();
        let good = with_main_tickets(&mut fixture, "ABC-1");
        let broken = projects::create(
            &mut fixture.conn,
            NewProject {
                name: "Offline",
                main_tickets: Some("XYZ-1"),
                ..Default::default()
            },
        )
        .unwrap();
        let tracker = FakeTracker::new().with_subtickets("ABC-1", &["ABC-3"]);

        let outcomes = sync_all(&mut fixture.conn, &tracker).unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].project.id, good.id);
        assert_eq!(outcomes[0].result.as_deref().unwrap(), ["ABC-1", "ABC-3"]);
        assert_eq!(outcomes[1].project.id, broken.id);
        assert!(matches!(
            outcomes[1].result,
            Err(SyncError::NoTicketSystem { .. })
        ));
    }
}
