//! Remote work-logs that should be gone but could not be deleted yet.

use crate::data::sql_id;
use crate::schema::stale_worklogs;
use crate::ticket_systems::TicketSystemId;
use crate::users::UserId;
use diesel::prelude::*;

sql_id!(StaleWorklogId);

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::stale_worklogs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StaleWorklog {
    pub id: StaleWorklogId,
    pub user_id: UserId,
    pub ticket_system_id: TicketSystemId,
    pub ticket: String,
    pub worklog_id: String,
}

/// Remembers a work-log to delete later. Recording the same work-log twice
/// keeps one row.
pub fn record(
    conn: &mut SqliteConnection,
    user_id: UserId,
    ticket_system_id: TicketSystemId,
    ticket: &str,
    worklog_id: &str,
) -> QueryResult<()> {
    diesel::insert_into(stale_worklogs::table)
        .values((
            stale_worklogs::user_id.eq(user_id),
            stale_worklogs::ticket_system_id.eq(ticket_system_id),
            stale_worklogs::ticket.eq(ticket),
            stale_worklogs::worklog_id.eq(worklog_id),
        ))
        .on_conflict((
            stale_worklogs::ticket_system_id,
            stale_worklogs::ticket,
            stale_worklogs::worklog_id,
        ))
        .do_nothing()
        .execute(conn)?;
    Ok(())
}

/// Pending deletions of `user_id`, oldest first.
pub fn for_user(conn: &mut SqliteConnection, user_id: UserId) -> QueryResult<Vec<StaleWorklog>> {
    stale_worklogs::table
        .filter(stale_worklogs::user_id.eq(user_id))
        .order_by(stale_worklogs::id)
        .select(StaleWorklog::as_select())
        .load(conn)
}

pub fn forget(conn: &mut SqliteConnection, id: StaleWorklogId) -> QueryResult<()> {
    diesel::delete(stale_worklogs::table.find(id)).execute(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    #[test]
    fn recording_twice_keeps_one_row() {
        let mut fixture = Fixture::new();
        let (user, jira) = (fixture.user.id, fixture.jira.id);

        record(&mut fixture.conn, user, jira, "ABC-1", "wl-1").unwrap();
        record(&mut fixture.conn, user, jira, "ABC-1", "wl-1").unwrap();
        record(&mut fixture.conn, user, jira, "ABC-1", "wl-2").unwrap();

        let pending = for_user(&mut fixture.conn, user).unwrap();
        let ids: Vec<_> = pending.iter().map(|s| s.worklog_id.as_str()).collect();
        assert_eq!(ids, ["wl-1", "wl-2"]);

        forget(&mut fixture.conn, pending[0].id).unwrap();
        assert_eq!(for_user(&mut fixture.conn, user).unwrap().len(), 1);
        let other = fixture.other_user("john");
        assert!(for_user(&mut fixture.conn, other).unwrap().is_empty());
    }
}
