//! Shared database fixture for unit tests.

use crate::activities::{self, Activity};
use crate::data;
use crate::entries::{self, EntryClass, NewEntry, TimeEntry};
use crate::projects::{self, NewProject, Project};
use crate::ticket_systems::{self, NewTicketSystem, TicketSystem, TicketSystemKind};
use crate::users::{self, AccessToken, User, UserId};
use diesel::SqliteConnection;
use time::macros::format_description;
use time::{Date, Time};

pub struct Fixture {
    pub conn: SqliteConnection,
    pub user: User,
    pub jira: TicketSystem,
    pub project: Project,
    pub activity: Activity,
}

pub fn hm(value: &str) -> Time {
    Time::parse(value, format_description!("[hour]:[minute]")).unwrap()
}

impl Fixture {
    /// One user holding a Jira token, and a project booked against that
    /// Jira with the user as lead.
    pub fn new() -> Self {
        let mut conn = data::open_in_memory().unwrap();
        let user = users::create(&mut conn, "jane").unwrap();
        let jira = ticket_systems::create(
            &mut conn,
            NewTicketSystem {
                name: "jira",
                kind: TicketSystemKind::Jira,
                url: "https://jira.example.com",
                book_time: true,
            },
        )
        .unwrap();
        users::set_token(&mut conn, user.id, jira.id, &token()).unwrap();
        let activity = activities::create(&mut conn, "Development").unwrap();
        let project = projects::create(
            &mut conn,
            NewProject {
                name: "Website",
                ticket_system_id: Some(jira.id),
                lead_user_id: Some(user.id),
                ..Default::default()
            },
        )
        .unwrap();
        Self {
            conn,
            user,
            jira,
            project,
            activity,
        }
    }

    pub fn other_user(&mut self, name: &str) -> UserId {
        users::create(&mut self.conn, name).unwrap().id
    }

    pub fn ticket_system(&mut self, name: &str, kind: TicketSystemKind, with_token: bool) -> TicketSystem {
        let system = ticket_systems::create(
            &mut self.conn,
            NewTicketSystem {
                name,
                kind,
                url: "https://tracker.example.com",
                book_time: true,
            },
        )
        .unwrap();
        if with_token {
            users::set_token(&mut self.conn, self.user.id, system.id, &token()).unwrap();
        }
        system
    }

    /// Project whose tickets are managed in `internal` under `key`.
    pub fn internal_project(&mut self, key: &str, internal: &TicketSystem) -> Project {
        projects::create(
            &mut self.conn,
            NewProject {
                name: "Support",
                ticket_system_id: Some(self.jira.id),
                internal_ticket_project_key: Some(key),
                internal_ticket_system_id: Some(internal.id),
                lead_user_id: Some(self.user.id),
                ..Default::default()
            },
        )
        .unwrap()
    }

    pub fn insert_entry(&mut self, day: Date, start: &str, end: &str, ticket: &str) -> TimeEntry {
        let user = self.user.id;
        self.insert_entry_for(user, day, start, end, ticket)
    }

    pub fn insert_entry_for(
        &mut self,
        user: UserId,
        day: Date,
        start: &str,
        end: &str,
        ticket: &str,
    ) -> TimeEntry {
        let (start_time, end_time) = (hm(start), hm(end));
        entries::insert(
            &mut self.conn,
            &NewEntry {
                user_id: user,
                project_id: self.project.id,
                customer_id: None,
                activity_id: Some(self.activity.id),
                day,
                start_time,
                end_time,
                duration_minutes: entries::span_minutes(start_time, end_time),
                class: EntryClass::Plain,
                ticket: ticket.to_string(),
                original_ticket_key: None,
                description: String::new(),
            },
        )
        .unwrap()
    }

    pub fn reload(&mut self, entry: &TimeEntry) -> TimeEntry {
        entries::find(&mut self.conn, entry.id).unwrap().unwrap()
    }

    pub fn reload_project(&mut self, project: &Project) -> Project {
        projects::find(&mut self.conn, project.id).unwrap().unwrap()
    }
}

fn token() -> AccessToken {
    AccessToken {
        token: "token".to_string(),
        secret: String::new(),
    }
}
