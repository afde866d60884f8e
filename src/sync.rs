//! Save workflow for entries: the local write always stands, remote sync is
//! best effort and reported back as an alert.

use crate::activities::{self, ActivityId};
use crate::classify;
use crate::entries::{self, EntryClass, EntryId, NewEntry, TimeEntry};
use crate::error::{Result, SyncError};
use crate::projects::{self, CustomerId, Project, ProjectId};
use crate::tracker::TrackerFactory;
use crate::users::User;
use crate::worklog;
use diesel::SqliteConnection;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use time::{Date, Time, Weekday};

static TICKET_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9]*-[0-9]+$").expect("static ticket pattern"));

/// Field values for a created or edited entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInput {
    pub project_id: ProjectId,
    pub customer_id: Option<CustomerId>,
    pub activity_id: Option<ActivityId>,
    pub ticket: String,
    pub description: String,
    pub day: Date,
    pub start: Time,
    pub end: Time,
}

impl EntryInput {
    /// Current values of `entry`, as a starting point for an edit.
    pub fn from_entry(entry: &TimeEntry) -> Self {
        Self {
            project_id: entry.project_id,
            customer_id: entry.customer_id,
            activity_id: entry.activity_id,
            ticket: entry.ticket.clone(),
            description: entry.description.clone(),
            day: entry.day,
            start: entry.start_time,
            end: entry.end_time,
        }
    }
}

/// Something went wrong after the local save went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAlert {
    /// The ticket system needs the user to authorize (again).
    Reauthenticate(String),
    Message(String),
}

impl SyncAlert {
    /// `context` followed by `err` and its sources.
    fn new(context: &str, err: &SyncError) -> Self {
        let mut message = format!("{context}: {err}");
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        if err.needs_authorization() {
            SyncAlert::Reauthenticate(message)
        } else {
            SyncAlert::Message(message)
        }
    }
}

impl fmt::Display for SyncAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAlert::Reauthenticate(message) => {
                write!(f, "{message}; store a new access token to resume work-log sync")
            }
            SyncAlert::Message(message) => f.write_str(message),
        }
    }
}

#[derive(Debug)]
pub struct Saved {
    pub entry: TimeEntry,
    pub alert: Option<SyncAlert>,
}

/// Creates (`id` is `None`) or edits an entry of `user`.
pub fn save_entry(
    conn: &mut SqliteConnection,
    factory: &dyn TrackerFactory,
    user: &User,
    id: Option<EntryId>,
    input: EntryInput,
) -> Result<Saved> {
    let previous = match id {
        Some(id) => {
            let existing = entries::find(conn, id)?.ok_or(SyncError::EntryNotFound(id))?;
            if existing.user_id != user.id {
                return Err(SyncError::validation(format!(
                    "Entry {id} belongs to another user"
                )));
            }
            Some(existing)
        }
        None => None,
    };

    let project = validate(conn, &input)?;
    let mut current = match &previous {
        Some(existing) => {
            let mut entry = existing.clone();
            apply(&mut entry, input);
            entries::save(conn, &entry)?;
            entry
        }
        None => {
            let new = new_entry(user, input);
            entries::insert(conn, &new)?
        }
    };
    tracing::debug!(entry = %current.id, project = %project.id, edited = previous.is_some(), "stored entry");

    let mut alert = match worklog::reconcile(conn, factory, &mut current, previous.as_ref()) {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(entry = %current.id, error = ?e, "work-log sync failed");
            Some(SyncAlert::new("work-log sync failed", &e))
        }
    };

    reclassify(conn, user, current.day, &mut alert);
    if let Some(previous) = previous.as_ref().filter(|p| p.day != current.day) {
        reclassify(conn, user, previous.day, &mut alert);
    }

    let entry = entries::find(conn, current.id)?.ok_or(SyncError::EntryNotFound(current.id))?;
    Ok(Saved { entry, alert })
}

/// Deletes an entry of `user`, removing its remote work-log first when
/// possible.
pub fn delete_entry(
    conn: &mut SqliteConnection,
    factory: &dyn TrackerFactory,
    user: &User,
    id: EntryId,
) -> Result<Option<SyncAlert>> {
    let entry = entries::find(conn, id)?.ok_or(SyncError::EntryNotFound(id))?;
    if entry.user_id != user.id {
        return Err(SyncError::validation(format!(
            "Entry {id} belongs to another user"
        )));
    }

    let mut alert = match worklog::remove(conn, factory, &entry) {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(entry = %id, error = ?e, "work-log removal failed");
            Some(SyncAlert::new("work-log removal failed", &e))
        }
    };
    entries::delete(conn, id)?;
    reclassify(conn, user, entry.day, &mut alert);
    Ok(alert)
}

/// Reclassifies one day of `user`. The entry is already stored at this
/// point, so a failure only becomes an alert, unless there is one already.
fn reclassify(
    conn: &mut SqliteConnection,
    user: &User,
    day: Date,
    alert: &mut Option<SyncAlert>,
) {
    if let Err(e) = classify::reclassify_day(conn, user.id, day) {
        let e = SyncError::from(e);
        tracing::warn!(user = %user.id, %day, error = ?e, "reclassification failed");
        alert.get_or_insert_with(|| SyncAlert::new("reclassification failed", &e));
    }
}

/// Range for [`bulk_create`], both ends inclusive.
#[derive(Debug, Clone, Copy)]
pub struct BulkRange {
    pub from: Date,
    pub to: Date,
    pub skip_weekends: bool,
}

/// Saves one entry per day of `range`, each like `template` with its day
/// replaced.
pub fn bulk_create(
    conn: &mut SqliteConnection,
    factory: &dyn TrackerFactory,
    user: &User,
    template: EntryInput,
    range: BulkRange,
) -> Result<Vec<Saved>> {
    if range.from > range.to {
        return Err(SyncError::validation(format!(
            "Range start {} is after its end {}",
            range.from, range.to
        )));
    }

    let mut saved = Vec::new();
    let mut day = range.from;
    loop {
        let weekend = matches!(day.weekday(), Weekday::Saturday | Weekday::Sunday);
        if !(range.skip_weekends && weekend) {
            let input = EntryInput {
                day,
                ..template.clone()
            };
            saved.push(save_entry(conn, factory, user, None, input)?);
        }
        match day.next_day() {
            Some(next) if next <= range.to => day = next,
            _ => break,
        }
    }
    tracing::info!(count = saved.len(), from = %range.from, to = %range.to, "bulk created entries");
    Ok(saved)
}

/// Rejects input that must not reach storage.
fn validate(conn: &mut SqliteConnection, input: &EntryInput) -> Result<Project> {
    let project = projects::find(conn, input.project_id)?
        .ok_or(SyncError::ProjectNotFound(input.project_id))?;
    if !project.active {
        return Err(SyncError::validation(format!(
            "Project \"{}\" is no longer active",
            project.name
        )));
    }

    if let Some(id) = input.customer_id {
        match projects::find_customer(conn, id)? {
            None => return Err(SyncError::validation(format!("Customer {id} doesn't exist"))),
            Some(customer) if !customer.active => {
                return Err(SyncError::validation(format!(
                    "Customer \"{}\" is no longer active",
                    customer.name
                )));
            }
            Some(_) => {}
        }
    }

    if let Some(id) = input.activity_id {
        if activities::find(conn, id)?.is_none() {
            return Err(SyncError::validation(format!("Activity {id} doesn't exist")));
        }
    }

    validate_ticket(&project, input.ticket.trim())?;
    Ok(project)
}

fn validate_ticket(project: &Project, ticket: &str) -> Result<()> {
    if ticket.is_empty() {
        return Ok(());
    }
    if !TICKET_FORMAT.is_match(ticket) {
        return Err(SyncError::validation(format!(
            "\"{ticket}\" is not a valid ticket key"
        )));
    }
    // Internally managed projects accept tickets of any tracker.
    if project.internal_project_key().is_some() {
        return Ok(());
    }

    let prefixes = project.ticket_prefix_list();
    if prefixes.is_empty() {
        return Ok(());
    }
    let prefix = ticket.rsplit_once('-').map_or(ticket, |(prefix, _)| prefix);
    let known = prefixes.iter().any(|p| p == prefix)
        || project.subticket_keys().iter().any(|key| key == ticket);
    if known {
        Ok(())
    } else {
        Err(SyncError::validation(format!(
            "Ticket \"{ticket}\" doesn't belong to project \"{}\"",
            project.name
        )))
    }
}

fn apply(entry: &mut TimeEntry, input: EntryInput) {
    let ticket = input.ticket.trim().to_string();
    // A newly typed ticket replaces whatever the internal tracker mapped the
    // old one to.
    if ticket != entry.ticket && entry.original_ticket_key.as_deref() != Some(ticket.as_str()) {
        entry.original_ticket_key = None;
    }
    entry.project_id = input.project_id;
    entry.customer_id = input.customer_id;
    entry.activity_id = input.activity_id;
    entry.ticket = ticket;
    entry.description = input.description;
    entry.day = input.day;
    entry.start_time = input.start;
    entry.end_time = input.end;
    entry.normalize_span();
}

fn new_entry(user: &User, input: EntryInput) -> NewEntry {
    let (start_time, end_time) = if input.start > input.end {
        (input.end, input.start)
    } else {
        (input.start, input.end)
    };
    NewEntry {
        user_id: user.id,
        project_id: input.project_id,
        customer_id: input.customer_id,
        activity_id: input.activity_id,
        day: input.day,
        start_time,
        end_time,
        duration_minutes: entries::span_minutes(start_time, end_time),
        class: EntryClass::DayBreak,
        ticket: input.ticket.trim().to_string(),
        original_ticket_key: None,
        description: input.description,
    }
}
