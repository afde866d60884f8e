use crate::activities::ActivityId;
use crate::data::sql_id;
use crate::projects::{CustomerId, ProjectId};
use crate::schema::{activities, entries, projects};
use crate::users::UserId;
use diesel::deserialize::{FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::ToSql;
use diesel::sql_types::Integer;
use diesel::sqlite::Sqlite;
use eyre::Result;
use owo_colors::OwoColorize;
use std::fmt;
use time::{Date, PrimitiveDateTime, Time};

sql_id!(EntryId);

/// Position of an entry relative to the one before it on the same day.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Integer)]
pub enum EntryClass {
    /// Starts exactly where the previous entry ended.
    Plain = 1,
    /// First entry of the day.
    DayBreak = 2,
    /// Starts after the previous entry ended.
    Pause = 4,
    /// Starts before the previous entry ended.
    Overlap = 8,
}

impl EntryClass {
    fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(EntryClass::Plain),
            2 => Some(EntryClass::DayBreak),
            4 => Some(EntryClass::Pause),
            8 => Some(EntryClass::Overlap),
            _ => None,
        }
    }
}

impl fmt::Display for EntryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryClass::Plain => "plain",
            EntryClass::DayBreak => "day start",
            EntryClass::Pause => "pause",
            EntryClass::Overlap => "overlap",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, AsChangeset)]
#[diesel(table_name = crate::schema::entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct TimeEntry {
    pub id: EntryId,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub customer_id: Option<CustomerId>,
    pub activity_id: Option<ActivityId>,
    pub day: Date,
    pub start_time: Time,
    pub end_time: Time,
    pub duration_minutes: i32,
    pub class: EntryClass,
    pub ticket: String,
    /// Ticket as typed by the user, before an internal tracker replaced it.
    pub original_ticket_key: Option<String>,
    pub worklog_id: Option<String>,
    pub description: String,
}

impl TimeEntry {
    pub fn started_at(&self) -> PrimitiveDateTime {
        PrimitiveDateTime::new(self.day, self.start_time)
    }

    /// Swaps inverted start and end, then recomputes the duration.
    pub fn normalize_span(&mut self) {
        if self.start_time > self.end_time {
            std::mem::swap(&mut self.start_time, &mut self.end_time);
        }
        self.duration_minutes = span_minutes(self.start_time, self.end_time);
    }
}

pub fn span_minutes(start: Time, end: Time) -> i32 {
    (end - start).whole_minutes() as i32
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewEntry {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub customer_id: Option<CustomerId>,
    pub activity_id: Option<ActivityId>,
    pub day: Date,
    pub start_time: Time,
    pub end_time: Time,
    pub duration_minutes: i32,
    pub class: EntryClass,
    pub ticket: String,
    pub original_ticket_key: Option<String>,
    pub description: String,
}

pub fn find(conn: &mut SqliteConnection, id: EntryId) -> QueryResult<Option<TimeEntry>> {
    entries::table
        .find(id)
        .select(TimeEntry::as_select())
        .first(conn)
        .optional()
}

pub fn insert(conn: &mut SqliteConnection, entry: &NewEntry) -> QueryResult<TimeEntry> {
    diesel::insert_into(entries::table)
        .values(entry)
        .returning(TimeEntry::as_returning())
        .get_result(conn)
}

pub fn save(conn: &mut SqliteConnection, entry: &TimeEntry) -> QueryResult<()> {
    diesel::update(entries::table.find(entry.id))
        .set(entry)
        .execute(conn)?;
    Ok(())
}

pub fn save_class(conn: &mut SqliteConnection, id: EntryId, class: EntryClass) -> QueryResult<()> {
    diesel::update(entries::table.find(id))
        .set(entries::class.eq(class))
        .execute(conn)?;
    Ok(())
}

pub fn delete(conn: &mut SqliteConnection, id: EntryId) -> QueryResult<()> {
    diesel::delete(entries::table.find(id)).execute(conn)?;
    Ok(())
}

/// All entries of `user` on `day`, by start time. Entries starting at the
/// same time keep their creation order.
pub fn find_for_user_day(
    conn: &mut SqliteConnection,
    user: UserId,
    day: Date,
) -> QueryResult<Vec<TimeEntry>> {
    entries::table
        .filter(entries::user_id.eq(user))
        .filter(entries::day.eq(day))
        .select(TimeEntry::as_select())
        .order_by((entries::start_time, entries::id))
        .load(conn)
}

pub fn show_day(conn: &mut SqliteConnection, user: UserId, day: Date) -> Result<()> {
    let rows = entries::table
        .inner_join(projects::table)
        .left_join(activities::table)
        .filter(entries::user_id.eq(user))
        .filter(entries::day.eq(day))
        .select((
            TimeEntry::as_select(),
            projects::name,
            activities::name.nullable(),
        ))
        .order_by((entries::start_time, entries::id))
        .load::<(TimeEntry, String, Option<String>)>(conn)?;

    let mut table = comfy_table::Table::new();
    table.load_preset(crate::utils::TABLE_STYLE);
    table.set_header([
        "ID", "Start", "End", "Duration", "Class", "Project", "Activity", "Ticket", "Worklog",
        "Description",
    ]);
    table.add_rows(rows.iter().map(|(entry, project, activity)| {
        [
            entry.id.to_string(),
            crate::utils::fmt_time(entry.start_time),
            crate::utils::fmt_time(entry.end_time),
            crate::utils::fmt_minutes(entry.duration_minutes),
            entry.class.to_string(),
            project.clone(),
            activity.clone().unwrap_or_default(),
            if entry.ticket.is_empty() {
                "-".to_string()
            } else {
                entry.ticket.clone()
            },
            entry.worklog_id.clone().unwrap_or_else(|| "-".to_string()),
            entry.description.clone(),
        ]
    }));
    println!("{table}");

    let total: i32 = rows.iter().map(|(entry, _, _)| entry.duration_minutes).sum();
    eprintln!(
        "{} {} ({})",
        "Total:".bold(),
        crate::utils::fmt_minutes(total),
        day.weekday()
    );
    Ok(())
}

impl FromSql<Integer, Sqlite> for EntryClass {
    fn from_sql(
        bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> diesel::deserialize::Result<Self> {
        let code = <i32 as FromSql<Integer, Sqlite>>::from_sql(bytes)?;
        EntryClass::from_code(code).ok_or_else(|| format!("Unknown entry class {code}").into())
    }
}

impl ToSql<Integer, Sqlite> for EntryClass {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Sqlite>,
    ) -> diesel::serialize::Result {
        out.set_value(*self as i32);
        Ok(diesel::serialize::IsNull::No)
    }
}
