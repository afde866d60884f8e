use crate::data::sql_id;
use crate::schema::ticket_systems;
use diesel::deserialize::{FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::ToSql;
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use eyre::Result;
use std::fmt;
use std::str::FromStr;

sql_id!(TicketSystemId);

/// Flavor of a remote tracker. Only Jira can book work-logs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, AsExpression, FromSqlRow, clap::ValueEnum)]
#[diesel(sql_type = Text)]
pub enum TicketSystemKind {
    Jira,
    Otrs,
}

impl TicketSystemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketSystemKind::Jira => "JIRA",
            TicketSystemKind::Otrs => "OTRS",
        }
    }

    pub fn supports_worklogs(&self) -> bool {
        match self {
            TicketSystemKind::Jira => true,
            TicketSystemKind::Otrs => false,
        }
    }
}

impl fmt::Display for TicketSystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketSystemKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "JIRA" => Ok(TicketSystemKind::Jira),
            "OTRS" => Ok(TicketSystemKind::Otrs),
            other => Err(format!("Unknown ticket system kind \"{other}\"")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::ticket_systems)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TicketSystem {
    pub id: TicketSystemId,
    pub name: String,
    pub kind: TicketSystemKind,
    pub url: String,
    pub book_time: bool,
}

impl TicketSystem {
    /// Whether entries booked against this system are mirrored as work-logs.
    pub fn books_worklogs(&self) -> bool {
        self.book_time && self.kind.supports_worklogs()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::ticket_systems)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewTicketSystem<'a> {
    pub name: &'a str,
    pub kind: TicketSystemKind,
    pub url: &'a str,
    pub book_time: bool,
}

pub fn find(conn: &mut SqliteConnection, id: TicketSystemId) -> QueryResult<Option<TicketSystem>> {
    ticket_systems::table
        .find(id)
        .select(TicketSystem::as_select())
        .first(conn)
        .optional()
}

pub fn create(conn: &mut SqliteConnection, new: NewTicketSystem) -> QueryResult<TicketSystem> {
    diesel::insert_into(ticket_systems::table)
        .values(&new)
        .returning(TicketSystem::as_returning())
        .get_result(conn)
}

pub fn list(conn: &mut SqliteConnection) -> Result<()> {
    let systems = ticket_systems::table
        .select(TicketSystem::as_select())
        .order_by(ticket_systems::id)
        .load(conn)?;

    let mut table = comfy_table::Table::new();
    table.load_preset(crate::utils::TABLE_STYLE);
    table.set_header(["ID", "Name", "Kind", "URL", "Book time"]);
    table.add_rows(systems.iter().map(|system| {
        [
            system.id.to_string(),
            system.name.clone(),
            system.kind.to_string(),
            system.url.clone(),
            if system.book_time { "yes" } else { "no" }.to_string(),
        ]
    }));
    println!("{table}");
    Ok(())
}

impl FromSql<Text, Sqlite> for TicketSystemKind {
    fn from_sql(
        bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> diesel::deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        raw.parse().map_err(Into::into)
    }
}

impl ToSql<Text, Sqlite> for TicketSystemKind {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Sqlite>,
    ) -> diesel::serialize::Result {
        <str as ToSql<Text, Sqlite>>::to_sql(self.as_str(), out)
    }
}
