use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use eyre::{Result, eyre};
use std::path::Path;

/// Integer primary key newtype that diesel can read and write directly.
macro_rules! sql_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Copy,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            diesel::expression::AsExpression,
            diesel::deserialize::FromSqlRow,
        )]
        #[diesel(sql_type = diesel::sql_types::Integer)]
        pub struct $name(pub i32);

        impl diesel::deserialize::FromSql<diesel::sql_types::Integer, diesel::sqlite::Sqlite>
            for $name
        {
            fn from_sql(
                bytes: <diesel::sqlite::Sqlite as diesel::backend::Backend>::RawValue<'_>,
            ) -> diesel::deserialize::Result<Self> {
                <i32 as diesel::deserialize::FromSql<
                    diesel::sql_types::Integer,
                    diesel::sqlite::Sqlite,
                >>::from_sql(bytes)
                .map($name)
            }
        }

        impl diesel::serialize::ToSql<diesel::sql_types::Integer, diesel::sqlite::Sqlite>
            for $name
        {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<'b, '_, diesel::sqlite::Sqlite>,
            ) -> diesel::serialize::Result {
                <i32 as diesel::serialize::ToSql<
                    diesel::sql_types::Integer,
                    diesel::sqlite::Sqlite,
                >>::to_sql(&self.0, out)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.trim().parse().map($name)
            }
        }
    };
}

pub(crate) use sql_id;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn open(path: &Path) -> Result<SqliteConnection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = SqliteConnection::establish(
        path.as_os_str()
            .to_str()
            .ok_or_else(|| eyre!("Invalid data path"))?,
    )?;
    prepare(conn)
}

/// Fresh database that lives as long as the connection, used by tests.
#[cfg(test)]
pub fn open_in_memory() -> Result<SqliteConnection> {
    prepare(SqliteConnection::establish(":memory:")?)
}

fn prepare(mut conn: SqliteConnection) -> Result<SqliteConnection> {
    diesel::sql_query("PRAGMA foreign_keys = ON").execute(&mut conn)?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| eyre!("{e}"))?;
    if !applied.is_empty() {
        tracing::debug!(count = applied.len(), "applied database migrations");
    }
    Ok(conn)
}
