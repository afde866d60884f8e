use crate::data::sql_id;
use crate::schema::{user_tokens, users};
use crate::ticket_systems::TicketSystemId;
use diesel::prelude::*;
use diesel::upsert::excluded;
use eyre::Result;

sql_id!(UserId);

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: UserId,
    pub username: String,
}

/// Credentials a user holds for one ticket system.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = crate::schema::user_tokens)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AccessToken {
    #[diesel(column_name = access_token)]
    pub token: String,
    #[diesel(column_name = token_secret)]
    pub secret: String,
}

pub fn find(conn: &mut SqliteConnection, id: UserId) -> QueryResult<Option<User>> {
    users::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .optional()
}

pub fn find_by_name(conn: &mut SqliteConnection, username: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::username.eq(username))
        .select(User::as_select())
        .first(conn)
        .optional()
}

pub fn create(conn: &mut SqliteConnection, username: &str) -> QueryResult<User> {
    diesel::insert_into(users::table)
        .values(users::username.eq(username))
        .returning(User::as_returning())
        .get_result(conn)
}

/// The token `user` stored for `ticket_system`, if any. An empty access
/// token counts as none.
pub fn token(
    conn: &mut SqliteConnection,
    user: UserId,
    ticket_system: TicketSystemId,
) -> QueryResult<Option<AccessToken>> {
    let token = user_tokens::table
        .find((user, ticket_system))
        .select(AccessToken::as_select())
        .first(conn)
        .optional()?;
    Ok(token.filter(|token| !token.token.is_empty()))
}

pub fn set_token(
    conn: &mut SqliteConnection,
    user: UserId,
    ticket_system: TicketSystemId,
    token: &AccessToken,
) -> QueryResult<()> {
    diesel::insert_into(user_tokens::table)
        .values((
            user_tokens::user_id.eq(user),
            user_tokens::ticket_system_id.eq(ticket_system),
            user_tokens::access_token.eq(&token.token),
            user_tokens::token_secret.eq(&token.secret),
        ))
        .on_conflict((user_tokens::user_id, user_tokens::ticket_system_id))
        .do_update()
        .set((
            user_tokens::access_token.eq(excluded(user_tokens::access_token)),
            user_tokens::token_secret.eq(excluded(user_tokens::token_secret)),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn list(conn: &mut SqliteConnection) -> Result<()> {
    let users = users::table
        .select(User::as_select())
        .order_by(users::username)
        .load(conn)?;

    let mut table = comfy_table::Table::new();
    table.load_preset(crate::utils::TABLE_STYLE);
    table.set_header(["ID", "Username"]);
    table.add_rows(
        users
            .iter()
            .map(|user| [user.id.to_string(), user.username.clone()]),
    );
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data;
    use crate::ticket_systems::{self, NewTicketSystem, TicketSystemKind};

    #[test]
    fn token_is_replaced_on_second_set() {
        let mut conn = data::open_in_memory().unwrap();
        let user = create(&mut conn, "jane").unwrap();
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

        assert_eq!(token(&mut conn, user.id, jira.id).unwrap(), None);

        let first = AccessToken {
            token: "one".to_string(),
            secret: String::new(),
        };
        set_token(&mut conn, user.id, jira.id, &first).unwrap();
        let second = AccessToken {
            token: "two".to_string(),
            secret: "s".to_string(),
        };
        set_token(&mut conn, user.id, jira.id, &second).unwrap();

        assert_eq!(token(&mut conn, user.id, jira.id).unwrap(), Some(second));
    }

    #[test]
    fn empty_token_counts_as_missing() {
        let mut conn = data::open_in_memory().unwrap();
        let user = create(&mut conn, "jane").unwrap();
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
        let blank = AccessToken {
            token: String::new(),
            secret: String::new(),
        };
        set_token(&mut conn, user.id, jira.id, &blank).unwrap();

        assert_eq!(token(&mut conn, user.id, jira.id).unwrap(), None);
        assert_eq!(
            find_by_name(&mut conn, "jane").unwrap().map(|u| u.id),
            Some(user.id)
        );
    }
}
