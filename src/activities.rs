use crate::data::sql_id;
use crate::schema::activities;
use diesel::prelude::*;
use eyre::Result;

sql_id!(ActivityId);

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::activities)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Activity {
    pub id: ActivityId,
    pub name: String,
}

pub fn find(conn: &mut SqliteConnection, id: ActivityId) -> QueryResult<Option<Activity>> {
    activities::table
        .find(id)
        .select(Activity::as_select())
        .first(conn)
        .optional()
}

pub fn create(conn: &mut SqliteConnection, name: &str) -> QueryResult<Activity> {
    diesel::insert_into(activities::table)
        .values(activities::name.eq(name))
        .returning(Activity::as_returning())
        .get_result(conn)
}

pub fn list(conn: &mut SqliteConnection) -> Result<()> {
    let activities = activities::table
        .select(Activity::as_select())
        .order_by(activities::name)
        .load(conn)?;

    let mut table = comfy_table::Table::new();
    table.load_preset(crate::utils::TABLE_STYLE);
    table.set_header(["ID", "Name"]);
    table.add_rows(
        activities
            .iter()
            .map(|activity| [activity.id.to_string(), activity.name.clone()]),
    );
    println!("{table}");
    Ok(())
}
