use crate::data::sql_id;
use crate::schema::{customers, projects};
use crate::ticket_systems::TicketSystemId;
use crate::users::UserId;
use diesel::prelude::*;
use eyre::Result;

sql_id!(ProjectId);
sql_id!(CustomerId);

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, AsChangeset)]
#[diesel(table_name = crate::schema::projects)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub active: bool,
    pub customer_id: Option<CustomerId>,
    pub ticket_system_id: Option<TicketSystemId>,
    /// Comma separated ticket prefixes accepted for this project.
    pub ticket_prefixes: Option<String>,
    pub internal_ticket_project_key: Option<String>,
    pub internal_ticket_system_id: Option<TicketSystemId>,
    pub lead_user_id: Option<UserId>,
    /// Comma separated keys whose sub-tickets belong to this project.
    pub main_tickets: Option<String>,
    /// Comma separated, naturally sorted cache of all sub-ticket keys.
    pub subtickets: String,
}

impl Project {
    pub fn main_ticket_keys(&self) -> Vec<String> {
        split_keys(self.main_tickets.as_deref().unwrap_or_default())
    }

    pub fn subticket_keys(&self) -> Vec<String> {
        split_keys(&self.subtickets)
    }

    pub fn ticket_prefix_list(&self) -> Vec<String> {
        split_keys(self.ticket_prefixes.as_deref().unwrap_or_default())
    }

    /// Key of the internal tracker project, when tickets are managed there.
    pub fn internal_project_key(&self) -> Option<&str> {
        self.internal_ticket_project_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

fn split_keys(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[derive(Debug, Default, Insertable)]
#[diesel(table_name = crate::schema::projects)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewProject<'a> {
    pub name: &'a str,
    pub customer_id: Option<CustomerId>,
    pub ticket_system_id: Option<TicketSystemId>,
    pub ticket_prefixes: Option<&'a str>,
    pub internal_ticket_project_key: Option<&'a str>,
    pub internal_ticket_system_id: Option<TicketSystemId>,
    pub lead_user_id: Option<UserId>,
    pub main_tickets: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::customers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub active: bool,
}

pub fn find(conn: &mut SqliteConnection, id: ProjectId) -> QueryResult<Option<Project>> {
    projects::table
        .find(id)
        .select(Project::as_select())
        .first(conn)
        .optional()
}

pub fn save(conn: &mut SqliteConnection, project: &Project) -> QueryResult<()> {
    diesel::update(projects::table.find(project.id))
        .set(project)
        .execute(conn)?;
    Ok(())
}

pub fn create(conn: &mut SqliteConnection, project: NewProject) -> QueryResult<Project> {
    diesel::insert_into(projects::table)
        .values(&project)
        .returning(Project::as_returning())
        .get_result(conn)
}

/// Active projects that list main tickets, in id order.
pub fn with_main_tickets(conn: &mut SqliteConnection) -> QueryResult<Vec<Project>> {
    projects::table
        .filter(projects::active.eq(true))
        .filter(projects::main_tickets.is_not_null())
        .filter(projects::main_tickets.ne(""))
        .select(Project::as_select())
        .order_by(projects::id)
        .load(conn)
}

pub fn set_active(conn: &mut SqliteConnection, id: ProjectId, active: bool) -> Result<()> {
    let updated = diesel::update(projects::table.find(id))
        .set(projects::active.eq(active))
        .execute(conn)?;
    if updated == 0 {
        eyre::bail!("Project {id} doesn't exist");
    }
    Ok(())
}

pub fn set_main_tickets(conn: &mut SqliteConnection, id: ProjectId, keys: &[String]) -> Result<()> {
    let joined = keys.join(",");
    let updated = diesel::update(projects::table.find(id))
        .set(projects::main_tickets.eq((!joined.is_empty()).then_some(joined)))
        .execute(conn)?;
    if updated == 0 {
        eyre::bail!("Project {id} doesn't exist");
    }
    Ok(())
}

pub fn list_all(conn: &mut SqliteConnection) -> Result<()> {
    let projects = projects::table
        .left_join(customers::table)
        .select((Project::as_select(), customers::name.nullable()))
        .order_by(projects::id)
        .load::<(Project, Option<String>)>(conn)?;

    let mut table = comfy_table::Table::new();
    table.load_preset(crate::utils::TABLE_STYLE);
    table.set_header(["ID", "Name", "Customer", "Active", "Main tickets", "Subtickets"]);
    for (project, customer) in projects {
        table.add_row([
            project.id.to_string(),
            project.name.clone(),
            customer.unwrap_or_default(),
            if project.active { "yes" } else { "no" }.to_string(),
            project.main_tickets.clone().unwrap_or_default(),
            project.subtickets.clone(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn find_customer(conn: &mut SqliteConnection, id: CustomerId) -> QueryResult<Option<Customer>> {
    customers::table
        .find(id)
        .select(Customer::as_select())
        .first(conn)
        .optional()
}

pub fn create_customer(conn: &mut SqliteConnection, name: &str) -> QueryResult<Customer> {
    diesel::insert_into(customers::table)
        .values(customers::name.eq(name))
        .returning(Customer::as_returning())
        .get_result(conn)
}

pub fn list_customers(conn: &mut SqliteConnection) -> Result<()> {
    let customers = customers::table
        .select(Customer::as_select())
        .order_by(customers::id)
        .load(conn)?;

    let mut table = comfy_table::Table::new();
    table.load_preset(crate::utils::TABLE_STYLE);
    table.set_header(["ID", "Name", "Active"]);
    table.add_rows(customers.iter().map(|customer| {
        [
            customer.id.to_string(),
            customer.name.clone(),
            if customer.active { "yes" } else { "no" }.to_string(),
        ]
    }));
    println!("{table}");
    Ok(())
}
