use super::common::{open_data, tracker_factory};
use crate::config::Config;
use crate::data;
use crate::projects::{self, CustomerId, NewProject, ProjectId};
use crate::subtickets;
use crate::ticket_systems::TicketSystemId;
use crate::users;
use crate::utils::prompt;
use clap::Subcommand;
use eyre::Result;
use owo_colors::OwoColorize;

#[derive(Debug, Subcommand)]
pub enum ProjectCmd {
    /// Create a new project
    Create {
        /// Project name, asked for when omitted
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        customer: Option<CustomerId>,
        /// Ticket system work-logs are booked on
        #[arg(long)]
        ticket_system: Option<TicketSystemId>,
        /// Comma separated ticket prefixes accepted for this project
        #[arg(long)]
        prefixes: Option<String>,
        /// Project key in the internal ticket system
        #[arg(long, requires = "internal_system")]
        internal_key: Option<String>,
        #[arg(long, requires = "internal_key")]
        internal_system: Option<TicketSystemId>,
        /// Username of the project lead
        #[arg(long)]
        lead: Option<String>,
        /// Comma separated main ticket keys
        #[arg(long)]
        main_tickets: Option<String>,
    },
    /// List all existing projects
    List,
    /// Replace the main tickets of a project
    MainTickets {
        id: ProjectId,
        /// Ticket keys, none to clear
        keys: Vec<String>,
    },
    /// Refresh the subticket cache of one project, or of every project with
    /// main tickets
    SyncSubtickets { id: Option<ProjectId> },
    Activate { id: ProjectId },
    Deactivate { id: ProjectId },
}

impl ProjectCmd {
    pub fn dispatch(self) -> Result<()> {
        match self {
            ProjectCmd::Create {
                name,
                customer,
                ticket_system,
                prefixes,
                internal_key,
                internal_system,
                lead,
                main_tickets,
            } => {
                let mut conn = open_data()?;
                let name = match name {
                    Some(name) => name,
                    None => prompt::<String>("Enter new project name")?,
                };
                let lead_user_id = match lead {
                    Some(username) => Some(
                        users::find_by_name(&mut conn, &username)?
                            .ok_or_else(|| eyre::eyre!("User \"{username}\" doesn't exist"))?
                            .id,
                    ),
                    None => None,
                };
                let project = projects::create(
                    &mut conn,
                    NewProject {
                        name: &name,
                        customer_id: customer,
                        ticket_system_id: ticket_system,
                        ticket_prefixes: prefixes.as_deref(),
                        internal_ticket_project_key: internal_key.as_deref(),
                        internal_ticket_system_id: internal_system,
                        lead_user_id,
                        main_tickets: main_tickets.as_deref(),
                    },
                )?;
                eprintln!(
                    "{} Project \"{}\" created with id {}",
                    "Success:".green().bold(),
                    project.name,
                    project.id
                );
                Ok(())
            }
            ProjectCmd::List => projects::list_all(&mut open_data()?),
            ProjectCmd::MainTickets { id, keys } => {
                let keys: Vec<String> = keys
                    .iter()
                    .flat_map(|arg| arg.split(','))
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(ToString::to_string)
                    .collect();
                projects::set_main_tickets(&mut open_data()?, id, &keys)?;
                eprintln!(
                    "{} Main tickets of project {id} updated, run `tlog project sync-subtickets {id}` to refresh its subtickets",
                    "Success:".green().bold()
                );
                Ok(())
            }
            ProjectCmd::SyncSubtickets { id } => sync_subtickets(id),
            ProjectCmd::Activate { id } => projects::set_active(&mut open_data()?, id, true),
            ProjectCmd::Deactivate { id } => projects::set_active(&mut open_data()?, id, false),
        }
    }
}

fn sync_subtickets(id: Option<ProjectId>) -> Result<()> {
    let config = Config::read()?.unwrap_or_default();
    let mut conn = data::open(config.data_path.as_ref())?;
    let trackers = tracker_factory(&config);
    match id {
        Some(id) => {
            let keys = subtickets::resolve(&mut conn, &trackers, id)?;
            eprintln!(
                "{} Project {id} has {} subtickets",
                "Success:".green().bold(),
                keys.len()
            );
        }
        None => {
            for outcome in subtickets::sync_all(&mut conn, &trackers)? {
                match outcome.result {
                    Ok(keys) => eprintln!(
                        "{} {}: {} subtickets",
                        "Synced:".green().bold(),
                        outcome.project.name,
                        keys.len()
                    ),
                    Err(e) => eprintln!(
                        "{} {}: {e} ({})",
                        "Failed:".red().bold(),
                        outcome.project.name,
                        e.status()
                    ),
                }
            }
        }
    }
    Ok(())
}
