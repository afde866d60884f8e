use super::common::open_data;
use crate::config::Config;
use crate::ticket_systems::{self, NewTicketSystem, TicketSystemId, TicketSystemKind};
use crate::users::{self, AccessToken};
use crate::utils::{prompt, prompt_opt};
use crate::{activities, projects};
use clap::Subcommand;
use eyre::Result;
use owo_colors::OwoColorize;

#[derive(Debug, Subcommand)]
pub enum TicketSystemCmd {
    /// Register a remote ticket system
    Create {
        name: String,
        #[arg(long, value_enum)]
        kind: TicketSystemKind,
        /// Base URL, e.g. https://jira.example.com
        #[arg(long)]
        url: String,
        /// Don't mirror entries as work-logs
        #[arg(long)]
        no_book_time: bool,
    },
    List,
}

impl TicketSystemCmd {
    pub fn dispatch(self) -> Result<()> {
        let mut conn = open_data()?;
        match self {
            TicketSystemCmd::Create {
                name,
                kind,
                url,
                no_book_time,
            } => {
                let system = ticket_systems::create(
                    &mut conn,
                    NewTicketSystem {
                        name: &name,
                        kind,
                        url: url.trim_end_matches('/'),
                        book_time: !no_book_time,
                    },
                )?;
                eprintln!(
                    "{} Ticket system \"{}\" created with id {}",
                    "Success:".green().bold(),
                    system.name,
                    system.id
                );
                Ok(())
            }
            TicketSystemCmd::List => ticket_systems::list(&mut conn),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum UserCmd {
    Create { username: String },
    List,
    /// Store the access token used for a ticket system
    Token {
        ticket_system: TicketSystemId,
        /// Defaults to the configured user
        #[arg(long)]
        user: Option<String>,
    },
}

impl UserCmd {
    pub fn dispatch(self) -> Result<()> {
        let mut conn = open_data()?;
        match self {
            UserCmd::Create { username } => {
                let user = users::create(&mut conn, username.trim())?;
                eprintln!(
                    "{} User \"{}\" created with id {}",
                    "Success:".green().bold(),
                    user.username,
                    user.id
                );
                Ok(())
            }
            UserCmd::List => users::list(&mut conn),
            UserCmd::Token {
                ticket_system,
                user,
            } => {
                let username = match user {
                    Some(user) => user,
                    None => Config::read()?
                        .and_then(|config| config.user)
                        .ok_or_else(|| eyre::eyre!("No user given and none configured"))?,
                };
                let user = users::find_by_name(&mut conn, &username)?
                    .ok_or_else(|| eyre::eyre!("User \"{username}\" doesn't exist"))?;
                let system = ticket_systems::find(&mut conn, ticket_system)?
                    .ok_or_else(|| eyre::eyre!("Ticket system {ticket_system} doesn't exist"))?;

                let token = AccessToken {
                    token: prompt::<String>("Access token")?,
                    secret: prompt_opt::<String>("Token secret, for basic authentication")?
                        .unwrap_or_default(),
                };
                users::set_token(&mut conn, user.id, system.id, &token)?;
                eprintln!(
                    "{} Token for \"{}\" on \"{}\" stored",
                    "Success:".green().bold(),
                    user.username,
                    system.name
                );
                Ok(())
            }
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CustomerCmd {
    Create { name: String },
    List,
}

impl CustomerCmd {
    pub fn dispatch(self) -> Result<()> {
        let mut conn = open_data()?;
        match self {
            CustomerCmd::Create { name } => {
                let customer = projects::create_customer(&mut conn, name.trim())?;
                eprintln!(
                    "{} Customer \"{}\" created with id {}",
                    "Success:".green().bold(),
                    customer.name,
                    customer.id
                );
                Ok(())
            }
            CustomerCmd::List => projects::list_customers(&mut conn),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ActivityCmd {
    Create { name: String },
    List,
}

impl ActivityCmd {
    pub fn dispatch(self) -> Result<()> {
        let mut conn = open_data()?;
        match self {
            ActivityCmd::Create { name } => {
                let activity = activities::create(&mut conn, name.trim())?;
                eprintln!(
                    "{} Activity \"{}\" created with id {}",
                    "Success:".green().bold(),
                    activity.name,
                    activity.id
                );
                Ok(())
            }
            ActivityCmd::List => activities::list(&mut conn),
        }
    }
}
