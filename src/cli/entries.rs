use super::common::{
    DateArgGroup, Session, clock_value_parser, date_value_parser, duration_value_parser,
    report_alert,
};
use crate::activities::ActivityId;
use crate::entries::{self, EntryId};
use crate::projects::{CustomerId, ProjectId};
use crate::sync::{self, BulkRange, EntryInput, Saved};
use eyre::Result;
use owo_colors::OwoColorize;
use time::{Date, Duration, OffsetDateTime, Time};

#[derive(Debug, clap::Args)]
#[group(id = "span_end", required = true, multiple = false)]
pub struct EndArgGroup {
    /// End time, HH:MM
    #[arg(short, long, value_parser = clock_value_parser)]
    end: Option<Time>,
    /// Duration in hours and minutes instead of an end time. Default unit is hours
    #[arg(short, long, value_parser = duration_value_parser)]
    time: Option<Duration>,
}

impl EndArgGroup {
    fn end_for(&self, start: Time) -> Result<Time> {
        match (self.end, self.time) {
            (Some(end), _) => Ok(end),
            (None, Some(duration)) => {
                let minutes = i64::from(start.hour()) * 60
                    + i64::from(start.minute())
                    + duration.whole_minutes();
                if minutes >= 24 * 60 {
                    eyre::bail!("Entry can't extend past midnight");
                }
                Ok(Time::from_hms((minutes / 60) as u8, (minutes % 60) as u8, 0)?)
            }
            (None, None) => eyre::bail!("Either an end time or a duration is required"),
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct EntryFields {
    /// Project the time is booked on
    #[arg(short, long)]
    project: ProjectId,
    #[arg(long)]
    customer: Option<CustomerId>,
    #[arg(short, long)]
    activity: Option<ActivityId>,
    /// Ticket key, e.g. ABC-123
    #[arg(long, default_value = "")]
    ticket: String,
    /// Description
    #[arg(long = "message", short = 'M', default_value = "")]
    description: String,
}

impl EntryFields {
    fn input(self, day: Date, start: Time, end: Time) -> EntryInput {
        EntryInput {
            project_id: self.project,
            customer_id: self.customer,
            activity_id: self.activity,
            ticket: self.ticket,
            description: self.description,
            day,
            start,
            end,
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct AddCmd {
    /// Start time, HH:MM
    #[arg(short, long, value_parser = clock_value_parser)]
    start: Time,
    #[command(flatten)]
    end: EndArgGroup,
    #[command(flatten)]
    fields: EntryFields,
    /// Date
    #[command(flatten)]
    date: DateArgGroup,
}

impl AddCmd {
    pub fn dispatch(self) -> Result<()> {
        let mut session = Session::open()?;
        let day = self.date.to_date(&session.config, OffsetDateTime::now_local()?)?;
        let end = self.end.end_for(self.start)?;
        let input = self.fields.input(day, self.start, end);

        let trackers = session.trackers();
        let saved = sync::save_entry(&mut session.conn, &trackers, &session.user, None, input)?;
        report_saved(&saved);
        Ok(())
    }
}

#[derive(Debug, clap::Args)]
pub struct EditCmd {
    id: EntryId,
    #[arg(short, long, value_parser = clock_value_parser)]
    start: Option<Time>,
    #[arg(short, long, value_parser = clock_value_parser)]
    end: Option<Time>,
    #[arg(long, value_parser = date_value_parser)]
    date: Option<Date>,
    #[arg(short, long)]
    project: Option<ProjectId>,
    #[arg(long, group = "customer_value")]
    customer: Option<CustomerId>,
    #[arg(long = "no-customer", group = "customer_value")]
    no_customer: bool,
    #[arg(short, long)]
    activity: Option<ActivityId>,
    /// New ticket key, empty to remove the ticket
    #[arg(long)]
    ticket: Option<String>,
    #[arg(long = "message", short = 'M')]
    description: Option<String>,
}

impl EditCmd {
    pub fn dispatch(self) -> Result<()> {
        let mut session = Session::open()?;
        let existing = entries::find(&mut session.conn, self.id)?
            .ok_or_else(|| eyre::eyre!("Entry {} doesn't exist", self.id))?;

        let mut input = EntryInput::from_entry(&existing);
        if let Some(start) = self.start {
            input.start = start;
        }
        if let Some(end) = self.end {
            input.end = end;
        }
        if let Some(day) = self.date {
            input.day = day;
        }
        if let Some(project) = self.project {
            input.project_id = project;
        }
        if self.no_customer {
            input.customer_id = None;
        } else if self.customer.is_some() {
            input.customer_id = self.customer;
        }
        if self.activity.is_some() {
            input.activity_id = self.activity;
        }
        if let Some(ticket) = self.ticket {
            input.ticket = ticket;
        }
        if let Some(description) = self.description {
            input.description = description;
        }

        let trackers = session.trackers();
        let saved =
            sync::save_entry(&mut session.conn, &trackers, &session.user, Some(self.id), input)?;
        report_saved(&saved);
        Ok(())
    }
}

#[derive(Debug, clap::Args)]
pub struct DeleteCmd {
    id: EntryId,
    /// Don't ask for confirmation
    #[arg(short, long)]
    yes: bool,
}

impl DeleteCmd {
    pub fn dispatch(self) -> Result<()> {
        let mut session = Session::open()?;
        if !self.yes && !crate::utils::yn_prompt(&format!("Delete entry {}?", self.id))? {
            eyre::bail!("Deletion aborted");
        }
        let trackers = session.trackers();
        let alert = sync::delete_entry(&mut session.conn, &trackers, &session.user, self.id)?;
        if let Some(alert) = &alert {
            report_alert(alert);
        }
        eprintln!("{} Entry {} deleted", "Success:".green().bold(), self.id);
        Ok(())
    }
}

#[derive(Debug, clap::Args)]
pub struct BulkCmd {
    /// First day, string in ISO8601 format
    #[arg(long, value_parser = date_value_parser)]
    from: Date,
    /// Last day, string in ISO8601 format
    #[arg(long, value_parser = date_value_parser)]
    to: Date,
    #[arg(long)]
    skip_weekends: bool,
    /// Start time, HH:MM
    #[arg(short, long, value_parser = clock_value_parser)]
    start: Time,
    #[command(flatten)]
    end: EndArgGroup,
    #[command(flatten)]
    fields: EntryFields,
}

impl BulkCmd {
    pub fn dispatch(self) -> Result<()> {
        let mut session = Session::open()?;
        let end = self.end.end_for(self.start)?;
        let template = self.fields.input(self.from, self.start, end);
        let range = BulkRange {
            from: self.from,
            to: self.to,
            skip_weekends: self.skip_weekends,
        };

        let trackers = session.trackers();
        let saved =
            sync::bulk_create(&mut session.conn, &trackers, &session.user, template, range)?;
        for entry in &saved {
            if let Some(alert) = &entry.alert {
                eprint!("{} ", entry.entry.day.bold());
                report_alert(alert);
            }
        }
        eprintln!(
            "{} Created {} entries",
            "Success:".green().bold(),
            saved.len()
        );
        Ok(())
    }
}

#[derive(Debug, clap::Args)]
pub struct ShowCmd {
    /// Date
    #[command(flatten)]
    date: DateArgGroup,
}

impl ShowCmd {
    pub fn dispatch(self) -> Result<()> {
        let mut session = Session::open()?;
        let day = if self.date.is_set() {
            self.date.to_date(&session.config, OffsetDateTime::now_local()?)?
        } else {
            session.today()?
        };
        entries::show_day(&mut session.conn, session.user.id, day)
    }
}

fn report_saved(saved: &Saved) {
    if let Some(alert) = &saved.alert {
        report_alert(alert);
    }
    let entry = &saved.entry;
    eprintln!(
        "{} Entry {} saved: {} {}-{} ({}, {})",
        "Success:".green().bold(),
        entry.id,
        entry.day,
        crate::utils::fmt_time(entry.start_time),
        crate::utils::fmt_time(entry.end_time),
        crate::utils::fmt_minutes(entry.duration_minutes),
        entry.class,
    );
}
