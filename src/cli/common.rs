use crate::config::Config;
use crate::data;
use crate::sync::SyncAlert;
use crate::tracker::HttpTrackerFactory;
use crate::users::{self, User};
use clap::Args;
use diesel::SqliteConnection;
use eyre::{OptionExt, Result};
use owo_colors::OwoColorize;
use time::ext::NumericalDuration;
use time::macros::format_description;
use time::{Date, Duration, Time, Weekday};

/// Everything a command acting on behalf of the configured user needs.
pub struct Session {
    pub config: Config,
    pub conn: SqliteConnection,
    pub user: User,
}

impl Session {
    pub fn open() -> Result<Self> {
        let config = Config::read()?.unwrap_or_default();
        let mut conn = data::open(config.data_path.as_ref())?;
        let username = config
            .user
            .clone()
            .ok_or_eyre("No user configured, run `tlog config user <name>` first")?;
        let user = users::find_by_name(&mut conn, &username)?
            .ok_or_else(|| eyre::eyre!("User \"{username}\" doesn't exist, create it with `tlog user create`"))?;
        Ok(Self { config, conn, user })
    }

    pub fn trackers(&self) -> HttpTrackerFactory {
        tracker_factory(&self.config)
    }

    pub fn today(&self) -> Result<Date> {
        let now = time::OffsetDateTime::now_local()?;
        DateArgGroup::default().to_date(&self.config, now)
    }
}

pub fn tracker_factory(config: &Config) -> HttpTrackerFactory {
    HttpTrackerFactory {
        timeout: config.tracker_timeout(),
    }
}

pub fn open_data() -> Result<SqliteConnection> {
    let config = Config::read()?.unwrap_or_default();
    data::open(config.data_path.as_ref())
}

pub fn report_alert(alert: &SyncAlert) {
    match alert {
        SyncAlert::Reauthenticate(_) => {
            eprintln!("{} {alert}", "Unauthorized:".yellow().bold())
        }
        SyncAlert::Message(_) => eprintln!("{} {alert}", "Warning:".yellow().bold()),
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct DateArgGroup {
    /// Entry date, today
    #[arg(long, group = "date_group")]
    today: bool,
    /// Entry date, yesterday
    #[arg(long, group = "date_group")]
    yesterday: bool,
    /// Entry date, nearest past weekday
    #[arg(short, long, value_parser = weekday_value_parser, group = "date_group")]
    weekday: Option<Weekday>,
    /// Entry date, string in ISO8601 format
    #[arg(long, value_parser = date_value_parser, group = "date_group")]
    date: Option<Date>,
    /// Entry day
    #[arg(short, long, group = "date_group")]
    day: Option<u8>,
    /// Entry month
    #[arg(short, long, requires = "day")]
    month: Option<time::Month>,
    /// Entry year
    #[arg(long, requires = "month")]
    year: Option<i32>,
}

impl DateArgGroup {
    pub fn is_set(&self) -> bool {
        self.today
            || self.yesterday
            || self.weekday.is_some()
            || self.date.is_some()
            || self.day.is_some()
    }

    pub fn to_date(&self, config: &Config, now: time::OffsetDateTime) -> Result<Date> {
        let today = now.date();
        let yesterday = || today.previous_day().ok_or_eyre("Date out of range");

        let date = if self.today {
            today
        } else if self.yesterday {
            yesterday()?
        } else if let Some(weekday) = self.weekday {
            today.prev_occurrence(weekday)
        } else if let Some(date) = self.date {
            date
        } else if let Some(day) = self.day {
            match (self.month, self.year) {
                (None, None) if day > today.day() => {
                    let last_month = today - (day as i64).days();
                    last_month.replace_day(day)?
                }
                (None, None) => today.replace_day(day)?,
                (None, Some(_)) => unreachable!("Invalid argument combination"),
                (Some(month), None) => {
                    let year = today.year()
                        - ((month == today.month() && day > today.day())
                            || month as u8 > today.month() as u8) as i32;
                    Date::from_calendar_date(year, month, day)?
                }
                (Some(month), Some(year)) => Date::from_calendar_date(year, month, day)?,
            }
        } else if now.time() < config.day_change_threshold() {
            yesterday()?
        } else {
            today
        };

        Ok(date)
    }
}

/// Wall clock time, `HH:MM`.
pub fn clock_value_parser(v: &str) -> Result<Time, time::error::Parse> {
    Time::parse(v.trim(), format_description!("[hour]:[minute]"))
}

pub fn date_value_parser(v: &str) -> Result<Date, time::error::Parse> {
    Date::parse(v, &time::format_description::well_known::Iso8601::DATE)
}

pub fn duration_value_parser(v: &str) -> Result<Duration> {
    let mut unit = 60;
    let mut result = None;
    let mut number = None;
    for c in v.chars() {
        match c {
            '0'..='9' => number = Some(number.unwrap_or(0) * 10 + (c as u8 - b'0') as i64),
            'h' => {
                let res = result.unwrap_or(0);
                let acc = number.ok_or_eyre("Number expected before unit")?;
                result = Some(res + acc * 60);
                number = None;
                unit = 1;
            }
            'm' => {
                let res = result.unwrap_or(0);
                let acc = number.ok_or_eyre("Number expected before unit")?;
                result = Some(acc + res);
                number = None;
                unit = 0;
            }
            unexpected => eyre::bail!("Unexpected character in duration: '{unexpected}'"),
        }
    }
    let minutes = match (result, number) {
        (_, Some(n)) if unit == 0 => {
            eyre::bail!("Unable to parse duration, unknown unit for value {n}")
        }
        (Some(r), Some(n)) => r + n * unit,
        (Some(r), None) => r,
        (None, Some(n)) => n * unit,
        (None, None) => eyre::bail!("Number expected"),
    };

    Ok(Duration::minutes(minutes))
}

pub fn weekday_value_parser(v: &str) -> Result<Weekday> {
    let weekday = match v.to_lowercase().as_str() {
        "mon" | "monday" => Weekday::Monday,
        "tue" | "tuesday" => Weekday::Tuesday,
        "wed" | "wednesday" => Weekday::Wednesday,
        "thu" | "thursday" => Weekday::Thursday,
        "fri" | "friday" => Weekday::Friday,
        "sat" | "saturday" => Weekday::Saturday,
        "sun" | "sunday" => Weekday::Sunday,
        _ => eyre::bail!("Invalid weekday: \"{v}\""),
    };
    Ok(weekday)
}
