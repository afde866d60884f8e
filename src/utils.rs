use console::Term;
use eyre::Result;
use owo_colors::OwoColorize;
use std::cmp::Ordering;
use std::str::FromStr;
use time::Time;

const MAX_ATTEMPTS: u32 = 3;

pub const TABLE_STYLE: &str = "┃┃━━┣━┿┫│─┼┠┨┯┷┏┓┗┛";

pub fn yn_prompt(msg: &str) -> Result<bool> {
    eprintln!("{msg} [Y/n]");
    let term = Term::stderr();
    let mut attempt = 1;
    loop {
        let answer = term.read_char()?;
        match answer {
            'y' | 'Y' | '\n' => break Ok(true),
            'n' | 'N' => break Ok(false),
            unknown => eprintln!(
                "{} {}, press {} to confirm or {} to cancel",
                "Unknown option:".yellow().bold(),
                format!("'{unknown}'").red(),
                "'y'".green(),
                "'n'".green()
            ),
        }
        attempt += 1;
        if attempt > MAX_ATTEMPTS {
            eyre::bail!("Unable to parse response in {MAX_ATTEMPTS} attempts");
        }
    }
}

pub fn prompt_opt<T>(msg: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Into<eyre::Report>,
{
    eprintln!("{msg} (leave empty for none):");
    let mut rl = rustyline::DefaultEditor::new()?;
    let buffer = rl.readline("")?;
    let str = buffer.trim();
    if str.is_empty() {
        Ok(None)
    } else {
        str.parse().map(Some).map_err(Into::into)
    }
}

pub fn prompt<T>(msg: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Into<eyre::Report>,
{
    let mut attempt = 1;
    loop {
        eprintln!("{msg}:");
        let mut rl = rustyline::DefaultEditor::new()?;
        let buffer = rl.readline("")?;
        let str = buffer.trim();
        if str.is_empty() {
            eprintln!(
                "{} This field can't be empty and must be initialized",
                "Note:".cyan()
            );
        } else {
            match str.parse().map_err(Into::into) {
                Ok(v) => break Ok(v),
                Err(e) => eprintln!("{} Unable to parse: {e}", "Error:".red().bold()),
            }
        }
        attempt += 1;
        if attempt > MAX_ATTEMPTS {
            eyre::bail!("Unable to parse response in {MAX_ATTEMPTS} attempts");
        }
        eprintln!("{} Attempt {attempt}/{MAX_ATTEMPTS}", "Info:".cyan())
    }
}

pub fn fmt_time(time: Time) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

pub fn fmt_minutes(minutes: i32) -> String {
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

/// Case-insensitive natural ordering: digit runs compare by value, so
/// `ABC-2` sorts before `ABC-10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l = take_number(&mut left);
                let r = take_number(&mut right);
                let ord = l
                    .trim_start_matches('0')
                    .len()
                    .cmp(&r.trim_start_matches('0').len())
                    .then_with(|| l.trim_start_matches('0').cmp(r.trim_start_matches('0')));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut number = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        number.push(c);
    }
    number
}
