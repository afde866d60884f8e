//! Day classification: marks each entry of a user's day as the day start,
//! contiguous work, a pause or an overlap with the entry before it.

use crate::entries::{self, EntryClass, TimeEntry};
use crate::users::UserId;
use diesel::prelude::*;
use std::cmp::Ordering;
use time::Date;

/// Classes for a single user-day, index aligned with `entries`.
///
/// `entries` must be the complete day, already ordered by start time.
pub fn classify(entries: &[TimeEntry]) -> Vec<EntryClass> {
    let mut classes = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let class = match i.checked_sub(1).map(|prev| &entries[prev]) {
            None => EntryClass::DayBreak,
            Some(previous) => match entry.start_time.cmp(&previous.end_time) {
                Ordering::Greater => EntryClass::Pause,
                Ordering::Less => EntryClass::Overlap,
                Ordering::Equal => EntryClass::Plain,
            },
        };
        classes.push(class);
    }
    classes
}

/// Recomputes the classes of `user`'s entries on `day` and stores those that
/// changed. Returns the number of entries written.
pub fn reclassify_day(conn: &mut SqliteConnection, user: UserId, day: Date) -> QueryResult<usize> {
    let day_entries = entries::find_for_user_day(conn, user, day)?;
    let classes = classify(&day_entries);

    let mut written = 0;
    for (entry, class) in day_entries.iter().zip(classes) {
        if entry.class != class {
            entries::save_class(conn, entry.id, class)?;
            written += 1;
        }
    }
    tracing::debug!(%day, user = %user, entries = day_entries.len(), written, "reclassified day");
    Ok(written)
}
