//! Daily reading reminder. The host shell owns the OS scheduling; this module
//! decides whether a reminder is due, when it fires and what it says.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::settings::UserSettings;

/// Stable identifier so rescheduling replaces the pending request.
pub const REMINDER_ID: &str = "daily_noon_reminder";
const REMINDER_TITLE: &str = "Reading time";

const MESSAGES: [&str; 5] = [
    "Time to read a few pages 📖",
    "Tiny steps, big progress: open your book!",
    "12 minutes for 12 o'clock? Let's read.",
    "Turn one page. Then another.",
    "Your future self will thank you. Read today.",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingReminder {
    pub id: &'static str,
    pub title: &'static str,
    pub body: &'static str,
    /// Local wall-clock time of the next delivery; repeats daily at the same time.
    pub fire_at: NaiveDateTime,
}

fn reminder_time() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Next noon strictly after `now`.
pub fn next_fire(now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(reminder_time());
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// One message per calendar day, cycling through the list.
pub fn message_for(day: NaiveDate) -> &'static str {
    let index = day.num_days_from_ce().rem_euclid(MESSAGES.len() as i32) as usize;
    MESSAGES[index]
}

/// The reminder to schedule, or `None` when reminders are switched off.
pub fn plan(settings: &UserSettings, now: NaiveDateTime) -> Option<ReadingReminder> {
    if !settings.notifications_enabled {
        return None;
    }

    let fire_at = next_fire(now);
    Some(ReadingReminder {
        id: REMINDER_ID,
        title: REMINDER_TITLE,
        body: message_for(fire_at.date()),
        fire_at,
    })
}
