//! Open-slot search within a day part.

use crate::calendar::Event;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;

/// Length of an offered slot.
pub const SLOT_MINUTES: i64 = 30;

/// Spacing between the starts of consecutive offered slots.
pub const SLOT_SPACING_MINUTES: i64 = 60;

pub const MAX_SLOTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Evening,
    #[default]
    Any,
}

impl DayPeriod {
    /// Search window as `[start_hour, end_hour)` local time.
    pub fn hours(self) -> (u32, u32) {
        match self {
            DayPeriod::Morning => (9, 12),
            DayPeriod::Afternoon => (12, 17),
            DayPeriod::Evening => (17, 20),
            DayPeriod::Any => (9, 18),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotSearch<Tz: TimeZone> {
    /// An all-day event blocks the day
    AllDay,
    /// Open slot starts, possibly empty
    Open(Vec<DateTime<Tz>>),
}

/// Walk `[start, end)` offering free slots. A busy period pushes the search
/// to its end; a taken slot moves the search on by the slot spacing.
pub fn find_open_slots<Tz: TimeZone>(
    events: &[Event],
    start: DateTime<Tz>,
    end: DateTime<Tz>,
) -> SlotSearch<Tz> {
    let mut busy: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    for event in events {
        if event.status.as_deref() == Some("cancelled") {
            continue;
        }
        if event.is_all_day() {
            return SlotSearch::AllDay;
        }
        if let (Some(busy_start), Some(busy_end)) = (event.start.instant(), event.end.instant()) {
            busy.push((busy_start, busy_end));
        }
    }

    let tz = start.timezone();
    let end = end.with_timezone(&Utc);
    let mut current = start.with_timezone(&Utc);
    let mut open = Vec::new();

    while current + Duration::minutes(SLOT_MINUTES) <= end && open.len() < MAX_SLOTS {
        let slot_end = current + Duration::minutes(SLOT_MINUTES);
        let blocking = busy
            .iter()
            .filter(|(busy_start, busy_end)| current < *busy_end && slot_end > *busy_start)
            .map(|(_, busy_end)| *busy_end)
            .max();

        match blocking {
            Some(busy_end) => current = busy_end,
            None => {
                open.push(current.with_timezone(&tz));
                current += Duration::minutes(SLOT_SPACING_MINUTES);
            }
        }
    }

    SlotSearch::Open(open)
}

/// "a", "a or b", "a, b, or c"
pub fn spoken_list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{} or {}", first, second),
        [rest @ .., last] => format!("{}, or {}", rest.join(", "), last),
    }
}
