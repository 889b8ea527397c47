//! Spoken date and time parsing.
//!
//! Callers say things like "tomorrow", "next Friday", "October 20th" and
//! "3:30 pm". Dates resolve against today in the target timezone and never
//! land in the past; times are parsed separately and combined into a
//! timezone-aware instant.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use std::fmt;


const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

/// Words that carry no date information.
const FILLER: [&str; 6] = ["on", "the", "of", "this", "coming", "at"];

#[derive(Debug, Clone, PartialEq)]
pub enum DateTimeError {
    /// Time of day could not be understood
    Time(String),
    /// A month and day were recognized but do not form a real date
    Date(String),
    UnknownTimezone(String),
}

impl fmt::Display for DateTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateTimeError::Time(raw) => write!(f, "Could not parse time '{}'", raw),
            DateTimeError::Date(raw) => write!(f, "Not a valid date '{}'", raw),
            DateTimeError::UnknownTimezone(raw) => write!(f, "Unknown timezone '{}'", raw),
        }
    }
}

impl std::error::Error for DateTimeError {}

pub fn resolve_timezone(name: &str) -> Result<Tz, DateTimeError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| DateTimeError::UnknownTimezone(name.to_string()))
}

/// Parse a spoken date and time into an instant in `timezone`, relative to now.
pub fn parse_datetime(date: &str, time: &str, timezone: &str) -> Result<DateTime<Tz>, DateTimeError> {
    parse_datetime_at(date, time, timezone, Utc::now())
}

/// [`parse_datetime`] with an explicit reference instant.
pub fn parse_datetime_at(
    date: &str,
    time: &str,
    timezone: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Tz>, DateTimeError> {
    let tz = resolve_timezone(timezone)?;
    let today = now.with_timezone(&tz).date_naive();
    let day = parse_date(date, today)?;
    let clock = parse_time(time)?;
    Ok(localize(&tz, day.and_time(clock)))
}

/// Resolve a spoken date against `today`. Unrecognized text means today.
pub fn parse_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, DateTimeError> {
    let lower = raw.trim().to_lowercase();

    match lower.as_str() {
        "" | "today" | "tonight" => return Ok(today),
        "tomorrow" => return Ok(today + Duration::days(1)),
        "day after tomorrow" | "the day after tomorrow" => return Ok(today + Duration::days(2)),
        _ => {}
    }

    if let Ok(date) = NaiveDate::parse_from_str(&lower, "%Y-%m-%d") {
        return Ok(not_in_past(date, true, today));
    }
    if let Some(date) = parse_numeric_date(&lower, today) {
        return date.ok_or_else(|| DateTimeError::Date(raw.to_string()));
    }

    let tokens: Vec<String> = lower
        .replace([',', '.'], " ")
        .split_whitespace()
        .filter(|token| !FILLER.contains(token))
        .map(strip_ordinal)
        .collect();

    let month = tokens.iter().find_map(|token| month_number(token));
    let year = tokens
        .iter()
        .filter(|token| token.len() == 4)
        .find_map(|token| token.parse::<i32>().ok());
    let day = tokens
        .iter()
        .filter(|token| token.len() <= 2)
        .find_map(|token| token.parse::<u32>().ok());

    if let (Some(month), Some(day)) = (month, day) {
        let explicit_year = year.is_some();
        return NaiveDate::from_ymd_opt(year.unwrap_or(today.year()), month, day)
            .map(|date| not_in_past(date, explicit_year, today))
            .ok_or_else(|| DateTimeError::Date(raw.to_string()));
    }

    if let Some(weekday) = tokens.iter().find_map(|token| weekday_from(token)) {
        let strictly_after = tokens.iter().any(|token| token == "next");
        return Ok(next_weekday(today, weekday, strictly_after));
    }

    tracing::debug!(date = %raw, "Unrecognized date, using today");
    Ok(today)
}

/// Parse a spoken time of day: "3pm", "3:30 PM", "15:00", "noon".
pub fn parse_time(raw: &str) -> Result<NaiveTime, DateTimeError> {
    let err = || DateTimeError::Time(raw.to_string());

    let mut compact: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect();
    if let Some(rest) = compact.strip_prefix("at") {
        compact = rest.to_string();
    }
    if let Some(rest) = compact.strip_suffix("o'clock") {
        compact = rest.to_string();
    }

    match compact.as_str() {
        "noon" | "midday" | "12noon" => return NaiveTime::from_hms_opt(12, 0, 0).ok_or_else(err),
        "midnight" => return NaiveTime::from_hms_opt(0, 0, 0).ok_or_else(err),
        _ => {}
    }

    let (clock, meridiem) = if let Some(clock) = compact.strip_suffix("am").or_else(|| compact.strip_suffix('a')) {
        (clock, Some(false))
    } else if let Some(clock) = compact.strip_suffix("pm").or_else(|| compact.strip_suffix('p')) {
        (clock, Some(true))
    } else {
        (compact.as_str(), None)
    };
    if !clock.is_ascii() {
        return Err(err());
    }

    let (hour, minute) = match clock.split_once(':') {
        Some((hour, minute)) if minute.len() == 2 => (hour.parse::<u32>(), minute.parse::<u32>()),
        Some(_) => return Err(err()),
        None if clock.len() >= 3 && clock.len() <= 4 => {
            let (hour, minute) = clock.split_at(clock.len() - 2);
            (hour.parse::<u32>(), minute.parse::<u32>())
        }
        None => (clock.parse::<u32>(), Ok(0)),
    };
    let (hour, minute) = match (hour, minute) {
        (Ok(hour), Ok(minute)) => (hour, minute),
        _ => return Err(err()),
    };

    let hour = match meridiem {
        Some(_) if !(1..=12).contains(&hour) => return Err(err()),
        Some(false) => hour % 12,
        Some(true) => hour % 12 + 12,
        None => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(err)
}

/// Pin a wall-clock time to `tz`. Ambiguous times take the earlier instant;
/// times skipped by a DST jump move forward an hour.
pub fn localize(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive).earliest() {
        Some(instant) => instant,
        None => {
            let shifted = naive + Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .unwrap_or_else(|| tz.from_utc_datetime(&naive))
        }
    }
}

/// "Tuesday, October 20 at 3:00 PM"
pub fn spoken_datetime<T: TimeZone>(instant: &DateTime<T>) -> String
where
    T::Offset: fmt::Display,
{
    instant.format("%A, %B %-d at %-I:%M %p").to_string()
}

/// "Tuesday, October 20"
pub fn spoken_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d").to_string()
}

/// "3:00 PM"
pub fn spoken_time<T: TimeZone>(instant: &DateTime<T>) -> String
where
    T::Offset: fmt::Display,
{
    instant.format("%-I:%M %p").to_string()
}

/// Dates without an explicit year roll to next year once passed. Explicit
/// past years are moved to this year, then next year.
fn not_in_past(date: NaiveDate, explicit_year: bool, today: NaiveDate) -> NaiveDate {
    if date >= today {
        return date;
    }
    let this_year = if explicit_year {
        date.with_year(today.year()).filter(|candidate| *candidate >= today)
    } else {
        None
    };
    this_year
        .or_else(|| date.with_year(today.year() + 1))
        .unwrap_or(date)
}

/// "10/20", "10/20/2026", "10/20/26". Returns `Some(None)` for a numeric
/// date that names no real day.
fn parse_numeric_date(lower: &str, today: NaiveDate) -> Option<Option<NaiveDate>> {
    let parts: Vec<&str> = lower.split('/').collect();
    if !(2..=3).contains(&parts.len()) || parts.iter().any(|part| part.parse::<u32>().is_err()) {
        return None;
    }
    let month = parts[0].parse::<u32>().ok()?;
    let day = parts[1].parse::<u32>().ok()?;
    let year = match parts.get(2) {
        Some(year) if year.len() == 2 => Some(2000 + year.parse::<i32>().ok()?),
        Some(year) => Some(year.parse::<i32>().ok()?),
        None => None,
    };

    Some(
        NaiveDate::from_ymd_opt(year.unwrap_or(today.year()), month, day)
            .map(|date| not_in_past(date, year.is_some(), today)),
    )
}

fn strip_ordinal(token: &str) -> String {
    for suffix in ["st", "nd", "rd", "th"] {
        if let Some(number) = token.strip_suffix(suffix) {
            if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
                return number.to_string();
            }
        }
    }
    token.to_string()
}

fn month_number(token: &str) -> Option<u32> {
    if token.len() < 3 {
        return None;
    }
    let token = if token == "sept" { "sep" } else { token };
    MONTHS
        .iter()
        .position(|month| month.starts_with(token))
        .map(|index| index as u32 + 1)
}

fn weekday_from(token: &str) -> Option<Weekday> {
    match token {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thur" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn next_weekday(today: NaiveDate, weekday: Weekday, strictly_after: bool) -> NaiveDate {
    let ahead = (weekday.num_days_from_monday() + 7 - today.weekday().num_days_from_monday()) % 7;
    let ahead = if ahead == 0 && strictly_after { 7 } else { ahead };
    today + Duration::days(ahead as i64)
}
