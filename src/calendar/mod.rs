//! Calendar provider interface.
//!
//! [`CalendarApi`] is the narrow surface the scheduler needs from a calendar:
//! list events in a window, insert one event, list upcoming events. A
//! [`CalendarBackend`] binds a client to one tenant's credential.

use crate::credentials::Credentials;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod google;

pub use google::{GoogleCalendar, GoogleCalendarClient};

/// Start or end of an event: a timed instant or an all-day date.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn at(instant: DateTime<FixedOffset>) -> Self {
        Self {
            date_time: Some(instant),
            date: None,
            time_zone: None,
        }
    }

    /// The instant this time denotes; all-day dates resolve to UTC midnight.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match (self.date_time, self.date) {
            (Some(date_time), _) => Some(date_time.with_timezone(&Utc)),
            (None, Some(date)) => date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc()),
            (None, None) => None,
        }
    }
}

/// A calendar event as returned by the provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
    #[serde(rename = "htmlLink", default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}

impl Event {
    /// True for date-only (all-day) events.
    pub fn is_all_day(&self) -> bool {
        self.start.date_time.is_none() && self.start.date.is_some()
    }

    /// Summary suitable for speech, falling back to a generic phrase.
    pub fn spoken_title(&self) -> &str {
        self.summary
            .as_deref()
            .map(str::trim)
            .filter(|summary| !summary.is_empty())
            .unwrap_or("another event")
    }

    /// Whether the event occupies any part of `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        match (self.start.instant(), self.end.instant()) {
            (Some(event_start), Some(event_end)) => event_start < end && event_end > start,
            _ => false,
        }
    }
}

/// Request to create one event. Start and end carry explicit offsets.
#[derive(Clone, Debug, PartialEq)]
pub struct NewEvent {
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    /// IANA zone name recorded on the event
    pub timezone: String,
}

/// Calendar operations for one bound credential.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Events overlapping `[start, end)`, recurring events expanded to
    /// single instances, ordered by start time.
    async fn list_events_in_window(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<Event>>;

    /// Create exactly one event; the result carries the provider id and link.
    async fn insert_event(&self, event: &NewEvent) -> Result<Event>;

    /// Events from now onward, ordered by start time, at most `limit`.
    async fn list_upcoming(&self, limit: u32) -> Result<Vec<Event>>;
}

/// Builds calendar clients bound to a credential.
pub trait CalendarBackend: Send + Sync {
    fn client_for(&self, credentials: &Credentials) -> Arc<dyn CalendarApi>;
}
