//! Voice-agent tools: scheduling, availability, open slots, upcoming events.
//!
//! Every tool answers with a sentence for the agent to speak. Failures never
//! surface as transport errors; each stage short-circuits to a message.
//!
//! ```text
//! validate args → resolve client → parse date/time → check conflicts
//!     → create event (one retry) → log booking → respond
//! ```

use crate::bookings::{BookingLog, NewBooking};
use crate::calendar::{CalendarApi, Event, NewEvent};
use crate::config::SchedulingConfig;
use crate::datetime::{self, DateTimeError};
use crate::identity::{redact_email, TenantIdentity};
use crate::resolver::ClientResolver;
use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

mod slots;
pub mod vapi;


pub use slots::{find_open_slots, spoken_list, DayPeriod, SlotSearch};
pub use vapi::{extract_tool_call, ToolCall, ToolResponse};

pub const MIN_DURATION_MINUTES: u32 = 5;
pub const MAX_DURATION_MINUTES: u32 = 480;
pub const DEFAULT_UPCOMING_LIMIT: u32 = 5;
pub const MAX_UPCOMING_LIMIT: u32 = 10;

const CREATE_ATTEMPTS: usize = 2;

const MSG_UNPARSEABLE_REQUEST: &str = "I couldn't understand that request. Could you try again?";
const MSG_UNPARSEABLE_BOOKING: &str =
    "I couldn't understand the scheduling details. Could you repeat that?";
const MSG_UNPARSEABLE_QUERY: &str = "I couldn't understand that. Could you try again?";
const MSG_NOT_CONNECTED: &str =
    "I'm sorry, the calendar isn't connected yet. Please ask the administrator to set it up.";
const MSG_UNKNOWN_CALENDAR: &str =
    "I'm sorry, I couldn't access that calendar. Please make sure it's connected and try again.";
const MSG_BAD_DATETIME_BOOKING: &str =
    "I couldn't quite understand that date or time. Could you say it once more?";
const MSG_BAD_DATETIME_QUERY: &str =
    "I couldn't understand that date or time. Could you try again?";
const MSG_CREATE_FAILED: &str = "I'm having a small technical hiccup with the calendar. Could we try a different time, or would you like me to try again?";
const MSG_AVAILABILITY_FAILED: &str = "I'm having trouble checking the calendar right now. Could you give me the time and I'll try to book it directly?";
const MSG_SLOTS_FAILED: &str = "I'm having trouble checking the schedule. Could you suggest a specific time and I'll see if it works?";
const MSG_UPCOMING_FAILED: &str =
    "I'm having trouble reading the calendar right now. Could you try again in a moment?";
const MSG_NO_UPCOMING: &str = "You don't have any upcoming events on the calendar.";

/// Which tool a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    ScheduleEvent,
    CheckAvailability,
    AvailableSlots,
    UpcomingEvents,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleEventArgs {
    pub name: String,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckAvailabilityArgs {
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailableSlotsArgs {
    #[serde(default = "default_slots_date")]
    pub date: String,
    #[serde(default)]
    pub preferred_period: DayPeriod,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

fn default_slots_date() -> String {
    "tomorrow".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpcomingEventsArgs {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub user_email: Option<String>,
}

/// Result of one booking attempt, before it is phrased for a caller.
#[derive(Debug, Clone)]
pub enum BookingOutcome {
    /// No calendar client for the requested identity (or the default slot)
    NotConnected { identity: Option<String> },
    InvalidDateTime(DateTimeError),
    Conflict(Vec<Event>),
    Created {
        event: Event,
        title: String,
        start: DateTime<Tz>,
    },
    /// Every create attempt failed
    Failed,
}

/// Runs tool requests against the resolved calendar.
#[derive(Clone)]
pub struct Scheduler {
    resolver: ClientResolver,
    bookings: Arc<BookingLog>,
    settings: SchedulingConfig,
}

impl Scheduler {
    pub fn new(resolver: ClientResolver, bookings: Arc<BookingLog>, settings: SchedulingConfig) -> Self {
        Self {
            resolver,
            bookings,
            settings,
        }
    }

    pub fn resolver(&self) -> &ClientResolver {
        &self.resolver
    }

    pub fn settings(&self) -> &SchedulingConfig {
        &self.settings
    }

    /// Handle a raw tool request body and build the platform response.
    pub async fn handle(&self, tool: Tool, body: &Value) -> ToolResponse {
        let Some(call) = extract_tool_call(body) else {
            warn!(?tool, "Tool request carried no tool call");
            return ToolResponse::new("", MSG_UNPARSEABLE_REQUEST);
        };

        let result = match tool {
            Tool::ScheduleEvent => self.schedule_event(&call.arguments).await,
            Tool::CheckAvailability => self.check_availability(&call.arguments).await,
            Tool::AvailableSlots => self.available_slots(&call.arguments).await,
            Tool::UpcomingEvents => self.upcoming_events(&call.arguments).await,
        };
        ToolResponse::new(call.id, result)
    }

    pub async fn schedule_event(&self, arguments: &Value) -> String {
        let args = match parse_args::<ScheduleEventArgs>(arguments) {
            Some(args) if !args.name.trim().is_empty() => args,
            _ => return MSG_UNPARSEABLE_BOOKING.to_string(),
        };
        let Some(duration) = self.duration(args.duration_minutes) else {
            return MSG_UNPARSEABLE_BOOKING.to_string();
        };

        match self.book(&args, duration).await {
            BookingOutcome::NotConnected { identity } => not_connected(identity.as_deref()),
            BookingOutcome::InvalidDateTime(_) => MSG_BAD_DATETIME_BOOKING.to_string(),
            BookingOutcome::Conflict(conflicts) => format!(
                "There's a conflict: you already have '{}' at that time. Would you like to pick a different time?",
                conflicts[0].spoken_title()
            ),
            BookingOutcome::Created { title, start, .. } => format!(
                "Done! '{}' is confirmed for {}. It's on your Google Calendar. Is there anything else I can help with?",
                title,
                datetime::spoken_datetime(&start)
            ),
            BookingOutcome::Failed => MSG_CREATE_FAILED.to_string(),
        }
    }

    /// Book an event: resolve the calendar, parse the time, check for
    /// conflicts, create with one retry, log. Shared by the voice tool and
    /// the direct HTTP endpoint.
    pub async fn book(&self, args: &ScheduleEventArgs, duration_minutes: u32) -> BookingOutcome {
        let identity = args.user_email.as_deref();
        let Some(client) = self.resolver.resolve(identity).await else {
            return BookingOutcome::NotConnected {
                identity: identity.filter(|i| !i.is_empty()).map(str::to_string),
            };
        };

        let timezone = self.timezone(args.timezone.as_deref());
        let start = match datetime::parse_datetime(&args.date, &args.time, &timezone) {
            Ok(start) => start,
            Err(e) => {
                info!(date = %args.date, time = %args.time, error = %e, "Could not parse booking time");
                return BookingOutcome::InvalidDateTime(e);
            }
        };
        let end = start + Duration::minutes(duration_minutes as i64);

        match find_conflicts(client.as_ref(), start.fixed_offset(), end.fixed_offset()).await {
            Ok(conflicts) if !conflicts.is_empty() => return BookingOutcome::Conflict(conflicts),
            Ok(_) => {}
            // Fail open: a broken availability check should not block booking.
            Err(e) => warn!(error = %e, "Conflict check failed, booking anyway"),
        }

        let title = args
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Meeting with {}", args.name.trim()));
        let request = NewEvent {
            summary: title.clone(),
            description: Some(format!(
                "Scheduled by {} via {} Voice Agent",
                args.name.trim(),
                self.settings.agent_name
            )),
            start: start.fixed_offset(),
            end: end.fixed_offset(),
            timezone: timezone.clone(),
        };

        let Some(event) = create_with_retry(client.as_ref(), &request).await else {
            return BookingOutcome::Failed;
        };

        let tenant_email = identity
            .filter(|i| !i.is_empty())
            .and_then(|i| TenantIdentity::parse(i).ok())
            .map(|i| i.as_str().to_string());
        let tenant = tenant_email
            .as_deref()
            .map(redact_email)
            .unwrap_or_else(|| "default".to_string());
        info!(tenant = %tenant, event_id = ?event.id, "Booked event");

        self.log_booking(NewBooking {
            caller_name: args.name.trim().to_string(),
            meeting_title: title.clone(),
            scheduled_date: start.format("%Y-%m-%d").to_string(),
            scheduled_time: start.format("%I:%M %p").to_string(),
            duration_minutes,
            timezone,
            google_event_id: event.id.clone(),
            google_event_link: event.html_link.clone(),
            tenant_email,
        })
        .await;

        BookingOutcome::Created { event, title, start }
    }

    pub async fn check_availability(&self, arguments: &Value) -> String {
        let Some(args) = parse_args::<CheckAvailabilityArgs>(arguments) else {
            return MSG_UNPARSEABLE_QUERY.to_string();
        };
        let Some(duration) = self.duration(args.duration_minutes) else {
            return MSG_UNPARSEABLE_QUERY.to_string();
        };
        let Some(client) = self.resolver.resolve(args.user_email.as_deref()).await else {
            return not_connected(args.user_email.as_deref());
        };

        let timezone = self.timezone(args.timezone.as_deref());
        let start = match datetime::parse_datetime(&args.date, &args.time, &timezone) {
            Ok(start) => start,
            Err(_) => return MSG_BAD_DATETIME_QUERY.to_string(),
        };
        let end = start + Duration::minutes(duration as i64);

        match find_conflicts(client.as_ref(), start.fixed_offset(), end.fixed_offset()).await {
            Ok(conflicts) if conflicts.is_empty() => format!(
                "{} is available! Shall I go ahead and book it?",
                datetime::spoken_datetime(&start)
            ),
            Ok(conflicts) => format!(
                "That slot isn't available, there's '{}' at that time. Would you like to try a different time, or should I check what's open?",
                conflicts[0].spoken_title()
            ),
            Err(e) => {
                error!(error = %e, "Availability check failed");
                MSG_AVAILABILITY_FAILED.to_string()
            }
        }
    }

    pub async fn available_slots(&self, arguments: &Value) -> String {
        let Some(args) = parse_args::<AvailableSlotsArgs>(arguments) else {
            return MSG_UNPARSEABLE_QUERY.to_string();
        };
        let Some(client) = self.resolver.resolve(args.user_email.as_deref()).await else {
            return not_connected(args.user_email.as_deref());
        };

        let timezone = self.timezone(args.timezone.as_deref());
        let tz = match datetime::resolve_timezone(&timezone) {
            Ok(tz) => tz,
            Err(_) => return MSG_BAD_DATETIME_QUERY.to_string(),
        };
        let today = Utc::now().with_timezone(&tz).date_naive();
        let day = match datetime::parse_date(&args.date, today) {
            Ok(day) => day,
            Err(_) => return MSG_BAD_DATETIME_QUERY.to_string(),
        };

        let (start_hour, end_hour) = args.preferred_period.hours();
        let hour = |h: u32| NaiveTime::from_hms_opt(h, 0, 0).unwrap_or_default();
        let search_start = datetime::localize(&tz, day.and_time(hour(start_hour)));
        let search_end = datetime::localize(&tz, day.and_time(hour(end_hour)));

        let events = match client
            .list_events_in_window(search_start.fixed_offset(), search_end.fixed_offset())
            .await
        {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "Slot search failed");
                return MSG_SLOTS_FAILED.to_string();
            }
        };

        let spoken_day = datetime::spoken_date(day);
        match find_open_slots(&events, search_start, search_end) {
            SlotSearch::AllDay => format!(
                "It looks like you have an all-day event on {}. Would you like to try a different day?",
                spoken_day
            ),
            SlotSearch::Open(slots) if slots.is_empty() => format!(
                "It looks like {} is pretty packed. Would you like to try a different day?",
                spoken_day
            ),
            SlotSearch::Open(slots) => {
                let times: Vec<String> = slots.iter().map(datetime::spoken_time).collect();
                format!(
                    "On {}, I have these slots open: {}. Which works best for you?",
                    spoken_day,
                    spoken_list(&times)
                )
            }
        }
    }

    pub async fn upcoming_events(&self, arguments: &Value) -> String {
        let args = if arguments.is_null() {
            UpcomingEventsArgs::default()
        } else {
            match parse_args::<UpcomingEventsArgs>(arguments) {
                Some(args) => args,
                None => return MSG_UNPARSEABLE_QUERY.to_string(),
            }
        };
        let limit = args
            .limit
            .unwrap_or(DEFAULT_UPCOMING_LIMIT)
            .clamp(1, MAX_UPCOMING_LIMIT);

        let Some(client) = self.resolver.resolve(args.user_email.as_deref()).await else {
            return not_connected(args.user_email.as_deref());
        };

        let events = match client.list_upcoming(limit).await {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "Listing upcoming events failed");
                return MSG_UPCOMING_FAILED.to_string();
            }
        };
        if events.is_empty() {
            return MSG_NO_UPCOMING.to_string();
        }

        let items: Vec<String> = events.iter().map(describe_event).collect();
        format!("Here's what's coming up: {}.", items.join("; "))
    }

    /// Requested duration, or the default, when within the allowed range.
    pub fn duration(&self, requested: Option<u32>) -> Option<u32> {
        let minutes = requested.unwrap_or(self.settings.default_duration_minutes);
        (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES)
            .contains(&minutes)
            .then_some(minutes)
    }

    fn timezone(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|tz| !tz.is_empty())
            .unwrap_or(&self.settings.default_timezone)
            .to_string()
    }

    async fn log_booking(&self, booking: NewBooking) {
        let log = Arc::clone(&self.bookings);
        let logged = tokio::task::spawn_blocking(move || log.log_booking(&booking)).await;
        match logged {
            Ok(Ok(id)) => info!(booking_id = id, "Logged booking"),
            Ok(Err(e)) => error!(error = %e, "Failed to log booking"),
            Err(e) => error!(error = %e, "Booking log task failed"),
        }
    }
}

/// Events overlapping `[start, end)`, excluding cancelled ones. All-day
/// events the provider returns for the window always count.
pub async fn find_conflicts(
    client: &dyn CalendarApi,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Result<Vec<Event>> {
    let (window_start, window_end) = (start.with_timezone(&Utc), end.with_timezone(&Utc));
    let events = client.list_events_in_window(start, end).await?;
    Ok(events
        .into_iter()
        .filter(|event| event.status.as_deref() != Some("cancelled"))
        .filter(|event| event.is_all_day() || event.overlaps(window_start, window_end))
        .collect())
}

async fn create_with_retry(client: &dyn CalendarApi, request: &NewEvent) -> Option<Event> {
    for attempt in 1..=CREATE_ATTEMPTS {
        match client.insert_event(request).await {
            Ok(event) => return Some(event),
            Err(e) => warn!(attempt, error = %e, "Event creation failed"),
        }
    }
    None
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: &Value) -> Option<T> {
    match serde_json::from_value::<T>(arguments.clone()) {
        Ok(args) => Some(args),
        Err(e) => {
            info!(error = %e, "Rejected tool arguments");
            None
        }
    }
}

/// The request named no tenant and there is no default calendar, or the
/// named tenant has no usable credential.
fn not_connected(identity: Option<&str>) -> String {
    match identity.filter(|raw| !raw.is_empty()).map(TenantIdentity::parse) {
        None => MSG_NOT_CONNECTED.to_string(),
        Some(Ok(identity)) => format!(
            "I'm sorry, I couldn't access the calendar for {}. Please make sure it's connected and try again.",
            identity
        ),
        Some(Err(_)) => MSG_UNKNOWN_CALENDAR.to_string(),
    }
}

fn describe_event(event: &Event) -> String {
    match (event.start.date_time, event.start.date) {
        (Some(start), _) => format!("'{}' on {}", event.spoken_title(), datetime::spoken_datetime(&start)),
        (None, Some(day)) => format!("'{}' on {} (all day)", event.spoken_title(), datetime::spoken_date(day)),
        (None, None) => format!("'{}'", event.spoken_title()),
    }
}
