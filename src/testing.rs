//! In-memory fakes for the store, provider and calendar traits.

use crate::calendar::{CalendarApi, CalendarBackend, Event, NewEvent};
use crate::credentials::{CredentialStore, Credentials, TenantRecord};
use crate::oauth::{OAuthClient, ProviderIdentity};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn credentials(token: &str, expires_in_seconds: i64) -> Credentials {
    Credentials {
        access_token: token.to_string(),
        refresh_token: Some(format!("{}-refresh", token)),
        expires_at: Some(Utc::now() + Duration::seconds(expires_in_seconds)),
        scope: None,
        token_type: Some("Bearer".to_string()),
    }
}

pub fn event(summary: &str, start: &str, end: &str) -> Event {
    Event {
        id: Some(format!("evt-{}", summary.to_lowercase().replace(' ', "-"))),
        summary: Some(summary.to_string()),
        start: crate::calendar::EventTime::at(DateTime::parse_from_rfc3339(start).unwrap()),
        end: crate::calendar::EventTime::at(DateTime::parse_from_rfc3339(end).unwrap()),
        ..Event::default()
    }
}

/// Credential store over a map, counting every call.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<String, (String, Option<String>)>>,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub updates: AtomicUsize,
    pub fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn with(email: &str, credentials: &Credentials) -> Self {
        let store = Self::default();
        store.rows.lock().insert(
            email.to_string(),
            (credentials.to_json().unwrap(), None),
        );
        store
    }

    pub fn stored(&self, email: &str) -> Option<Credentials> {
        self.rows
            .lock()
            .get(email)
            .map(|(blob, _)| Credentials::from_json(blob).unwrap())
    }

    pub fn calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
            + self.puts.load(Ordering::SeqCst)
            + self.updates.load(Ordering::SeqCst)
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, email: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("store unavailable"));
        }
        Ok(self.rows.lock().get(email).map(|(blob, _)| blob.clone()))
    }

    fn put(&self, email: &str, credentials: &str, display_name: Option<&str>) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().insert(
            email.to_string(),
            (credentials.to_string(), display_name.map(str::to_string)),
        );
        Ok(())
    }

    fn update(&self, email: &str, credentials: &str) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        match self.rows.lock().get_mut(email) {
            Some(row) => {
                row.0 = credentials.to_string();
                Ok(())
            }
            None => Err(anyhow!("No stored credentials to update")),
        }
    }

    fn list(&self) -> Result<Vec<TenantRecord>> {
        let now = Utc::now();
        Ok(self
            .rows
            .lock()
            .iter()
            .map(|(email, (_, display_name))| TenantRecord {
                email: email.clone(),
                display_name: display_name.clone(),
                created_at: now,
                updated_at: now,
            })
            .collect())
    }

    fn delete(&self, email: &str) -> Result<bool> {
        Ok(self.rows.lock().remove(email).is_some())
    }
}

/// Provider fake: refresh issues `"<old>-refreshed"` valid for an hour.
#[derive(Default)]
pub struct FakeOAuth {
    pub exchanged: Mutex<Option<Credentials>>,
    pub identity: Mutex<ProviderIdentity>,
    pub refresh_calls: AtomicUsize,
    pub fail_refresh: AtomicBool,
}

impl FakeOAuth {
    pub fn issuing(credentials: Credentials, email: &str, name: Option<&str>) -> Self {
        Self {
            exchanged: Mutex::new(Some(credentials)),
            identity: Mutex::new(ProviderIdentity {
                email: Some(email.to_string()),
                name: name.map(str::to_string),
            }),
            ..Self::default()
        }
    }
}

#[async_trait]
impl OAuthClient for FakeOAuth {
    async fn exchange_code(&self, code: &str) -> Result<Credentials> {
        if code.is_empty() {
            return Err(anyhow!("empty code"));
        }
        self.exchanged
            .lock()
            .clone()
            .ok_or_else(|| anyhow!("invalid_grant"))
    }

    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(anyhow!("invalid_grant"));
        }
        let mut refreshed = credentials.clone();
        refreshed.access_token = format!("{}-refreshed", credentials.access_token);
        refreshed.expires_at = Some(Utc::now() + Duration::hours(1));
        Ok(refreshed)
    }

    async fn fetch_identity(&self, _access_token: &str) -> Result<ProviderIdentity> {
        Ok(self.identity.lock().clone())
    }
}

#[derive(Default)]
struct CalendarState {
    events: Mutex<Vec<Event>>,
    inserted: Mutex<Vec<(String, NewEvent)>>,
    bound_tokens: Mutex<Vec<String>>,
    fail_list: AtomicBool,
    insert_failures: AtomicUsize,
}

/// Calendar backend whose clients share one event list.
#[derive(Clone, Default)]
pub struct FakeCalendar {
    state: Arc<CalendarState>,
}

impl FakeCalendar {
    pub fn with_events(events: Vec<Event>) -> Self {
        let calendar = Self::default();
        *calendar.state.events.lock() = events;
        calendar
    }

    pub fn fail_listing(&self) {
        self.state.fail_list.store(true, Ordering::SeqCst);
    }

    /// The next `count` inserts fail.
    pub fn fail_inserts(&self, count: usize) {
        self.state.insert_failures.store(count, Ordering::SeqCst);
    }

    /// Inserted events with the access token of the client that made them.
    pub fn inserted(&self) -> Vec<(String, NewEvent)> {
        self.state.inserted.lock().clone()
    }

    pub fn bound_tokens(&self) -> Vec<String> {
        self.state.bound_tokens.lock().clone()
    }
}

impl CalendarBackend for FakeCalendar {
    fn client_for(&self, credentials: &Credentials) -> Arc<dyn CalendarApi> {
        self.state
            .bound_tokens
            .lock()
            .push(credentials.access_token.clone());
        Arc::new(FakeCalendarClient {
            calendar: self.clone(),
            token: credentials.access_token.clone(),
        })
    }
}

pub struct FakeCalendarClient {
    calendar: FakeCalendar,
    pub token: String,
}

#[async_trait]
impl CalendarApi for FakeCalendarClient {
    async fn list_events_in_window(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<Event>> {
        let state = &self.calendar.state;
        if state.fail_list.load(Ordering::SeqCst) {
            return Err(anyhow!("Calendar API error: 500 Internal Server Error"));
        }
        let (first_day, last_day) = (start.date_naive(), end.date_naive());
        let (start, end) = (start.with_timezone(&Utc), end.with_timezone(&Utc));
        let mut events: Vec<Event> = state
            .events
            .lock()
            .iter()
            .filter(|event| match (event.start.date, event.end.date) {
                // Provider matches all-day events on the caller's local dates
                (Some(from), Some(until)) if event.is_all_day() => from <= last_day && until > first_day,
                _ => event.overlaps(start, end),
            })
            .cloned()
            .collect();
        events.sort_by_key(|event| event.start.instant());
        Ok(events)
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<Event> {
        let state = &self.calendar.state;
        let pending_failures = state.insert_failures.load(Ordering::SeqCst);
        if pending_failures > 0 {
            state
                .insert_failures
                .store(pending_failures - 1, Ordering::SeqCst);
            return Err(anyhow!("Calendar API error: 503 Service Unavailable"));
        }

        let mut inserted = state.inserted.lock();
        inserted.push((self.token.clone(), event.clone()));
        let id = format!("created-{}", inserted.len());
        Ok(Event {
            html_link: Some(format!("https://calendar.example.com/event?eid={}", id)),
            id: Some(id),
            summary: Some(event.summary.clone()),
            description: event.description.clone(),
            start: crate::calendar::EventTime::at(event.start),
            end: crate::calendar::EventTime::at(event.end),
            ..Event::default()
        })
    }

    async fn list_upcoming(&self, limit: u32) -> Result<Vec<Event>> {
        let state = &self.calendar.state;
        if state.fail_list.load(Ordering::SeqCst) {
            return Err(anyhow!("Calendar API error: 500 Internal Server Error"));
        }
        let mut events = state.events.lock().clone();
        events.sort_by_key(|event| event.start.instant());
        events.truncate(limit as usize);
        Ok(events)
    }
}

/// Scheduler over the fakes, with an optional default-calendar token.
pub fn scheduler(
    store: MemoryStore,
    default_token: Option<&str>,
    calendar: FakeCalendar,
) -> (crate::tools::Scheduler, Arc<crate::bookings::BookingLog>) {
    let oauth = Arc::new(FakeOAuth::default());
    let backend = Arc::new(calendar);
    let tenants = crate::tenant::TenantCredentials::new(Arc::new(store), oauth.clone(), backend.clone());
    let holder = crate::default_client::DefaultCredentialHolder::new(
        default_token.map(|token| credentials(token, 3600)),
        oauth,
        backend,
    );
    let bookings = Arc::new(crate::bookings::BookingLog::new(":memory:").unwrap());
    let scheduler = crate::tools::Scheduler::new(
        crate::resolver::ClientResolver::new(Arc::new(tenants), Arc::new(holder)),
        bookings.clone(),
        crate::config::SchedulingConfig::default(),
    );
    (scheduler, bookings)
}
