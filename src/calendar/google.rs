//! Google Calendar REST adapter.

use super::{CalendarApi, CalendarBackend, Event, NewEvent};
use crate::credentials::Credentials;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on pages followed for one window query.
const MAX_PAGES: usize = 10;

/// Minutes before the event at which the popup reminder fires.
const REMINDER_MINUTES: u32 = 10;

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    items: Vec<Event>,
    #[serde(rename = "nextPageToken", default)]
    next_page_token: Option<String>,
}

/// Shared HTTP client and endpoint settings; hands out per-credential clients.
#[derive(Clone)]
pub struct GoogleCalendar {
    http: Client,
    api_base: String,
    calendar_id: String,
}

impl GoogleCalendar {
    pub fn new(api_base: &str, calendar_id: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("aria-scheduler/0.1")
            .build()
            .context("Failed to build calendar HTTP client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            calendar_id: calendar_id.to_string(),
        })
    }

    /// Client bound to a bare access token.
    pub fn bind(&self, access_token: &str) -> GoogleCalendarClient {
        GoogleCalendarClient {
            http: self.http.clone(),
            events_url: format!(
                "{}/calendars/{}/events",
                self.api_base,
                urlencoding::encode(&self.calendar_id)
            ),
            access_token: access_token.to_string(),
        }
    }
}

impl CalendarBackend for GoogleCalendar {
    fn client_for(&self, credentials: &Credentials) -> Arc<dyn CalendarApi> {
        Arc::new(self.bind(&credentials.access_token))
    }
}

/// HTTP client for one calendar, authenticated with a bearer token.
pub struct GoogleCalendarClient {
    http: Client,
    events_url: String,
    access_token: String,
}

impl GoogleCalendarClient {
    async fn list(&self, mut query: Vec<(&'static str, String)>, max_pages: usize) -> Result<Vec<Event>> {
        query.push(("singleEvents", "true".to_string()));
        query.push(("orderBy", "startTime".to_string()));

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..max_pages {
            let mut request = self
                .http
                .get(&self.events_url)
                .bearer_auth(&self.access_token)
                .query(&query);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request
                .send()
                .await
                .context("Failed to send list events request")?;
            check_response_status(&response)?;
            let page: EventsPage = response
                .json()
                .await
                .context("Failed to parse events response")?;

            events.extend(page.items);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(events)
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn list_events_in_window(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<Event>> {
        let query = vec![
            ("timeMin", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("timeMax", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ];
        self.list(query, MAX_PAGES).await
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<Event> {
        let mut body = json!({
            "summary": event.summary,
            "start": {
                "dateTime": event.start.to_rfc3339_opts(SecondsFormat::Secs, true),
                "timeZone": event.timezone,
            },
            "end": {
                "dateTime": event.end.to_rfc3339_opts(SecondsFormat::Secs, true),
                "timeZone": event.timezone,
            },
            "reminders": {
                "useDefault": false,
                "overrides": [{"method": "popup", "minutes": REMINDER_MINUTES}],
            },
        });
        if let Some(description) = &event.description {
            body["description"] = json!(description);
        }

        let response = self
            .http
            .post(&self.events_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("Failed to send insert event request")?;
        check_response_status(&response)?;

        let created: Event = response
            .json()
            .await
            .context("Failed to parse created event")?;
        if created.id.is_none() {
            return Err(anyhow!("Calendar returned an event without an id"));
        }
        Ok(created)
    }

    async fn list_upcoming(&self, limit: u32) -> Result<Vec<Event>> {
        let query = vec![
            ("timeMin", Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("maxResults", limit.to_string()),
        ];
        let mut events = self.list(query, 1).await?;
        events.truncate(limit as usize);
        Ok(events)
    }
}

/// Map provider error statuses to descriptive errors.
///
/// - 401 → auth error (token expired or revoked)
/// - 403 → permission or quota error
/// - Other non-2xx → generic API error
fn check_response_status(response: &reqwest::Response) -> Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!(
            "Calendar auth error: token expired or invalid"
        )),
        StatusCode::FORBIDDEN => Err(anyhow!(
            "Calendar access forbidden (missing scope or quota exceeded)"
        )),
        s if !s.is_success() => Err(anyhow!("Calendar API error: {}", s)),
        _ => Ok(()),
    }
}
