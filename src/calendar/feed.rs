//! Feed retrieval: conditional HTTP GET plus ICS parsing.
//!
//! The fetcher remembers the `Last-Modified` stamp from the previous
//! successful download and replays it as `If-Modified-Since`, so an
//! unchanged feed costs one 304 round trip and no parse work.

use super::CalendarEvent;
use crate::config::CalendarConfig;
use crate::error::{Result, StatusError};
use chrono::{DateTime, Duration, TimeZone, Utc};
use icalendar::parser::{Component, read_calendar, unfold};
use icalendar::{CalendarDateTime, DatePerhapsTime};
use reqwest::StatusCode;
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use tracing::{debug, warn};

/// What a single poll of the feed produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Fresh body was downloaded and parsed; events are sorted by start.
    Updated(Vec<CalendarEvent>),
    /// Server answered 304; the previous timeline is still current.
    NotModified,
    /// Network, HTTP or parse failure; retry sooner than the poll cadence.
    Failed,
}

/// Stateful feed client. One instance lives inside the scheduler's poll
/// loop and carries the conditional-request cache between polls.
pub struct FeedFetcher {
    client: reqwest::Client,
    url: String,
    lookahead: Duration,
    last_modified: Option<String>,
}

impl FeedFetcher {
    pub fn new(client: reqwest::Client, config: &CalendarConfig) -> Self {
        Self {
            client,
            url: config.url.clone(),
            lookahead: Duration::days(config.lookahead_days as i64),
            last_modified: None,
        }
    }

    /// Poll the feed once. Failures are logged here and folded into
    /// [`FetchOutcome::Failed`] so the caller only has to pick a sleep.
    pub async fn fetch(&mut self) -> FetchOutcome {
        match self.try_fetch().await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(url = %self.url, error = %err, "calendar feed fetch failed");
                FetchOutcome::Failed
            }
        }
    }

    async fn try_fetch(&mut self) -> Result<FetchOutcome> {
        let mut request = self.client.get(&self.url);
        if let Some(stamp) = &self.last_modified {
            request = request.header(IF_MODIFIED_SINCE, stamp);
        }
        let response = request
            .send()
            .await
            .map_err(|err| StatusError::Feed(err.to_string()))?;

        match response.status() {
            StatusCode::NOT_MODIFIED => Ok(FetchOutcome::NotModified),
            StatusCode::OK => {
                let stamp = response
                    .headers()
                    .get(LAST_MODIFIED)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned);
                let body = response
                    .text()
                    .await
                    .map_err(|err| StatusError::Feed(err.to_string()))?;
                let now = Utc::now();
                let events = parse_feed(&body, now, now + self.lookahead)?;
                // The stamp becomes the validator only once the body has
                // parsed; a failed fetch must leave the next request
                // unconditional so the feed gets re-read in full.
                self.last_modified = stamp;
                debug!(count = events.len(), "calendar feed updated");
                Ok(FetchOutcome::Updated(events))
            }
            status => Err(StatusError::Feed(format!("unexpected status {status}"))),
        }
    }
}

/// Parse an ICS body into the events starting inside the window,
/// sorted by start time.
///
/// Individual VEVENTs that lack a usable DTSTART are skipped with a log
/// line; only an unreadable calendar as a whole is an error.
fn parse_feed(
    body: &str,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<Vec<CalendarEvent>> {
    let unfolded = unfold(body);
    let calendar = read_calendar(&unfolded).map_err(|err| StatusError::Parse(err.to_string()))?;

    let mut events = Vec::new();
    for component in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        let Some(start) = event_start(component) else {
            debug!("skipping VEVENT without a usable DTSTART");
            continue;
        };
        if start < window_start || start > window_end {
            continue;
        }
        let summary = component
            .find_prop("SUMMARY")
            .map(|p| p.val.to_string())
            .unwrap_or_default();
        events.push(CalendarEvent { start, summary });
    }
    events.sort_by_key(|event| event.start);
    Ok(events)
}

fn event_start(component: &Component<'_>) -> Option<DateTime<Utc>> {
    let prop = component.find_prop("DTSTART")?;
    resolve_utc(DatePerhapsTime::try_from(prop).ok()?)
}

/// Collapse the ICS start forms onto UTC: all-day events count from
/// midnight UTC, floating times are read as UTC, zoned times resolve
/// through their TZID (earliest mapping across DST gaps).
fn resolve_utc(value: DatePerhapsTime) -> Option<DateTime<Utc>> {
    match value {
        DatePerhapsTime::Date(date) => date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive)),
        DatePerhapsTime::DateTime(dt) => match dt {
            CalendarDateTime::Utc(utc) => Some(utc),
            CalendarDateTime::Floating(naive) => Some(Utc.from_utc_datetime(&naive)),
            CalendarDateTime::WithTimezone { date_time, tzid } => {
                let tz: chrono_tz::Tz = tzid.parse().ok()?;
                tz.from_local_datetime(&date_time)
                    .earliest()
                    .map(|zoned| zoned.with_timezone(&Utc))
            }
        },
    }
}
