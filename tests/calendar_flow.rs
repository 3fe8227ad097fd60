//! Calendar pipeline integration tests.
//!
//! A mock feed server drives the real scheduler: conditional fetches,
//! generation replacement on feed changes, the next/starting handoff
//! interleave, and clean shutdown. Event times are seconds away so the
//! timers run against the wall clock.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lablight::calendar::{CalendarScheduler, FeedFetcher, FetchOutcome};
use lablight::config::CalendarConfig;
use std::time::Duration;
use tokio::time::timeout;
use wiremock::matchers::{HeaderExactMatcher, headers, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED_PATH: &str = "/ical/foulab.ics";
const STAMP_V1: &str = "Wed, 19 Aug 2026 10:00:00 GMT";
const STAMP_V2: &str = "Wed, 19 Aug 2026 11:30:00 GMT";

fn ics_feed(events: &[(DateTime<Utc>, &str)]) -> String {
    let mut body = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//foulab//events//EN\r\n");
    for (start, summary) in events {
        body.push_str("BEGIN:VEVENT\r\n");
        body.push_str(&format!(
            "UID:{}@foulab.org\r\n",
            summary.to_lowercase().replace(' ', "-")
        ));
        body.push_str(&format!("DTSTART:{}\r\n", start.format("%Y%m%dT%H%M%SZ")));
        body.push_str(&format!("SUMMARY:{summary}\r\n"));
        body.push_str("END:VEVENT\r\n");
    }
    body.push_str("END:VCALENDAR\r\n");
    body
}

fn feed_response(stamp: &str, body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Last-Modified", stamp)
        .insert_header("Content-Type", "text/calendar; charset=utf-8")
        .set_body_string(body)
}

// wiremock's exact header matcher splits incoming values at commas, so an
// RFC 1123 stamp only matches when expected as its comma-separated parts.
fn if_modified_since(stamp: &str) -> HeaderExactMatcher {
    headers("If-Modified-Since", stamp.split(',').map(str::trim).collect())
}

fn config_for(server: &MockServer, poll_mins: u64, retry_secs: u64) -> CalendarConfig {
    CalendarConfig {
        url: format!("{}{FEED_PATH}", server.uri()),
        poll_interval_mins: poll_mins,
        retry_interval_secs: retry_secs,
        lookahead_days: 30,
    }
}

#[tokio::test]
async fn second_fetch_carries_the_stored_validator() {
    let server = MockServer::start().await;
    let feed = ics_feed(&[(Utc::now() + ChronoDuration::hours(2), "Movie night")]);
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(feed_response(STAMP_V1, feed))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(if_modified_since(STAMP_V1))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;

    let mut fetcher = FeedFetcher::new(reqwest::Client::new(), &config_for(&server, 60, 60));

    match fetcher.fetch().await {
        FetchOutcome::Updated(events) => {
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].summary, "Movie night");
        }
        other => panic!("expected Updated, got {other:?}"),
    }
    assert!(matches!(fetcher.fetch().await, FetchOutcome::NotModified));
}

#[tokio::test]
async fn a_broken_body_does_not_advance_the_validator() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(if_modified_since(STAMP_V2))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(feed_response(STAMP_V1, "this is no calendar".to_owned()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    let feed = ics_feed(&[(Utc::now() + ChronoDuration::hours(2), "Repair cafe")]);
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(feed_response(STAMP_V2, feed))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let mut fetcher = FeedFetcher::new(reqwest::Client::new(), &config_for(&server, 60, 1));

    assert!(matches!(fetcher.fetch().await, FetchOutcome::Failed));

    // The stamp served alongside the broken body was never adopted, so
    // the retry goes out unconditional and downloads the feed in full.
    match fetcher.fetch().await {
        FetchOutcome::Updated(events) => assert_eq!(events[0].summary, "Repair cafe"),
        other => panic!("expected Updated, got {other:?}"),
    }
    let requests = server.received_requests().await.unwrap();
    assert!(!requests[1].headers.contains_key("if-modified-since"));

    // Conditional service resumes with the recovered fetch's stamp.
    assert!(matches!(fetcher.fetch().await, FetchOutcome::NotModified));
}

#[tokio::test]
async fn generation_walks_next_and_starting_in_lockstep() {
    let server = MockServer::start().await;
    let feed = ics_feed(&[
        (Utc::now() + ChronoDuration::seconds(2), "Solder together"),
        (Utc::now() + ChronoDuration::seconds(4), "Movie night"),
    ]);
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(feed_response(STAMP_V1, feed))
        .mount(&server)
        .await;

    let (mut scheduler, mut notifications) =
        CalendarScheduler::spawn(reqwest::Client::new(), &config_for(&server, 60, 60));

    let wait = Duration::from_secs(10);
    assert_eq!(
        timeout(wait, notifications.next.recv()).await.unwrap(),
        Some(Some("Solder together".to_owned()))
    );
    assert_eq!(
        timeout(wait, notifications.starting.recv()).await.unwrap(),
        Some("Solder together".to_owned())
    );
    assert_eq!(
        timeout(wait, notifications.next.recv()).await.unwrap(),
        Some(Some("Movie night".to_owned()))
    );
    assert_eq!(
        timeout(wait, notifications.starting.recv()).await.unwrap(),
        Some("Movie night".to_owned())
    );
    // Exhausted generations end on the None sentinel and go quiet.
    assert_eq!(
        timeout(wait, notifications.next.recv()).await.unwrap(),
        Some(None)
    );
    assert!(
        timeout(Duration::from_millis(300), notifications.next.recv())
            .await
            .is_err()
    );

    scheduler.close().await;
}

#[tokio::test]
async fn unchanged_responses_never_renotify_but_changes_do() {
    let server = MockServer::start().await;
    let feed_v1 = ics_feed(&[(Utc::now() + ChronoDuration::hours(2), "First party")]);
    let feed_v2 = ics_feed(&[(Utc::now() + ChronoDuration::hours(3), "Second party")]);

    // First poll: the initial feed. Second poll (now carrying the
    // validator): a changed feed. Everything after: not modified.
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(if_modified_since(STAMP_V2))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(if_modified_since(STAMP_V1))
        .respond_with(feed_response(STAMP_V2, feed_v2))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(feed_response(STAMP_V1, feed_v1))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Zero poll interval: the loop refetches as fast as the server
    // answers, so the 304 path gets hammered within the quiet window.
    let (mut scheduler, mut notifications) =
        CalendarScheduler::spawn(reqwest::Client::new(), &config_for(&server, 0, 60));

    let wait = Duration::from_secs(10);
    assert_eq!(
        timeout(wait, notifications.next.recv()).await.unwrap(),
        Some(Some("First party".to_owned()))
    );
    assert_eq!(
        timeout(wait, notifications.next.recv()).await.unwrap(),
        Some(Some("Second party".to_owned()))
    );
    // Hundreds of 304 polls later, nothing has been re-announced.
    assert!(
        timeout(Duration::from_millis(500), notifications.next.recv())
            .await
            .is_err()
    );

    scheduler.close().await;
}

#[tokio::test]
async fn failed_fetches_retry_on_the_short_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    let feed = ics_feed(&[(Utc::now() + ChronoDuration::hours(1), "Repair cafe")]);
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(feed_response(STAMP_V1, feed))
        .mount(&server)
        .await;

    let (mut scheduler, mut notifications) =
        CalendarScheduler::spawn(reqwest::Client::new(), &config_for(&server, 60, 1));

    assert_eq!(
        timeout(Duration::from_secs(10), notifications.next.recv())
            .await
            .unwrap(),
        Some(Some("Repair cafe".to_owned()))
    );

    scheduler.close().await;
}

#[tokio::test]
async fn close_interrupts_an_unconsumed_generation() {
    let server = MockServer::start().await;
    let feed = ics_feed(&[
        (Utc::now() + ChronoDuration::seconds(1), "Imminent"),
        (Utc::now() + ChronoDuration::hours(1), "Later"),
    ]);
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(feed_response(STAMP_V1, feed))
        .mount(&server)
        .await;

    let (mut scheduler, notifications) =
        CalendarScheduler::spawn(reqwest::Client::new(), &config_for(&server, 60, 60));

    // Nobody drains the channels, so the generation parks on a handoff.
    tokio::time::sleep(Duration::from_millis(200)).await;
    timeout(Duration::from_secs(5), scheduler.close())
        .await
        .expect("close must not hang on a parked handoff");

    // Closing twice is a no-op.
    timeout(Duration::from_secs(1), scheduler.close())
        .await
        .expect("second close must return immediately");

    drop(notifications);
}
