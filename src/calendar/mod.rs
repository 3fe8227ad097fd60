//! Calendar scheduler: polls the ICS feed and times out its events.
//!
//! Two tasks cooperate here. The poll loop downloads the feed on a fixed
//! cadence (cheap 304s in between) and, on every real change, swaps in a
//! fresh [`timeline`] generation. The live generation hands "next event"
//! and "starting event" notifications to the consumer over capacity-one
//! channels, so nothing is announced until somebody is listening.

mod feed;
mod timeline;

pub use feed::{FeedFetcher, FetchOutcome};

use crate::config::CalendarConfig;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use timeline::TimerTask;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One feed event, reduced to what the status pipeline needs. The
/// summary is empty when the feed omits one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub start: DateTime<Utc>,
    pub summary: String,
}

/// Receiving ends handed to the status reconciler.
pub struct CalendarNotifications {
    /// Summary of the upcoming event, one per handoff; `None` is the
    /// end-of-generation sentinel.
    pub next: mpsc::Receiver<Option<String>>,
    /// Summary of an event whose start time has arrived.
    pub starting: mpsc::Receiver<String>,
}

type SharedTimer = Arc<Mutex<Option<TimerTask>>>;

/// Owns the poll loop and whichever timeline generation is live.
pub struct CalendarScheduler {
    cancel: CancellationToken,
    poll_handle: Option<JoinHandle<()>>,
    timer: SharedTimer,
}

impl CalendarScheduler {
    /// Start polling the feed and return the notification channels.
    pub fn spawn(
        client: reqwest::Client,
        config: &CalendarConfig,
    ) -> (Self, CalendarNotifications) {
        let (next_tx, next_rx) = mpsc::channel(1);
        let (starting_tx, starting_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let timer: SharedTimer = Arc::new(Mutex::new(None));

        let poll = PollLoop {
            fetcher: FeedFetcher::new(client, config),
            poll_interval: config.poll_interval(),
            retry_interval: config.retry_interval(),
            timer: Arc::clone(&timer),
            next_tx,
            starting_tx,
            cancel: cancel.clone(),
        };
        let poll_handle = tokio::spawn(poll.run());

        (
            Self {
                cancel,
                poll_handle: Some(poll_handle),
                timer,
            },
            CalendarNotifications {
                next: next_rx,
                starting: starting_rx,
            },
        )
    }

    /// Stop the live timeline, then the poll loop; each task is awaited
    /// before the next step, so no work survives this call. Safe before
    /// any fetch completed, and safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(task) = self.timer.lock().await.take() {
            task.close().await;
        }
        self.cancel.cancel();
        if let Some(handle) = self.poll_handle.take() {
            let _ = handle.await;
        }
        // The poll loop may have swapped in a replacement while draining.
        if let Some(task) = self.timer.lock().await.take() {
            task.close().await;
        }
    }
}

/// Background poll loop; one per scheduler.
struct PollLoop {
    fetcher: FeedFetcher,
    poll_interval: Duration,
    retry_interval: Duration,
    timer: SharedTimer,
    next_tx: mpsc::Sender<Option<String>>,
    starting_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl PollLoop {
    async fn run(mut self) {
        loop {
            // A fetch already in flight completes; a stop that arrived
            // during it is honored here.
            if self.cancel.is_cancelled() {
                break;
            }
            let outcome = self.fetcher.fetch().await;

            let sleep_for = match outcome {
                FetchOutcome::Updated(events) => {
                    info!(events = events.len(), "calendar changed, replacing timeline");
                    self.replace_timeline(events).await;
                    self.poll_interval
                }
                FetchOutcome::NotModified => self.poll_interval,
                FetchOutcome::Failed => self.retry_interval,
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
    }

    /// Retire the previous generation before the new one may publish.
    async fn replace_timeline(&self, events: Vec<CalendarEvent>) {
        let mut slot = self.timer.lock().await;
        if let Some(old) = slot.take() {
            old.close().await;
        }
        *slot = Some(TimerTask::spawn(
            events,
            self.next_tx.clone(),
            self.starting_tx.clone(),
        ));
    }
}
