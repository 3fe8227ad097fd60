//! Timeline timer: walks one generation of fetched events in order.
//!
//! Each feed download spawns a fresh timer over the new event list; the
//! previous generation is cancelled and awaited first, so at most one
//! timer is ever publishing. The cursor is fixed at spawn to the first
//! event not yet started and only moves forward, which keeps the
//! notification count stable even when several events share a start.

use super::CalendarEvent;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle on a spawned timeline generation.
pub(super) struct TimerTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TimerTask {
    /// Spawn a timer over `events` (already sorted by start).
    pub(super) fn spawn(
        events: Vec<CalendarEvent>,
        next_tx: mpsc::Sender<Option<String>>,
        starting_tx: mpsc::Sender<String>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_timeline(events, next_tx, starting_tx, cancel.clone()));
        Self { cancel, handle }
    }

    /// Cancel the generation and wait for its task to finish.
    pub(super) async fn close(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

async fn run_timeline(
    events: Vec<CalendarEvent>,
    next_tx: mpsc::Sender<Option<String>>,
    starting_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    let now = Utc::now();
    let mut cursor = events.partition_point(|event| event.start < now);
    debug!(
        total = events.len(),
        skipped = cursor,
        "timeline generation started"
    );

    loop {
        let upcoming = events.get(cursor);

        // Hand off "next event"; blocks until the consumer takes it.
        let announce = upcoming.map(|event| event.summary.clone());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            sent = next_tx.send(announce) => {
                if sent.is_err() {
                    debug!("next-event receiver dropped, timeline ends");
                    return;
                }
            }
        }

        // The sentinel was the last notification of this generation.
        let Some(event) = upcoming else {
            debug!("timeline exhausted");
            return;
        };

        let wait = (event.start - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(wait) => {}
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            sent = starting_tx.send(event.summary.clone()) => {
                if sent.is_err() {
                    debug!("starting-event receiver dropped, timeline ends");
                    return;
                }
            }
        }

        cursor += 1;
    }
}
