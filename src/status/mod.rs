//! Door-state reconciliation.
//!
//! One loop owns every downstream mutation: topic patches, transition
//! announcements, indicator pins, and the best-effort side effects.
//! Calendar notifications preempt the sensor poll tick, and a stop
//! request preempts everything, so shutdown is honored at the next
//! iteration no matter how busy the feed is.

pub mod topic;

use crate::calendar::CalendarNotifications;
use crate::effects::SideEffects;
use crate::hardware::{DoorSensor, IndicatorPanel};
use crate::targets::TargetSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use topic::{NEXT_EVENT_REGION, STATUS_REGION, sanitize_summary, status_label};
use tracing::{debug, info, warn};

pub struct ReconcilerSettings {
    /// Post `|| LAB OPEN ||` / `|| LAB CLOSED ||` lines on transitions.
    /// The topic is patched either way.
    pub announce: bool,
    /// Sensor poll cadence.
    pub poll_interval: Duration,
    pub status_pin: u8,
    pub entrance_pin: u8,
}

/// Owns the running reconciler task.
pub struct ReconcilerHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Stop the loop. Whatever step is in flight finishes first.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            warn!(error = %err, "reconciler task failed");
        }
    }
}

/// Drives the status surfaces from the door sensor and the calendar.
pub struct StatusReconciler {
    targets: TargetSet,
    sensor: Arc<dyn DoorSensor>,
    panel: Arc<dyn IndicatorPanel>,
    effects: SideEffects,
    notifications: CalendarNotifications,
    settings: ReconcilerSettings,
}

impl StatusReconciler {
    pub fn new(
        targets: TargetSet,
        sensor: Arc<dyn DoorSensor>,
        panel: Arc<dyn IndicatorPanel>,
        effects: SideEffects,
        notifications: CalendarNotifications,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            targets,
            sensor,
            panel,
            effects,
            notifications,
            settings,
        }
    }

    /// Start the loop. The returned watch channel carries the last
    /// door state the loop observed (`None` until the first read).
    pub fn spawn(self) -> (ReconcilerHandle, watch::Receiver<Option<bool>>) {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(None);
        let handle = tokio::spawn(self.run(cancel.clone(), state_tx));
        (ReconcilerHandle { cancel, handle }, state_rx)
    }

    async fn run(mut self, cancel: CancellationToken, state_tx: watch::Sender<Option<bool>>) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut state: Option<bool> = None;
        // A closed notification channel stays closed; disable its branch
        // instead of spinning on the immediate None.
        let mut next_open = true;
        let mut starting_open = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = self.notifications.next.recv(), if next_open => {
                    match next {
                        Some(summary) => {
                            let text = sanitize_summary(summary.as_deref());
                            info!(next = %text, "next event changed");
                            self.targets.patch_all(&NEXT_EVENT_REGION, &text).await;
                        }
                        None => next_open = false,
                    }
                }
                starting = self.notifications.starting.recv(), if starting_open => {
                    match starting {
                        Some(summary) => {
                            info!(event = %summary, "event starting");
                            self.targets
                                .post_all(&format!("Starting event: {summary}"))
                                .await;
                        }
                        None => starting_open = false,
                    }
                }
                _ = ticker.tick() => {
                    state = self.poll_door(state, &state_tx).await;
                }
            }
        }
        debug!("status reconciler stopped");
    }

    /// One sensor poll. Returns the state to carry into the next tick;
    /// a failed read keeps the previous one.
    async fn poll_door(
        &self,
        state: Option<bool>,
        state_tx: &watch::Sender<Option<bool>>,
    ) -> Option<bool> {
        let reading = match self.sensor.read_open() {
            Ok(open) => open,
            Err(err) => {
                warn!(error = %err, "door sensor read failed");
                return state;
            }
        };
        if state == Some(reading) {
            return state;
        }

        let label = status_label(reading);
        info!(label, "door state changed");
        self.targets.patch_all(&STATUS_REGION, label).await;
        // The very first reading establishes the baseline; announcing it
        // would greet every daemon restart with a bogus transition.
        if state.is_some() && self.settings.announce {
            self.targets.post_all(&format!("|| LAB {label} ||")).await;
        }
        self.set_indicators(reading);
        self.effects.apply(reading).await;
        state_tx.send_replace(Some(reading));
        Some(reading)
    }

    fn set_indicators(&self, open: bool) {
        for pin in [self.settings.status_pin, self.settings.entrance_pin] {
            if let Err(err) = self.panel.set_pin(pin, open) {
                warn!(pin, error = %err, "indicator update failed");
            }
        }
    }
}
