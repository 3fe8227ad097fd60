//! Lablight: hackerspace status beacon.
//!
//! Keeps the outside world in sync with what is happening inside the
//! lab: whether the door is open, and what the events calendar says is
//! coming up.
//!
//! # Architecture
//!
//! Independent tasks connected by async channels:
//! - **Calendar scheduler**: Polls the ICS feed and times out its
//!   events, emitting "next event" and "starting event" notifications
//! - **Status reconciler**: Multiplexes those notifications with a door
//!   sensor poll and fans every change out to the status targets
//!   (chat topic, Mattermost header), indicator pins and webhooks
//! - **Command responder**: Answers `!status` and `!sign` in chat
//! - **Sign queue**: Paces messages onto the LED sign

pub mod calendar;
pub mod commands;
pub mod config;
pub mod effects;
pub mod error;
pub mod hardware;
pub mod sign;
pub mod status;
pub mod targets;

pub use calendar::{CalendarNotifications, CalendarScheduler};
pub use config::StatusConfig;
pub use error::{Result, StatusError};
pub use status::{ReconcilerSettings, StatusReconciler};
pub use targets::TargetSet;
