//! LED message sign queue.
//!
//! Messages are shown one at a time with a fixed pause between them so
//! passers-by can actually read the sign. Every displayed message also
//! lands in a trace log, one line per message.

use crate::config::SignConfig;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Hold each message on the sign this long before showing the next.
const MESSAGE_PACE: Duration = Duration::from_secs(5);

/// The physical sign shows at most this many bytes per message.
const FRAME_LIMIT: usize = 255;

/// One message queued for the sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignMessage {
    pub user: String,
    pub timestamp: String,
    pub text: String,
}

/// Renders one message. Implementations drive the physical sign; the
/// built-in [`LogDisplay`] writes to the log instead.
pub trait SignDisplay: Send + Sync {
    fn show(&self, message: &SignMessage) -> anyhow::Result<()>;
}

/// Headless display that logs the framed message.
pub struct LogDisplay;

impl SignDisplay for LogDisplay {
    fn show(&self, message: &SignMessage) -> anyhow::Result<()> {
        let header = format!("{} @ {}", message.user, message.timestamp);
        let text = clip(&message.text, FRAME_LIMIT);
        info!(%header, text, "sign message");
        Ok(())
    }
}

/// Truncate to at most `max` bytes without splitting a character.
fn clip(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Cloneable submission handle. Full or closed queues drop the message
/// with a log line rather than blocking the caller.
#[derive(Clone)]
pub struct SignSender {
    tx: mpsc::Sender<SignMessage>,
}

impl SignSender {
    pub fn submit(&self, message: SignMessage) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(m)) => {
                warn!(user = %m.user, "sign queue full, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(m)) => {
                warn!(user = %m.user, "sign queue closed, dropping message");
            }
        }
    }
}

/// Owns the display worker task.
pub struct SignQueue {
    tx: Option<mpsc::Sender<SignMessage>>,
    handle: Option<JoinHandle<()>>,
}

impl SignQueue {
    pub fn spawn(config: &SignConfig, display: Box<dyn SignDisplay>) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_depth);
        let handle = tokio::spawn(run_queue(rx, config.trace_log.clone(), display));
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// Handle for submitting messages. `None` once the queue is closed.
    pub fn sender(&self) -> Option<SignSender> {
        self.tx.as_ref().map(|tx| SignSender { tx: tx.clone() })
    }

    /// Stop accepting messages and wait for the backlog to finish
    /// displaying. Every [`SignSender`] clone must be dropped first or
    /// this waits for them too. Safe to call twice.
    pub async fn close(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "sign queue task failed");
            }
        }
    }
}

async fn run_queue(
    mut rx: mpsc::Receiver<SignMessage>,
    trace_log: PathBuf,
    display: Box<dyn SignDisplay>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(err) = append_trace(&trace_log, &message) {
            warn!(error = %err, path = %trace_log.display(), "sign trace append failed");
        }
        if let Err(err) = display.show(&message) {
            warn!(error = %err, "sign display refused message");
        }
        tokio::time::sleep(MESSAGE_PACE).await;
    }
    debug!("sign queue drained");
}

fn append_trace(path: &Path, message: &SignMessage) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{} {} {}", message.user, message.timestamp, message.text)
}
