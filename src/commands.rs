//! Chat command responder.
//!
//! Watches the inbound message stream for the handful of commands the
//! bot answers. Replies in the home channel are prefixed with the
//! sender's nick; direct messages are answered directly.

use crate::hardware::DoorSensor;
use crate::sign::{SignMessage, SignSender};
use crate::targets::chat::{ChatSender, InboundMessage};
use chrono::Local;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What a message asks of the bot.
#[derive(Debug, PartialEq, Eq)]
enum Action<'a> {
    /// `!sign <text>`: queue text for the LED sign.
    Sign(&'a str),
    /// `!status`: report the door state.
    Status,
    /// The bot was named without a command.
    Mention,
    /// A direct message the bot does not understand.
    Confused,
    Ignore,
}

fn classify<'a>(text: &'a str, bot_name: &str, direct: bool) -> Action<'a> {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("!sign ") {
        let rest = rest.trim();
        if !rest.is_empty() {
            return Action::Sign(rest);
        }
    }
    // First word only; "!status please" still counts.
    if trimmed.split_whitespace().next() == Some("!status") {
        return Action::Status;
    }
    if trimmed.contains(bot_name) {
        return Action::Mention;
    }
    if direct {
        return Action::Confused;
    }
    Action::Ignore
}

pub struct ResponderSettings {
    /// Channel whose messages get nick-prefixed replies.
    pub home_channel: String,
    /// Name that triggers the mention reply.
    pub bot_name: String,
}

/// Answers commands from the inbound chat stream.
pub struct CommandResponder {
    inbound: mpsc::Receiver<InboundMessage>,
    chat: ChatSender,
    sensor: Arc<dyn DoorSensor>,
    door_state: watch::Receiver<Option<bool>>,
    sign: Option<SignSender>,
    settings: ResponderSettings,
}

impl CommandResponder {
    pub fn new(
        inbound: mpsc::Receiver<InboundMessage>,
        chat: ChatSender,
        sensor: Arc<dyn DoorSensor>,
        door_state: watch::Receiver<Option<bool>>,
        sign: Option<SignSender>,
        settings: ResponderSettings,
    ) -> Self {
        Self {
            inbound,
            chat,
            sensor,
            door_state,
            sign,
            settings,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                message = self.inbound.recv() => {
                    let Some(message) = message else { break };
                    self.handle(message).await;
                }
            }
        }
        debug!("command responder stopped");
    }

    async fn handle(&self, message: InboundMessage) {
        let direct = message.channel != self.settings.home_channel;
        let (target, prefix) = if direct {
            (message.sender.clone(), String::new())
        } else {
            (message.channel.clone(), format!("{}: ", message.sender))
        };

        match classify(&message.text, &self.settings.bot_name, direct) {
            Action::Sign(text) => {
                let Some(sign) = &self.sign else {
                    self.chat
                        .say(&target, &format!("{prefix}The sign is not hooked up."));
                    return;
                };
                sign.submit(SignMessage {
                    user: message.sender.clone(),
                    timestamp: Local::now().format("%H:%M %-d-%m-%Y").to_string(),
                    text: text.to_owned(),
                });
                self.chat.say(&target, &format!("{prefix}Alrity then!"));
            }
            Action::Status => {
                let line = self.status_line();
                self.chat.say(&target, &format!("{prefix}{line}"));
            }
            Action::Mention => {
                self.chat.say(&target, &format!("{prefix}u wot m8?"));
            }
            Action::Confused => {
                self.chat.say(&target, "Va?");
            }
            Action::Ignore => {}
        }
    }

    /// Fresh sensor read; the reconciler's last observation is only a
    /// fallback when the hardware refuses to answer.
    fn status_line(&self) -> String {
        let open = match self.sensor.read_open() {
            Ok(open) => Some(open),
            Err(err) => {
                warn!(error = %err, "door sensor read failed, using last known state");
                *self.door_state.borrow()
            }
        };
        match open {
            Some(true) => "The lab is currently OPEN.".to_owned(),
            Some(false) => "Sadly, the lab is currently CLOSED.".to_owned(),
            None => "No idea, the door sensor is not answering.".to_owned(),
        }
    }
}
