//! Chat-transport seam.
//!
//! The daemon speaks no chat wire protocol itself. It exposes one half
//! of a channel pair: [`ChatTarget`] (a [`StatusTarget`]) turns status
//! writes into [`ChatCommand`]s, and [`ChatWire`] carries those commands
//! plus the externally observed topic to whatever process holds the
//! actual connection. [`run_stdio_wire`] bridges the wire over
//! stdin/stdout as newline-delimited JSON; stdout is reserved for the
//! protocol, so diagnostics must be routed to stderr.

use super::traits::StatusTarget;
use crate::error::{Result, StatusError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outbound instruction for the chat connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatCommand {
    /// Replace the channel topic.
    SetTopic { channel: String, text: String },
    /// Send a message to a channel or nick.
    Send { target: String, text: String },
}

/// Inbound observation from the chat connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The topic as the server reports it (join echo or a manual edit).
    TopicChanged { channel: String, text: String },
    /// A message addressed to the channel or directly to the bot.
    Message {
        channel: String,
        sender: String,
        text: String,
    },
}

/// A chat message routed to the command responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: String,
    pub sender: String,
    pub text: String,
}

/// Cloneable handle for sending chat messages outside the target fan-out
/// (command replies, ad-hoc announcements).
#[derive(Clone)]
pub struct ChatSender {
    commands: mpsc::UnboundedSender<ChatCommand>,
}

impl ChatSender {
    /// Queue a message for delivery. Once the wire has detached there is
    /// nobody left to deliver to, so the message is dropped with a log.
    pub fn say(&self, target: &str, text: &str) {
        let command = ChatCommand::Send {
            target: target.to_owned(),
            text: text.to_owned(),
        };
        if self.commands.send(command).is_err() {
            warn!(target, "chat wire detached, dropping message");
        }
    }
}

/// Status surface backed by the chat channel's topic.
pub struct ChatTarget {
    channel: String,
    commands: mpsc::UnboundedSender<ChatCommand>,
    topic_tx: Arc<watch::Sender<String>>,
    topic_rx: watch::Receiver<String>,
}

impl ChatTarget {
    pub fn sender(&self) -> ChatSender {
        ChatSender {
            commands: self.commands.clone(),
        }
    }
}

#[async_trait]
impl StatusTarget for ChatTarget {
    fn name(&self) -> &'static str {
        "chat"
    }

    /// The last topic observed on the wire, including our own edits.
    async fn current_text(&self) -> anyhow::Result<String> {
        Ok(self.topic_rx.borrow().clone())
    }

    async fn replace_text(&self, text: &str) -> anyhow::Result<()> {
        self.commands
            .send(ChatCommand::SetTopic {
                channel: self.channel.clone(),
                text: text.to_owned(),
            })
            .map_err(|_| anyhow::anyhow!("chat wire disconnected"))?;
        // Track our own edit so the next patch sees it even before the
        // server echoes the change back.
        self.topic_tx.send_replace(text.to_owned());
        Ok(())
    }

    async fn post(&self, message: &str) -> anyhow::Result<()> {
        self.commands
            .send(ChatCommand::Send {
                target: self.channel.clone(),
                text: message.to_owned(),
            })
            .map_err(|_| anyhow::anyhow!("chat wire disconnected"))?;
        Ok(())
    }
}

/// The connection-side half: commands to deliver, and the topic watch
/// to feed with what the server reports.
pub struct ChatWire {
    pub commands: mpsc::UnboundedReceiver<ChatCommand>,
    pub topic: Arc<watch::Sender<String>>,
}

/// Build a connected [`ChatTarget`]/[`ChatWire`] pair for `channel`.
///
/// The observed topic starts empty; patches fail with a missing-tag
/// error until the wire reports the real topic.
pub fn chat_pair(channel: &str) -> (ChatTarget, ChatWire) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (topic_tx, topic_rx) = watch::channel(String::new());
    let topic_tx = Arc::new(topic_tx);
    (
        ChatTarget {
            channel: channel.to_owned(),
            commands: command_tx,
            topic_tx: Arc::clone(&topic_tx),
            topic_rx,
        },
        ChatWire {
            commands: command_rx,
            topic: topic_tx,
        },
    )
}

/// Bridge the chat wire to stdin/stdout as newline-delimited JSON.
///
/// Outbound [`ChatCommand`]s are written as JSON lines to stdout; JSON
/// lines on stdin are parsed as [`ChatEvent`]s. Topic observations
/// update the wire's watch channel, messages are forwarded to
/// `inbound_tx`. Returns on stdin EOF, when every command sender has
/// been dropped, or when `cancel` fires.
pub async fn run_stdio_wire(
    mut wire: ChatWire,
    inbound_tx: mpsc::Sender<InboundMessage>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = BufWriter::new(tokio::io::stdout());

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            command = wire.commands.recv() => {
                let Some(command) = command else {
                    info!("all chat handles dropped, wire ends");
                    break;
                };
                let json = serde_json::to_string(&command)
                    .map_err(|e| StatusError::Channel(format!("serialize chat command: {e}")))?;
                write_line(&mut stdout, &json).await?;
            }
            line = lines.next_line() => {
                let line = line
                    .map_err(|e| StatusError::Channel(format!("read from stdin: {e}")))?;
                let Some(line) = line else {
                    info!("stdin closed (EOF), chat wire ends");
                    break;
                };
                handle_event_line(&wire, &inbound_tx, line.trim()).await;
            }
        }
    }
    Ok(())
}

async fn handle_event_line(
    wire: &ChatWire,
    inbound_tx: &mpsc::Sender<InboundMessage>,
    line: &str,
) {
    if line.is_empty() {
        return;
    }
    match serde_json::from_str::<ChatEvent>(line) {
        Ok(ChatEvent::TopicChanged { text, .. }) => {
            info!(topic = %text, "topic updated externally");
            wire.topic.send_replace(text);
        }
        Ok(ChatEvent::Message {
            channel,
            sender,
            text,
        }) => {
            let message = InboundMessage {
                channel,
                sender,
                text,
            };
            if inbound_tx.send(message).await.is_err() {
                debug!("command responder gone, dropping chat message");
            }
        }
        Err(err) => {
            warn!(error = %err, raw_line = %line, "unparseable chat event");
        }
    }
}

async fn write_line(writer: &mut BufWriter<tokio::io::Stdout>, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| StatusError::Channel(format!("write to stdout: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| StatusError::Channel(format!("write newline to stdout: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| StatusError::Channel(format!("flush stdout: {e}")))?;
    Ok(())
}
