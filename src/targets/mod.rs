//! Downstream status surfaces and the fan-out that drives them.

pub mod chat;
pub mod mattermost;
pub mod traits;

pub use chat::{
    ChatCommand, ChatEvent, ChatSender, ChatTarget, ChatWire, InboundMessage, chat_pair,
};
pub use mattermost::MattermostTarget;
pub use traits::StatusTarget;

use crate::status::topic::patch_tagged_region;
use regex::Regex;
use tracing::{debug, info, warn};

/// The surfaces a status change fans out to. Each target is driven
/// independently: a failing or already-current target never blocks the
/// others.
pub struct TargetSet {
    targets: Vec<Box<dyn StatusTarget>>,
}

impl TargetSet {
    pub fn new(targets: Vec<Box<dyn StatusTarget>>) -> Self {
        Self { targets }
    }

    pub fn push(&mut self, target: Box<dyn StatusTarget>) {
        self.targets.push(target);
    }

    /// Patch one tagged region on every target. Each target's current
    /// text is re-read first, and the write is skipped when the region
    /// already carries the replacement.
    pub async fn patch_all(&self, region: &Regex, replacement: &str) {
        for target in &self.targets {
            if let Err(err) = patch_target(target.as_ref(), region, replacement).await {
                warn!(target = target.name(), error = %err, "topic patch failed");
            }
        }
    }

    /// Post an announcement to every target.
    pub async fn post_all(&self, message: &str) {
        for target in &self.targets {
            if let Err(err) = target.post(message).await {
                warn!(target = target.name(), error = %err, "announcement failed");
            }
        }
    }
}

async fn patch_target(
    target: &dyn StatusTarget,
    region: &Regex,
    replacement: &str,
) -> anyhow::Result<()> {
    let current = target.current_text().await?;
    let patch = patch_tagged_region(&current, region, replacement)?;
    if patch.changed {
        info!(target = target.name(), text = %patch.text, "updating topic");
        target.replace_text(&patch.text).await?;
    } else {
        debug!(target = target.name(), "topic unchanged");
    }
    Ok(())
}
