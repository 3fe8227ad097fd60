use async_trait::async_trait;

/// A downstream surface that carries the lab status. New surfaces only
/// need to implement this trait.
///
/// `current_text` must reflect edits made through other means (a human
/// changing the topic by hand), since patch idempotence is judged
/// against whatever this returns.
#[async_trait]
pub trait StatusTarget: Send + Sync {
    /// Stable target identifier (e.g. `chat`, `mattermost`).
    fn name(&self) -> &'static str;

    /// The target's current topic/header text.
    async fn current_text(&self) -> anyhow::Result<String>;

    /// Replace the topic/header text wholesale.
    async fn replace_text(&self, text: &str) -> anyhow::Result<()>;

    /// Append a transient announcement message.
    async fn post(&self, message: &str) -> anyhow::Result<()>;
}
