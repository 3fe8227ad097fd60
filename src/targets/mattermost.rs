//! Mattermost channel-header target.
//!
//! The status banner lives in the channel header. Every patch re-reads
//! the header from the server first, so edits made through the
//! Mattermost UI between our writes are preserved.

use super::traits::StatusTarget;
use crate::config::MattermostConfig;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct Channel {
    header: String,
}

#[derive(Debug, Serialize)]
struct ChannelPatch<'a> {
    header: &'a str,
}

#[derive(Debug, Serialize)]
struct NewPost<'a> {
    channel_id: &'a str,
    message: &'a str,
}

/// Status surface backed by a Mattermost channel header.
pub struct MattermostTarget {
    client: Client,
    base: String,
    token: String,
    channel_id: String,
}

impl MattermostTarget {
    pub fn new(client: Client, config: &MattermostConfig) -> Self {
        Self {
            client,
            base: config.server_url.trim_end_matches('/').to_owned(),
            token: config.token.clone(),
            channel_id: config.channel_id.clone(),
        }
    }

    fn channel_url(&self) -> String {
        format!("{}/api/v4/channels/{}", self.base, self.channel_id)
    }
}

#[async_trait]
impl StatusTarget for MattermostTarget {
    fn name(&self) -> &'static str {
        "mattermost"
    }

    async fn current_text(&self) -> anyhow::Result<String> {
        let channel: Channel = self
            .client
            .get(self.channel_url())
            .bearer_auth(&self.token)
            .send()
            .await
            .context("fetch channel")?
            .error_for_status()
            .context("fetch channel")?
            .json()
            .await
            .context("decode channel")?;
        Ok(channel.header)
    }

    async fn replace_text(&self, text: &str) -> anyhow::Result<()> {
        self.client
            .put(format!("{}/patch", self.channel_url()))
            .bearer_auth(&self.token)
            .json(&ChannelPatch { header: text })
            .send()
            .await
            .context("patch channel header")?
            .error_for_status()
            .context("patch channel header")?;
        Ok(())
    }

    async fn post(&self, message: &str) -> anyhow::Result<()> {
        self.client
            .post(format!("{}/api/v4/posts", self.base))
            .bearer_auth(&self.token)
            .json(&NewPost {
                channel_id: &self.channel_id,
                message,
            })
            .send()
            .await
            .context("create post")?
            .error_for_status()
            .context("create post")?;
        Ok(())
    }
}
