//! Best-effort side effects fired on open/closed transitions.
//!
//! None of these are load-bearing: a failed webhook, plug, or media call
//! is logged and forgotten, and the reconciler carries on. Unconfigured
//! endpoints are skipped entirely.

use crate::config::EffectsConfig;
use crate::status::topic::status_label;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

/// Fans a door-state transition out to the configured external endpoints.
pub struct SideEffects {
    client: Client,
    config: EffectsConfig,
}

impl SideEffects {
    pub fn new(client: Client, config: EffectsConfig) -> Self {
        Self { client, config }
    }

    /// Fire every configured effect for the new door state.
    pub async fn apply(&self, open: bool) {
        self.status_webhook(status_label(open)).await;
        self.power_plug(open).await;
        if !open {
            self.stop_media().await;
        }
    }

    /// `GET {endpoint}{label}` against the website status hook.
    async fn status_webhook(&self, label: &str) {
        let Some(endpoint) = &self.config.status_endpoint else {
            return;
        };
        let url = format!("{endpoint}{label}");
        match self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(_) => debug!(url, "status webhook notified"),
            Err(err) => warn!(url, error = %err, "status webhook failed"),
        }
    }

    /// Tasmota-style plug toggle. The firmware expects `Power On` / `Power off`.
    async fn power_plug(&self, open: bool) {
        let Some(base) = &self.config.power_plug else {
            return;
        };
        let cmnd = if open { "On" } else { "off" };
        let url = format!("{base}cm?cmnd=Power%20{cmnd}");
        match self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(_) => debug!(cmnd, "power plug switched"),
            Err(err) => warn!(url, error = %err, "power plug request failed"),
        }
    }

    /// Stop whatever the media player left running when the lab closes.
    async fn stop_media(&self) {
        let Some(endpoint) = &self.config.media_rpc else {
            return;
        };
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "core.playback.stop",
        });
        match self
            .client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(_) => debug!("media playback stopped"),
            Err(err) => warn!(endpoint, error = %err, "media stop failed"),
        }
    }
}
