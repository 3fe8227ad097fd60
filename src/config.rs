//! Configuration types for the status daemon.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the status daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Calendar feed settings.
    pub calendar: CalendarConfig,
    /// Chat channel settings (topic + announcements).
    pub chat: ChatConfig,
    /// Mattermost channel header sync. `None` disables the target.
    pub mattermost: Option<MattermostConfig>,
    /// Door sensor settings.
    pub sensor: SensorConfig,
    /// Indicator pin assignments.
    pub indicators: IndicatorConfig,
    /// Best-effort side-effect endpoints fired on open/closed transitions.
    pub effects: EffectsConfig,
    /// LED message sign. `None` disables the sign queue.
    pub sign: Option<SignConfig>,
}

/// Calendar feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// ICS feed URL.
    pub url: String,
    /// Steady-state poll interval in minutes (used after Updated/NotModified).
    pub poll_interval_mins: u64,
    /// Retry interval in seconds after a failed fetch or parse.
    pub retry_interval_secs: u64,
    /// Look-ahead window in days; events starting later are ignored until a
    /// later fetch cycle.
    pub lookahead_days: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            url: "https://foulab.org/ical/foulab.ics".to_owned(),
            poll_interval_mins: 60,
            retry_interval_secs: 60,
            lookahead_days: 30,
        }
    }
}

impl CalendarConfig {
    /// Steady-state poll interval as a [`std::time::Duration`].
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_mins * 60)
    }

    /// Retry interval as a [`std::time::Duration`].
    pub fn retry_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.retry_interval_secs)
    }
}

/// Chat channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Channel whose topic carries the status tags.
    pub channel: String,
    /// Name the bot answers to in mentions.
    pub bot_name: String,
    /// Announce open/closed transitions as channel messages (the topic is
    /// always patched; this only gates the extra announcement line).
    pub announce_transitions: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            channel: "#foulab".to_owned(),
            bot_name: "lablight".to_owned(),
            announce_transitions: true,
        }
    }
}

/// Mattermost REST API configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MattermostConfig {
    /// Server base URL, e.g. `https://chat.example.org`.
    pub server_url: String,
    /// Personal access token.
    pub token: String,
    /// Channel whose header carries the status tags.
    pub channel_id: String,
}

/// Door sensor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// GPIO pin wired to the door switch.
    pub pin: u8,
    /// Poll-tick interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            pin: 23,
            poll_interval_ms: 1000,
        }
    }
}

impl SensorConfig {
    /// Poll-tick interval as a [`std::time::Duration`].
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

/// Indicator pin assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Pin driven high while the lab is open.
    pub status_pin: u8,
    /// Entrance "open" LED pin.
    pub entrance_pin: u8,
    /// Wired-ground pin for the entrance LED, pulled low at startup.
    pub ground_pin: u8,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            status_pin: 24,
            entrance_pin: 17,
            ground_pin: 21,
        }
    }
}

/// Side-effect endpoints. Each is optional; unset entries are skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    /// Website status endpoint; the open/closed label is appended to the URL.
    pub status_endpoint: Option<String>,
    /// Smart-plug base URL (Tasmota-style `cm?cmnd=Power%20On|Off`).
    pub power_plug: Option<String>,
    /// Media player JSON-RPC endpoint; playback is stopped when the lab closes.
    pub media_rpc: Option<String>,
}

/// LED message sign configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignConfig {
    /// File receiving one trace line per displayed message.
    pub trace_log: PathBuf,
    /// Queued messages beyond this are refused.
    pub queue_depth: usize,
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            trace_log: PathBuf::from("trace.log"),
            queue_depth: 100,
        }
    }
}

impl StatusConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::StatusError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::StatusError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/lablight/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("lablight").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("lablight")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/lablight-config/config.toml")
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = StatusConfig::default();
        assert!(!config.calendar.url.is_empty());
        assert!(config.calendar.poll_interval_mins > 0);
        assert!(config.calendar.retry_interval_secs > 0);
        assert!(config.calendar.lookahead_days > 0);
        assert!(!config.chat.channel.is_empty());
        assert!(config.sensor.poll_interval_ms > 0);
        assert!(config.mattermost.is_none());
        assert!(config.sign.is_none());
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = StatusConfig::default_config_path();
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
            [calendar]
            url = "https://example.org/events.ics"

            [mattermost]
            server_url = "https://chat.example.org"
            token = "secret"
            channel_id = "abc123"
        "#;
        let config: StatusConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.calendar.url, "https://example.org/events.ics");
        assert_eq!(config.calendar.poll_interval_mins, 60);
        assert_eq!(config.sensor.pin, 23);
        let mm = config.mattermost.expect("mattermost section should be set");
        assert_eq!(mm.channel_id, "abc123");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = std::env::temp_dir().join("lablight-test-config-roundtrip");
        let path = dir.join("config.toml");

        let mut config = StatusConfig::default();
        config.calendar.poll_interval_mins = 5;
        config.chat.announce_transitions = false;
        config.effects.status_endpoint = Some("https://example.org/status/".to_owned());

        assert!(config.save_to_file(&path).is_ok());
        assert!(path.exists());

        let loaded = StatusConfig::from_file(&path).expect("reload should succeed");
        assert_eq!(loaded.calendar.poll_interval_mins, 5);
        assert!(!loaded.chat.announce_transitions);
        assert_eq!(
            loaded.effects.status_endpoint.as_deref(),
            Some("https://example.org/status/")
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = StatusConfig::from_file(std::path::Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("lablight-test-config-invalid");
        let path = dir.join("bad.toml");
        let _ = std::fs::create_dir_all(&dir);
        std::fs::write(&path, "this is not valid toml {{{").ok();

        let result = StatusConfig::from_file(&path);
        assert!(result.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
