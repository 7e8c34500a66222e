//! Configuration loading.
//!
//! Tunables live in a TOML file with serde defaults; secrets come from
//! environment variables (loaded through dotenvy in the binary) and are
//! validated with a description of what each one is for.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::ScoringConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the behavior store JSON file.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Optional JSON reply-template file. When set, the suggester runs in
    /// its template-file variant (output capped at 5).
    #[serde(default)]
    pub response_templates: Option<PathBuf>,

    /// Base URL of the model inference service. Absent means the sentiment,
    /// summarization, and generation capabilities run in unavailable mode.
    #[serde(default)]
    pub inference_url: Option<String>,

    /// How many inbox messages the priority-inbox view processes.
    #[serde(default = "default_max_fetch")]
    pub max_fetch_per_poll: u32,

    /// How many days of channel history the daily digest covers.
    #[serde(default = "default_digest_days")]
    pub digest_days: i64,

    /// Priority scoring constants.
    #[serde(default)]
    pub scoring: ScoringConfig,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("behavior_store.json")
}

fn default_max_fetch() -> u32 {
    10
}

fn default_digest_days() -> i64 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            response_templates: None,
            inference_url: None,
            max_fetch_per_poll: default_max_fetch(),
            digest_days: default_digest_days(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("parse {}: {e}", path.display())))
    }

    pub fn example() -> Self {
        Self {
            store_path: PathBuf::from("./behavior_store.json"),
            response_templates: Some(PathBuf::from("./response_templates.json")),
            inference_url: Some("http://localhost:8080".to_string()),
            ..Default::default()
        }
    }
}

/// OAuth material for the Gmail authorized-user flow.
#[derive(Debug, Clone)]
pub struct GmailSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl GmailSecrets {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client_id: required_env("GOOGLE_CLIENT_ID", "OAuth client ID for the Gmail API")?,
            client_secret: required_env(
                "GOOGLE_CLIENT_SECRET",
                "OAuth client secret for the Gmail API",
            )?,
            refresh_token: required_env(
                "GMAIL_REFRESH_TOKEN",
                "OAuth refresh token for the Gmail API",
            )?,
        })
    }
}

/// Slack API tokens. The bot token covers history and posting; search
/// requires the user token.
#[derive(Debug, Clone)]
pub struct SlackSecrets {
    pub bot_token: String,
    pub user_token: String,
}

impl SlackSecrets {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bot_token: required_env("SLACK_TOKEN", "Slack API bot token")?,
            user_token: required_env("SLACK_USER_TOKEN", "Slack API user token")?,
        })
    }
}

/// Twilio credentials for the WhatsApp channel.
#[derive(Debug, Clone)]
pub struct TwilioSecrets {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl TwilioSecrets {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            account_sid: required_env("TWILIO_ACCOUNT_SID", "Twilio API account SID")?,
            auth_token: required_env("TWILIO_AUTH_TOKEN", "Twilio API auth token")?,
            from_number: required_env(
                "TWILIO_WHATSAPP_FROM",
                "WhatsApp-enabled Twilio sender number",
            )?,
        })
    }
}

fn required_env(name: &str, description: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("{name} ({description}) must be set")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.store_path, PathBuf::from("behavior_store.json"));
        assert_eq!(config.max_fetch_per_poll, 10);
        assert_eq!(config.digest_days, 1);
        assert!(config.inference_url.is_none());
        assert_eq!(config.scoring.urgent_threshold, 6);
    }

    #[test]
    fn partial_file_overrides_selected_fields() {
        let config: Config = toml::from_str(
            r#"
            store_path = "/tmp/store.json"
            inference_url = "http://localhost:9000"

            [scoring]
            urgent_threshold = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.store_path, PathBuf::from("/tmp/store.json"));
        assert_eq!(config.inference_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.scoring.urgent_threshold, 8);
        // Untouched scoring fields keep their defaults.
        assert_eq!(config.scoring.follow_up_threshold, 3);
    }

    #[test]
    fn example_serializes_and_reloads() {
        let toml_text = toml::to_string_pretty(&Config::example()).unwrap();
        let back: Config = toml::from_str(&toml_text).unwrap();
        assert_eq!(back.store_path, PathBuf::from("./behavior_store.json"));
        assert!(back.response_templates.is_some());
    }

    #[test]
    fn missing_env_names_the_variable() {
        std::env::remove_var("ASSISTANT_TEST_MISSING_VAR");
        let err = required_env("ASSISTANT_TEST_MISSING_VAR", "test variable").unwrap_err();
        assert!(err.to_string().contains("ASSISTANT_TEST_MISSING_VAR"));
        assert!(err.to_string().contains("test variable"));
    }
}
