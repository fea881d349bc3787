//! Application configuration loaded from the environment.
//!
//! # Security Notes
//! - Sensitive fields are marked and must never be logged
//! - `Debug` output redacts them

use envconfig::Envconfig;
use std::sync::OnceLock;

/// Environment variables used by the receiver binary.
#[derive(Envconfig, Clone)]
pub struct AppConfig {
    /// Environment name (NON-SENSITIVE)
    /// Values: "local", "dev", "prod"
    #[envconfig(from = "ENV", default = "local")]
    pub env: String,

    /// 🔒 SENSITIVE: Slack app signing secret used to verify requests
    #[envconfig(from = "SLACK_SIGNING_SECRET")]
    pub slack_signing_secret: String,

    /// 🔒 SENSITIVE: Bot token for Slack Web API calls
    #[envconfig(from = "SLACK_BOT_TOKEN")]
    pub slack_bot_token: String,

    /// Path the events endpoint is mounted on (NON-SENSITIVE)
    #[envconfig(from = "SLACK_EVENT_PATH", default = "/slack/events")]
    pub slack_event_path: String,

    /// Host address for web server binding (NON-SENSITIVE)
    #[envconfig(from = "WEB_SERVER_HOST", default = "0.0.0.0")]
    pub web_server_host: String,

    /// Port for web server binding (NON-SENSITIVE)
    #[envconfig(from = "WEB_SERVER_PORT", default = "8000")]
    pub web_server_port: u16,

    /// Slack Web API base URL (NON-SENSITIVE)
    #[envconfig(from = "SLACK_API_URL", default = "https://slack.com/api")]
    pub slack_api_url: String,

    /// 🔒 SENSITIVE: Logfire write token. Logs stay local when unset.
    #[envconfig(from = "LOGFIRE_TOKEN")]
    pub logfire_token: Option<String>,
}

impl AppConfig {
    pub fn is_prod(&self) -> bool {
        self.env.to_lowercase() == "prod"
    }

    /// `host:port` pair to bind the server to
    pub fn server_addr(&self) -> (String, u16) {
        (self.web_server_host.clone(), self.web_server_port)
    }

    pub fn chat_post_message_endpoint(&self) -> String {
        format!(
            "{api}/chat.postMessage",
            api = self.slack_api_url.trim_end_matches('/')
        )
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("slack_signing_secret", &"<redacted>")
            .field("slack_bot_token", &"<redacted>")
            .field("slack_event_path", &self.slack_event_path)
            .field("web_server_host", &self.web_server_host)
            .field("web_server_port", &self.web_server_port)
            .field("slack_api_url", &self.slack_api_url)
            .field(
                "logfire_token",
                &self.logfire_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Global application configuration, set once by [`init_config`]
pub static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Loads the configuration from the environment into [`APP_CONFIG`].
///
/// Calling it again keeps the first loaded value.
pub fn init_config() -> anyhow::Result<&'static AppConfig> {
    if let Some(config) = APP_CONFIG.get() {
        return Ok(config);
    }

    let config = AppConfig::init_from_env()
        .map_err(|e| anyhow::anyhow!("failed to load app config from environment: {e}"))?;

    Ok(APP_CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn required() -> HashMap<String, String> {
        HashMap::from([
            ("SLACK_SIGNING_SECRET".to_string(), "s3cr3t".to_string()),
            ("SLACK_BOT_TOKEN".to_string(), "xoxb-token".to_string()),
        ])
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::init_from_hashmap(&required()).unwrap();

        assert_eq!(config.env, "local");
        assert!(!config.is_prod());
        assert_eq!(config.slack_event_path, "/slack/events");
        assert_eq!(config.server_addr(), ("0.0.0.0".to_string(), 8000));
        assert_eq!(
            config.chat_post_message_endpoint(),
            "https://slack.com/api/chat.postMessage"
        );
        assert!(config.logfire_token.is_none());
    }

    #[test]
    fn test_overrides() {
        let mut vars = required();
        vars.insert("ENV".into(), "PROD".into());
        vars.insert("SLACK_EVENT_PATH".into(), "/events".into());
        vars.insert("WEB_SERVER_PORT".into(), "3000".into());
        vars.insert("SLACK_API_URL".into(), "http://localhost:9000/api/".into());
        vars.insert("LOGFIRE_TOKEN".into(), "lf-token".into());

        let config = AppConfig::init_from_hashmap(&vars).unwrap();

        assert!(config.is_prod());
        assert_eq!(config.slack_event_path, "/events");
        assert_eq!(config.web_server_port, 3000);
        assert_eq!(
            config.chat_post_message_endpoint(),
            "http://localhost:9000/api/chat.postMessage"
        );
        assert_eq!(config.logfire_token.as_deref(), Some("lf-token"));
    }

    #[test]
    fn test_missing_secret_fails() {
        let vars = HashMap::from([("SLACK_BOT_TOKEN".to_string(), "xoxb".to_string())]);

        assert!(AppConfig::init_from_hashmap(&vars).is_err());
    }

    #[test]
    fn test_invalid_port_fails() {
        let mut vars = required();
        vars.insert("WEB_SERVER_PORT".into(), "not-a-port".into());

        assert!(AppConfig::init_from_hashmap(&vars).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut vars = required();
        vars.insert("LOGFIRE_TOKEN".into(), "lf-token".into());
        let config = AppConfig::init_from_hashmap(&vars).unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains("xoxb-token"));
        assert!(!debug.contains("lf-token"));
    }
}
