//! # Slack Web API Client
//!
//! Outbound messaging used by event handlers to answer in a channel.

use crate::config::AppConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body of a `chat.postMessage` request
#[derive(Debug, Serialize)]
pub struct PostMessageRequest<'a> {
    pub channel: &'a str,
    pub text: &'a str,
}

/// Relevant part of a Slack Web API answer
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PostMessageResponse {
    pub ok: bool,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PostMessageResponse {
    /// Turns `"ok": false` into an error carrying Slack's error code.
    pub fn into_result(self) -> Result<Self> {
        if self.ok {
            return Ok(self);
        }

        anyhow::bail!(
            "Slack API returned error: {}",
            self.error.as_deref().unwrap_or("unknown_error")
        )
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Posts `text` to `channel`.
    async fn post_message(&self, channel: &str, text: &str) -> Result<PostMessageResponse>;
}

/// Slack Web API client authenticated with a bot token
#[derive(Clone)]
pub struct SlackClient {
    client: reqwest::Client,
    /// Full `chat.postMessage` URL
    endpoint: String,
    bot_token: String,
}

impl SlackClient {
    pub fn new(endpoint: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            bot_token: bot_token.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.chat_post_message_endpoint(),
            config.slack_bot_token.clone(),
        )
    }
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MessagingClient for SlackClient {
    async fn post_message(&self, channel: &str, text: &str) -> Result<PostMessageResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.bot_token)
            .json(&PostMessageRequest { channel, text })
            .send()
            .await
            .context("Failed to send request to Slack API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());

            anyhow::bail!("Slack API returned error status {}: {}", status, body);
        }

        let slack_response: PostMessageResponse = response
            .json()
            .await
            .context("Failed to parse Slack API response")?;

        slack_response.into_result()
    }
}
