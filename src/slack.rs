//! Slack Web API client.
//!
//! Implements [`MessagingApi`] over `reqwest` against the three Web API
//! methods the harvester needs:
//!
//! | Method | HTTP | Parameters |
//! |--------|------|------------|
//! | `conversations.history` | GET | `channel`, `cursor`, `limit` |
//! | `conversations.replies` | GET | `channel`, `ts`, `cursor`, `limit` |
//! | `conversations.join` | POST (form) | `channel` |
//!
//! Slack reports most failures as HTTP 200 with `"ok": false`. Non-2xx
//! statuses (rate limiting returns 429) are folded into the same shape with
//! `error = "http_<status>"` so call policies can retry them.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use channel_harvester_core::messaging::MessagingApi;
use channel_harvester_core::models::{JoinResponse, MessagesResponse, RawMessage};

use crate::config::SlackConfig;

/// Slack Web API client holding a bot token.
pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MessagesPayload {
    ok: bool,
    #[serde(default)]
    messages: Vec<RawMessage>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JoinPayload {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl From<MessagesPayload> for MessagesResponse {
    fn from(p: MessagesPayload) -> Self {
        let next_cursor = p
            .response_metadata
            .and_then(|m| m.next_cursor)
            .filter(|c| !c.is_empty());
        MessagesResponse {
            ok: p.ok,
            messages: p.messages,
            next_cursor,
            error: p.error,
        }
    }
}

impl SlackClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            page_size: None,
        })
    }

    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Build a client from config, reading the token from `slack.token_env`.
    pub fn from_config(config: &SlackConfig) -> Result<Self> {
        let token = match std::env::var(&config.token_env) {
            Ok(t) if !t.is_empty() => t,
            _ => bail!("{} environment variable not set", config.token_env),
        };
        Ok(Self::new(&config.base_url, token)?.with_page_size(config.page_size))
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn get_messages(&self, method: &str, params: &[(&str, String)]) -> Result<MessagesResponse> {
        let response = self
            .http
            .get(self.url(method))
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await
            .with_context(|| format!("GET {} failed", method))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(MessagesResponse::failed(format!("http_{}", status.as_u16())));
        }

        let payload: MessagesPayload = response
            .json()
            .await
            .with_context(|| format!("Failed to decode {} response (status {})", method, status))?;
        Ok(payload.into())
    }

    fn paging_params(&self, channel: &str, cursor: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![("channel", channel.to_string())];
        if let Some(c) = cursor {
            params.push(("cursor", c.to_string()));
        }
        if let Some(limit) = self.page_size {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

#[async_trait]
impl MessagingApi for SlackClient {
    async fn history(&self, channel: &str, cursor: Option<&str>) -> Result<MessagesResponse> {
        let params = self.paging_params(channel, cursor);
        self.get_messages("conversations.history", &params).await
    }

    async fn replies(
        &self,
        channel: &str,
        thread_ts: &str,
        cursor: Option<&str>,
    ) -> Result<MessagesResponse> {
        let mut params = self.paging_params(channel, cursor);
        params.push(("ts", thread_ts.to_string()));
        self.get_messages("conversations.replies", &params).await
    }

    async fn join(&self, channel: &str) -> Result<JoinResponse> {
        let response = self
            .http
            .post(self.url("conversations.join"))
            .bearer_auth(&self.token)
            .form(&[("channel", channel)])
            .send()
            .await
            .context("POST conversations.join failed")?;

        let status = response.status();
        if !status.is_success() {
            return Ok(JoinResponse {
                ok: false,
                error: Some(format!("http_{}", status.as_u16())),
            });
        }

        let payload: JoinPayload = response
            .json()
            .await
            .context("Failed to decode conversations.join response")?;
        Ok(JoinResponse {
            ok: payload.ok,
            error: payload.error,
        })
    }
}
