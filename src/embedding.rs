//! Embedding sink implementations.
//!
//! The [`EmbeddingSink`] trait lives in the core crate. This module provides
//! the HTTP implementation and [`create_sink`], which picks one based on
//! `[embedding].provider`:
//!
//! | Provider | Sink |
//! |----------|------|
//! | `"disabled"` | none, batches are not embedded |
//! | `"http"` | [`HttpEmbeddingSink`] |
//!
//! # Wire format
//!
//! One `POST` per batch with a bearer token and the body
//! `{"instances": [{"task_type": .., "title": .., "content": ..}, ...]}`.
//! A 2xx answer is success and its raw text is kept. Anything else is a
//! failure whose body becomes the error payload. Retries are left to the
//! caller's call policy.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use channel_harvester_core::embedding::{EmbeddingInstance, EmbeddingRequest, EmbeddingSink};
use channel_harvester_core::models::EmbedResponse;

use crate::config::EmbeddingConfig;

/// Posts instance batches to a prediction endpoint.
pub struct HttpEmbeddingSink {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    output_path: Option<PathBuf>,
}

impl HttpEmbeddingSink {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            token: token.into(),
            output_path: None,
        })
    }

    /// Append each successful response body to `path`, one line per batch.
    pub fn with_output_path(mut self, path: Option<PathBuf>) -> Self {
        self.output_path = path;
        self
    }

    /// # Errors
    ///
    /// Fails if `embedding.endpoint` is unset or the token environment
    /// variable named by `embedding.token_env` is missing.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = match config.endpoint.as_deref() {
            Some(e) if !e.is_empty() => e,
            _ => bail!("embedding.endpoint required for http provider"),
        };
        let token = match std::env::var(&config.token_env) {
            Ok(t) if !t.is_empty() => t,
            _ => bail!("{} environment variable not set", config.token_env),
        };
        Ok(
            Self::new(endpoint, token, Duration::from_secs(config.timeout_secs))?
                .with_output_path(config.output_path.clone()),
        )
    }

    async fn append_output(&self, body: &str) -> Result<()> {
        let Some(path) = &self.output_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut line = body.replace('\n', " ");
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl EmbeddingSink for HttpEmbeddingSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn embed(&self, instances: &[EmbeddingInstance]) -> Result<EmbedResponse> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&EmbeddingRequest { instances })
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.endpoint))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read embedding response")?;

        if !status.is_success() {
            return Ok(EmbedResponse {
                ok: false,
                status: status.as_u16(),
                body,
            });
        }

        if let Err(e) = self.append_output(&body).await {
            tracing::warn!(error = %format!("{e:#}"), "could not write embedding response");
        }

        Ok(EmbedResponse {
            ok: true,
            status: status.as_u16(),
            body,
        })
    }
}

/// Instantiate the sink selected by `[embedding].provider`.
pub fn create_sink(config: &EmbeddingConfig) -> Result<Option<Arc<dyn EmbeddingSink>>> {
    if !config.is_enabled() {
        return Ok(None);
    }
    match config.provider.as_str() {
        "http" => {
            let sink: Arc<dyn EmbeddingSink> = Arc::new(HttpEmbeddingSink::from_config(config)?);
            Ok(Some(sink))
        }
        other => bail!("Unknown embedding provider: {}", other),
    }
}
