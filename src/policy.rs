//! Call policies for downstream requests.
//!
//! Every call site in the pipeline goes through a [`CallPolicy`], which owns
//! the retry count, the backoff, and an optional timeout. The default policy
//! performs a single attempt with no timeout.
//!
//! # Retry Strategy
//!
//! An attempt is retried when it returns `Err`, times out, or returns a
//! reply whose [`ApiReply::is_ok`] is false. Backoff doubles per attempt:
//! `backoff, 2×backoff, 4×backoff, …`, capped at `32×backoff`.
//!
//! After the last attempt a failed reply is still returned as `Ok` so the
//! caller can inspect it (a failed history page may still carry a cursor).

use std::future::Future;
use std::time::Duration;

use channel_harvester_core::models::ApiReply;

use crate::config::{PolicyConfig, PolicySettings};
use crate::error::UpstreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    pub timeout: Option<Duration>,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::single_attempt()
    }
}

impl From<PolicySettings> for CallPolicy {
    fn from(s: PolicySettings) -> Self {
        Self {
            max_retries: s.max_retries,
            backoff: s.backoff(),
            timeout: s.timeout(),
        }
    }
}

impl CallPolicy {
    /// One attempt, no timeout.
    pub fn single_attempt() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
            timeout: None,
        }
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * (1u32 << (attempt - 1).min(5))
    }

    /// Run `call` under this policy.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, UpstreamError>
    where
        T: ApiReply,
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                tokio::time::sleep(self.delay_for(attempt)).await;
            }

            let outcome = match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, call()).await {
                    Ok(result) => result.map_err(|e| UpstreamError::transport(operation, &e)),
                    Err(_) => Err(UpstreamError::Timeout {
                        operation,
                        after: limit,
                    }),
                },
                None => call()
                    .await
                    .map_err(|e| UpstreamError::transport(operation, &e)),
            };

            let retryable = match &outcome {
                Ok(reply) => !reply.is_ok(),
                Err(_) => true,
            };
            if !retryable || attempt >= self.max_retries {
                return outcome;
            }

            attempt += 1;
            match &outcome {
                Ok(reply) => tracing::debug!(
                    operation,
                    attempt,
                    error = reply.error().unwrap_or("unknown_error"),
                    "retrying after failed reply"
                ),
                Err(e) => tracing::debug!(operation, attempt, error = %e, "retrying after error"),
            }
        }
    }
}

/// One policy per downstream operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Policies {
    pub history: CallPolicy,
    pub replies: CallPolicy,
    pub join: CallPolicy,
    pub store: CallPolicy,
    pub embed: CallPolicy,
}

impl Policies {
    pub fn from_config(config: &PolicyConfig) -> Self {
        let pick = |o: Option<PolicySettings>| CallPolicy::from(o.unwrap_or(config.default));
        Self {
            history: pick(config.history),
            replies: pick(config.replies),
            join: pick(config.join),
            store: pick(config.store),
            embed: pick(config.embed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use channel_harvester_core::models::PutResponse;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn single_attempt_returns_failed_reply() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = CallPolicy::single_attempt()
            .run("test.op", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(PutResponse::failed("ratelimited"))
            })
            .await
            .unwrap();
        assert!(!result.ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = CallPolicy::single_attempt().with_retries(3, Duration::ZERO);
        let result = policy
            .run("test.op", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Ok(PutResponse::failed("ratelimited"))
                } else {
                    Ok(PutResponse::ok())
                }
            })
            .await
            .unwrap();
        assert!(result.ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_last_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = CallPolicy::single_attempt().with_retries(2, Duration::ZERO);
        let err = policy
            .run("test.op", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<PutResponse, _>(anyhow::anyhow!("connection reset"))
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, UpstreamError::Transport { operation: "test.op", .. }));
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        let policy = CallPolicy::single_attempt().with_timeout(Duration::from_millis(20));
        let err = policy
            .run("test.op", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(PutResponse::ok())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Timeout { .. }));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = CallPolicy::single_attempt().with_retries(10, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(9), Duration::from_millis(3200));
    }

    #[test]
    fn overrides_fall_back_to_default() {
        let config = PolicyConfig {
            default: PolicySettings {
                max_retries: 2,
                backoff_ms: 50,
                timeout_secs: None,
            },
            embed: Some(PolicySettings {
                max_retries: 0,
                backoff_ms: 0,
                timeout_secs: Some(60),
            }),
            ..Default::default()
        };
        let policies = Policies::from_config(&config);
        assert_eq!(policies.history.max_retries, 2);
        assert_eq!(policies.store.backoff, Duration::from_millis(50));
        assert_eq!(policies.embed.max_retries, 0);
        assert_eq!(policies.embed.timeout, Some(Duration::from_secs(60)));
    }
}
