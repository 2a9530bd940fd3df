//! Scripted [`MessagingApi`] for tests and offline runs.
//!
//! Responses are registered up front, keyed by cursor (history) or by thread
//! timestamp and cursor (replies). A request with no scripted response fails
//! with a transport error, so an unexpected call shows up as a failure
//! rather than an empty page. Every request is recorded for assertions.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::MessagingApi;
use crate::models::{JoinResponse, MessagesResponse, RawMessage};

type ThreadKey = (String, Option<String>);

#[derive(Default)]
pub struct ScriptedMessaging {
    history: HashMap<Option<String>, MessagesResponse>,
    threads: HashMap<ThreadKey, MessagesResponse>,
    join: Option<JoinResponse>,
    history_log: Mutex<Vec<Option<String>>>,
    replies_log: Mutex<Vec<String>>,
    join_log: Mutex<Vec<String>>,
}

impl ScriptedMessaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the history page returned for `cursor` (`None` = first page).
    pub fn page(mut self, cursor: Option<&str>, response: MessagesResponse) -> Self {
        self.history.insert(cursor.map(str::to_string), response);
        self
    }

    /// Script a single-page thread.
    pub fn thread(self, thread_ts: &str, response: MessagesResponse) -> Self {
        self.thread_page(thread_ts, None, response)
    }

    /// Script one page of a thread.
    pub fn thread_page(
        mut self,
        thread_ts: &str,
        cursor: Option<&str>,
        response: MessagesResponse,
    ) -> Self {
        self.threads.insert(
            (thread_ts.to_string(), cursor.map(str::to_string)),
            response,
        );
        self
    }

    /// Script a successful thread whose replies have the given texts.
    pub fn thread_texts(self, thread_ts: &str, texts: &[&str]) -> Self {
        let messages = texts
            .iter()
            .enumerate()
            .map(|(i, text)| RawMessage {
                user: Some("U0".to_string()),
                text: text.to_string(),
                ts: format!("{thread_ts}{i}"),
                thread_ts: Some(thread_ts.to_string()),
                reply_count: 0,
            })
            .collect();
        self.thread(thread_ts, MessagesResponse::ok(messages, None))
    }

    pub fn join_response(mut self, response: JoinResponse) -> Self {
        self.join = Some(response);
        self
    }

    /// Cursors of every history request, in call order.
    pub fn history_cursors(&self) -> Vec<Option<String>> {
        self.history_log
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    pub fn history_calls(&self) -> usize {
        self.history_cursors().len()
    }

    /// Thread timestamps of every replies request, in call order.
    pub fn replies_requests(&self) -> Vec<String> {
        self.replies_log
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    pub fn join_requests(&self) -> Vec<String> {
        self.join_log.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

fn record<T>(log: &Mutex<Vec<T>>, entry: T) -> Result<()> {
    log.lock()
        .map_err(|_| anyhow!("scripted messaging log poisoned"))?
        .push(entry);
    Ok(())
}

#[async_trait]
impl MessagingApi for ScriptedMessaging {
    async fn history(&self, channel: &str, cursor: Option<&str>) -> Result<MessagesResponse> {
        let key = cursor.map(str::to_string);
        record(&self.history_log, key.clone())?;
        self.history
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow!("no scripted history for {} at cursor {:?}", channel, cursor))
    }

    async fn replies(
        &self,
        channel: &str,
        thread_ts: &str,
        cursor: Option<&str>,
    ) -> Result<MessagesResponse> {
        record(&self.replies_log, thread_ts.to_string())?;
        self.threads
            .get(&(thread_ts.to_string(), cursor.map(str::to_string)))
            .cloned()
            .ok_or_else(|| anyhow!("no scripted thread {} in {}", thread_ts, channel))
    }

    async fn join(&self, channel: &str) -> Result<JoinResponse> {
        record(&self.join_log, channel.to_string())?;
        Ok(self.join.clone().unwrap_or(JoinResponse {
            ok: true,
            error: None,
        }))
    }
}
