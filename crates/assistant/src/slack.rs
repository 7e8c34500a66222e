//! Slack channel components: conversation summarization, daily digest,
//! message-to-task extraction, and smart search.
//!
//! All fetch paths degrade to empty results with a log line; only posting
//! back to a channel propagates its failure, like any other send.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::TextSummarizer;
use crate::config::SlackSecrets;
use crate::error::{Error, Result};

const SLACK_API_BASE: &str = "https://slack.com/api";
/// Conversations under this many words are returned verbatim instead of
/// being summarized.
const SUMMARY_MIN_WORDS: usize = 30;
const SUMMARY_MAX_TOKENS: u32 = 120;
const SEARCH_COUNT: u32 = 20;

/// One message from a channel history or search response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackMessage {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    messages: Vec<SlackMessage>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    ok: bool,
    error: Option<String>,
    messages: Option<SearchMatches>,
}

#[derive(Debug, Deserialize)]
struct SearchMatches {
    #[serde(default)]
    matches: Vec<SlackMessage>,
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

/// Thin client over the Slack Web API.
pub struct SlackClient {
    http: reqwest::Client,
    bot_token: String,
    user_token: String,
}

impl SlackClient {
    pub fn new(secrets: &SlackSecrets) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Slack(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            bot_token: secrets.bot_token.clone(),
            user_token: secrets.user_token.clone(),
        })
    }

    pub async fn conversations_history(
        &self,
        channel: &str,
        oldest: Option<f64>,
    ) -> Result<Vec<SlackMessage>> {
        let mut query = vec![("channel", channel.to_string())];
        if let Some(oldest) = oldest {
            query.push(("oldest", oldest.to_string()));
        }

        let resp: HistoryResponse = self
            .http
            .get(format!("{SLACK_API_BASE}/conversations.history"))
            .bearer_auth(&self.bot_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::Slack(format!("conversations.history: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Slack(format!("conversations.history payload: {e}")))?;

        if !resp.ok {
            return Err(Error::Slack(format!(
                "conversations.history: {}",
                resp.error.unwrap_or_else(|| "unknown error".into())
            )));
        }
        Ok(resp.messages)
    }

    /// Search messages, newest first. Requires the user token.
    pub async fn search_messages(&self, query: &str, count: u32) -> Result<Vec<SlackMessage>> {
        let resp: SearchResponse = self
            .http
            .get(format!("{SLACK_API_BASE}/search.messages"))
            .bearer_auth(&self.user_token)
            .query(&[
                ("query", query),
                ("count", &count.to_string()),
                ("sort", "timestamp"),
                ("sort_dir", "desc"),
            ])
            .send()
            .await
            .map_err(|e| Error::Slack(format!("search.messages: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Slack(format!("search.messages payload: {e}")))?;

        if !resp.ok {
            return Err(Error::Slack(format!(
                "search.messages: {}",
                resp.error.unwrap_or_else(|| "unknown error".into())
            )));
        }
        Ok(resp.messages.map(|m| m.matches).unwrap_or_default())
    }

    /// Post to a channel. Failures propagate as send errors.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<()> {
        let resp: PostMessageResponse = self
            .http
            .post(format!("{SLACK_API_BASE}/chat.postMessage"))
            .bearer_auth(&self.bot_token)
            .json(&PostMessageRequest { channel, text })
            .send()
            .await
            .map_err(|e| Error::Send(format!("chat.postMessage: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Send(format!("chat.postMessage payload: {e}")))?;

        if !resp.ok {
            return Err(Error::Send(format!(
                "chat.postMessage: {}",
                resp.error.unwrap_or_else(|| "unknown error".into())
            )));
        }
        Ok(())
    }
}

/// Summarizes a channel's recent conversation through the summarization
/// capability.
pub struct SlackSummarizer {
    client: Arc<SlackClient>,
    summarizer: Arc<dyn TextSummarizer>,
}

impl SlackSummarizer {
    pub fn new(client: Arc<SlackClient>, summarizer: Arc<dyn TextSummarizer>) -> Self {
        Self { client, summarizer }
    }

    pub async fn summarize_channel(&self, channel: &str) -> String {
        let messages = match self.client.conversations_history(channel, None).await {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("failed to fetch conversations: {e}");
                return String::new();
            }
        };
        self.summarize_messages(&messages).await
    }

    /// Short conversations pass through verbatim; longer ones go to the
    /// model with the token ceiling tied to the input length. Failure
    /// degrades to an empty summary.
    pub async fn summarize_messages(&self, messages: &[SlackMessage]) -> String {
        let text = join_texts(messages);
        let words = text.split_whitespace().count();
        if words < SUMMARY_MIN_WORDS {
            return text;
        }

        let max_tokens = SUMMARY_MAX_TOKENS.min(words as u32);
        match self
            .summarizer
            .summarize(&text, SUMMARY_MIN_WORDS as u32, max_tokens)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("conversation summarization failed: {e}");
                String::new()
            }
        }
    }
}

/// Formats a day's worth of channel traffic as a plain-text digest.
pub struct SlackDailyDigest {
    client: Arc<SlackClient>,
    days: i64,
}

impl SlackDailyDigest {
    pub fn new(client: Arc<SlackClient>, days: i64) -> Self {
        Self { client, days }
    }

    pub async fn fetch_daily(&self, channel: &str) -> Vec<SlackMessage> {
        let oldest = (Utc::now() - Duration::days(self.days)).timestamp() as f64;
        match self.client.conversations_history(channel, Some(oldest)).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("failed to fetch daily conversations: {e}");
                Vec::new()
            }
        }
    }

    pub fn format_digest(messages: &[SlackMessage]) -> String {
        messages
            .iter()
            .map(|m| {
                format!(
                    "{} - {}: {}",
                    format_ts(&m.ts),
                    m.user.as_deref().unwrap_or("Unknown"),
                    m.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn send(&self, channel: &str, digest: &str) -> Result<()> {
        self.client.post_message(channel, digest).await
    }
}

/// A task extracted from channel traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    pub user: String,
    pub text: String,
    pub timestamp: String,
}

/// Converts messages that look like tasks into task records.
pub struct SlackMessageToTask {
    client: Arc<SlackClient>,
}

impl SlackMessageToTask {
    pub fn new(client: Arc<SlackClient>) -> Self {
        Self { client }
    }

    pub async fn extract_tasks(&self, channel: &str, days: i64) -> Vec<TaskRecord> {
        let oldest = (Utc::now() - Duration::days(days)).timestamp() as f64;
        let messages = match self.client.conversations_history(channel, Some(oldest)).await {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("failed to fetch messages for task extraction: {e}");
                return Vec::new();
            }
        };
        messages.iter().filter_map(message_to_task).collect()
    }
}

/// Messages containing the word "task" become tasks.
pub fn message_to_task(message: &SlackMessage) -> Option<TaskRecord> {
    if !message.text.to_lowercase().contains("task") {
        return None;
    }
    Some(TaskRecord {
        user: message.user.clone().unwrap_or_else(|| "Unknown".into()),
        text: message.text.clone(),
        timestamp: format_ts(&message.ts),
    })
}

/// Keyword search over workspace messages, formatted for display.
pub struct SlackSmartSearch {
    client: Arc<SlackClient>,
}

impl SlackSmartSearch {
    pub fn new(client: Arc<SlackClient>) -> Self {
        Self { client }
    }

    pub async fn search(&self, query: &str) -> Vec<SlackMessage> {
        match self.client.search_messages(query, SEARCH_COUNT).await {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("search failed: {e}");
                Vec::new()
            }
        }
    }

    pub fn format_results(messages: &[SlackMessage]) -> String {
        messages
            .iter()
            .map(|m| {
                format!(
                    "{} - {}: {}",
                    m.ts,
                    m.user.as_deref().unwrap_or("Unknown"),
                    m.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn join_texts(messages: &[SlackMessage]) -> String {
    messages
        .iter()
        .map(|m| m.text.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a Slack `ts` value ("1712345678.000200") as a local-free wall
/// clock string; unparseable values fall back to the raw ts.
fn format_ts(ts: &str) -> String {
    let Ok(seconds) = ts.split('.').next().unwrap_or(ts).parse::<i64>() else {
        return ts.to_string();
    };
    match Utc.timestamp_opt(seconds, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => ts.to_string(),
    }
}
