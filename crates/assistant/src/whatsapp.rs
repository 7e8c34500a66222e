//! WhatsApp assistant: one dispatcher over a variant-tagged action enum.
//!
//! Actions arrive either as explicit numeric codes from the webhook surface
//! or from a pluggable selection strategy; both funnel into the same
//! [`ChatAction`] dispatch. Reply generation degrades to a canned response,
//! while the outbound send itself propagates failures.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use shared_types::{ChatAction, SenderLedger};

use crate::capability::{ReplyGenerator, TextSummarizer};
use crate::config::TwilioSecrets;
use crate::error::{Error, Result};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
const GENERATION_MAX_TOKENS: u32 = 50;
const SUMMARY_MIN_TOKENS: u32 = 30;
const SUMMARY_MAX_TOKENS: u32 = 100;
const BASIC_RESPONSE: &str = "This is a basic customer service response.";
const INVALID_ACTION_RESPONSE: &str = "Invalid action. Please select a valid option.";

/// An inbound chat message as delivered by the webhook.
#[derive(Debug, Clone)]
pub struct IncomingChat {
    /// Sender number, without the `whatsapp:` prefix.
    pub from: String,
    pub body: String,
}

/// Outbound chat transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a message; returns the provider's message SID.
    async fn send_message(&self, to: &str, body: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
}

/// Twilio REST client for the WhatsApp channel.
pub struct TwilioClient {
    http: reqwest::Client,
    secrets: TwilioSecrets,
}

impl TwilioClient {
    pub fn new(secrets: TwilioSecrets) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::WhatsApp(format!("failed to build http client: {e}")))?;
        Ok(Self { http, secrets })
    }
}

#[async_trait]
impl ChatTransport for TwilioClient {
    async fn send_message(&self, to: &str, body: &str) -> Result<String> {
        let url = format!(
            "{TWILIO_API_BASE}/Accounts/{}/Messages.json",
            self.secrets.account_sid
        );
        let form = [
            ("From", format!("whatsapp:{}", self.secrets.from_number)),
            ("To", format!("whatsapp:{to}")),
            ("Body", body.to_string()),
        ];

        let resp: TwilioMessageResponse = self
            .http
            .post(&url)
            .basic_auth(&self.secrets.account_sid, Some(&self.secrets.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Send(format!("twilio request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Send(format!("twilio rejected message: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Send(format!("twilio payload: {e}")))?;

        Ok(resp.sid)
    }
}

/// Pluggable action selection for messages arriving without an explicit
/// action code.
pub trait ActionStrategy: Send + Sync {
    fn decide(&self, chat: &IncomingChat, ledger: &SenderLedger) -> ChatAction;
}

/// Default heuristics: summarize long chats, smart-reply to frequent
/// senders, answer everything else as a basic query.
pub struct HeuristicStrategy {
    pub long_chat_chars: usize,
    pub long_chat_lines: usize,
    pub frequent_sender_min: u64,
}

impl Default for HeuristicStrategy {
    fn default() -> Self {
        Self {
            long_chat_chars: 400,
            long_chat_lines: 3,
            frequent_sender_min: 5,
        }
    }
}

impl HeuristicStrategy {
    fn is_long_chat(&self, chat: &IncomingChat) -> bool {
        chat.body.chars().count() > self.long_chat_chars
            || chat.body.lines().count() > self.long_chat_lines
    }

    fn is_frequent_query(&self, chat: &IncomingChat, ledger: &SenderLedger) -> bool {
        ledger
            .get(&chat.from)
            .is_some_and(|r| r.total_messages >= self.frequent_sender_min)
    }
}

impl ActionStrategy for HeuristicStrategy {
    fn decide(&self, chat: &IncomingChat, ledger: &SenderLedger) -> ChatAction {
        if self.is_long_chat(chat) {
            ChatAction::Summarize
        } else if self.is_frequent_query(chat, ledger) {
            ChatAction::SmartReply
        } else {
            ChatAction::BasicQuery
        }
    }
}

/// Result of handling one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The action that was dispatched and replied to.
    Replied(ChatAction),
    /// The caller supplied an unrecognized action code; the sender was told
    /// so.
    InvalidAction,
}

pub struct WhatsAppAssistant {
    transport: Arc<dyn ChatTransport>,
    generator: Arc<dyn ReplyGenerator>,
    summarizer: Arc<dyn TextSummarizer>,
    strategy: Box<dyn ActionStrategy>,
}

impl WhatsAppAssistant {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        generator: Arc<dyn ReplyGenerator>,
        summarizer: Arc<dyn TextSummarizer>,
        strategy: Box<dyn ActionStrategy>,
    ) -> Self {
        Self {
            transport,
            generator,
            summarizer,
            strategy,
        }
    }

    /// Handle one inbound message. An explicit action code wins over the
    /// strategy; an unrecognized code produces the invalid-action reply.
    /// The reply send is the only error that propagates.
    pub async fn handle_incoming(
        &self,
        chat: &IncomingChat,
        action_code: Option<&str>,
        ledger: &SenderLedger,
    ) -> Result<ChatOutcome> {
        let action = match action_code {
            Some(code) => match ChatAction::from_code(code) {
                Some(action) => action,
                None => {
                    self.transport
                        .send_message(&chat.from, INVALID_ACTION_RESPONSE)
                        .await?;
                    return Ok(ChatOutcome::InvalidAction);
                }
            },
            None => self.strategy.decide(chat, ledger),
        };

        let reply = match action {
            ChatAction::SmartReply => self.smart_reply(&chat.body).await,
            ChatAction::Summarize => self.summarize(&chat.body).await,
            ChatAction::BasicQuery => BASIC_RESPONSE.to_string(),
        };

        self.transport.send_message(&chat.from, &reply).await?;
        Ok(ChatOutcome::Replied(action))
    }

    async fn smart_reply(&self, message: &str) -> String {
        match self.generator.generate(message, GENERATION_MAX_TOKENS).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("smart reply generation failed: {e}");
                BASIC_RESPONSE.to_string()
            }
        }
    }

    async fn summarize(&self, conversation: &str) -> String {
        match self
            .summarizer
            .summarize(conversation, SUMMARY_MIN_TOKENS, SUMMARY_MAX_TOKENS)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("conversation summarization failed: {e}");
                BASIC_RESPONSE.to_string()
            }
        }
    }
}
