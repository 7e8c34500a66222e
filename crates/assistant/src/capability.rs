//! Model capabilities as injected service objects.
//!
//! The classifier, summarizer, and chat dispatcher never talk to a model
//! backend directly; they hold `Arc<dyn ...>` capabilities constructed at
//! startup. `Unavailable` is the explicit null-object used when no
//! inference endpoint is configured, so degraded-mode behavior is
//! type-checked instead of implicit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::Polarity;
use std::time::Duration;

use crate::error::{Error, Result};

/// Text → polarity label.
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    async fn polarity(&self, text: &str) -> Result<Polarity>;
}

/// Text + token bounds → condensed text.
#[async_trait]
pub trait TextSummarizer: Send + Sync {
    async fn summarize(&self, text: &str, min_tokens: u32, max_tokens: u32) -> Result<String>;
}

/// Prompt → continuation.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

/// Null-object capability: every call reports the capability as
/// unavailable. Callers degrade to their documented safe defaults.
pub struct Unavailable;

#[async_trait]
impl SentimentAnalyzer for Unavailable {
    async fn polarity(&self, _text: &str) -> Result<Polarity> {
        Err(Error::CapabilityUnavailable("sentiment"))
    }
}

#[async_trait]
impl TextSummarizer for Unavailable {
    async fn summarize(&self, _text: &str, _min: u32, _max: u32) -> Result<String> {
        Err(Error::CapabilityUnavailable("summarization"))
    }
}

#[async_trait]
impl ReplyGenerator for Unavailable {
    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
        Err(Error::CapabilityUnavailable("text-generation"))
    }
}

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    text: &'a str,
    min_tokens: u32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct SummarizeResponse {
    summary: String,
}

#[derive(Serialize)]
struct SentimentRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct SentimentResponse {
    label: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    text: String,
}

/// HTTP client for a local model inference service exposing
/// `/v1/sentiment`, `/v1/summarize`, and `/v1/generate`.
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Capability(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        request: &Req,
    ) -> Result<Resp> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Capability(format!("request to {url} failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Capability(format!("inference service error: {e}")))?;

        response
            .json::<Resp>()
            .await
            .map_err(|e| Error::Capability(format!("malformed response from {url}: {e}")))
    }
}

#[async_trait]
impl SentimentAnalyzer for InferenceClient {
    async fn polarity(&self, text: &str) -> Result<Polarity> {
        let resp: SentimentResponse = self.post("/v1/sentiment", &SentimentRequest { text }).await?;
        Polarity::from_label(&resp.label)
            .ok_or_else(|| Error::Capability(format!("unexpected sentiment label: {}", resp.label)))
    }
}

#[async_trait]
impl TextSummarizer for InferenceClient {
    async fn summarize(&self, text: &str, min_tokens: u32, max_tokens: u32) -> Result<String> {
        let resp: SummarizeResponse = self
            .post(
                "/v1/summarize",
                &SummarizeRequest {
                    text,
                    min_tokens,
                    max_tokens,
                },
            )
            .await?;
        Ok(resp.summary)
    }
}

#[async_trait]
impl ReplyGenerator for InferenceClient {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let resp: GenerateResponse = self
            .post("/v1/generate", &GenerateRequest { prompt, max_tokens })
            .await?;
        Ok(resp.text)
    }
}
