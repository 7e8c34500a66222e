//! Thread summarization glue.
//!
//! Short threads pass through verbatim; longer ones go to the injected
//! summarization capability with a bounded input window. Failures degrade
//! to an empty summary rather than failing the pipeline.

use std::sync::Arc;

use shared_types::ThreadSummary;

use crate::capability::TextSummarizer;

/// Threads at or under this combined length skip the model entirely.
const PASSTHROUGH_MAX_CHARS: usize = 100;
/// The model sees at most this much of the concatenated thread.
const MODEL_WINDOW_CHARS: usize = 1024;
const SUMMARY_MIN_TOKENS: u32 = 30;
const SUMMARY_MAX_TOKENS: u32 = 120;
/// Key-point extraction scans this much of the concatenated thread.
const KEY_POINT_WINDOW_CHARS: usize = 2000;
const MAX_KEY_POINTS: usize = 3;
/// Display excerpt length for the latest message.
const LATEST_UPDATE_MAX_CHARS: usize = 200;

pub struct ThreadSummarizer {
    summarizer: Arc<dyn TextSummarizer>,
    urgent_keywords: Vec<String>,
}

impl ThreadSummarizer {
    pub fn new(summarizer: Arc<dyn TextSummarizer>, urgent_keywords: Vec<String>) -> Self {
        Self {
            summarizer,
            urgent_keywords,
        }
    }

    /// Summarize one thread's message bodies, oldest first.
    ///
    /// Never returns an error: a failed model call yields the degraded
    /// summary (empty text, no key points, message_count 0), which callers
    /// display as "summary unavailable".
    pub async fn summarize_thread(
        &self,
        subject: &str,
        participants: Vec<String>,
        bodies: &[String],
    ) -> ThreadSummary {
        let combined = bodies.join(" ");

        let summary = if combined.chars().count() <= PASSTHROUGH_MAX_CHARS {
            combined.clone()
        } else {
            let window = truncate_chars(&combined, MODEL_WINDOW_CHARS);
            match self
                .summarizer
                .summarize(window, SUMMARY_MIN_TOKENS, SUMMARY_MAX_TOKENS)
                .await
            {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("thread summarization failed: {e}");
                    return ThreadSummary::degraded(subject);
                }
            }
        };

        ThreadSummary {
            subject: subject.to_string(),
            participants,
            summary,
            key_points: self.key_points(&combined),
            latest_update: latest_update(bodies),
            message_count: bodies.len(),
        }
    }

    /// Up to 3 sentences from the head of the thread that mention an urgent
    /// keyword, kept in original order.
    fn key_points(&self, combined: &str) -> Vec<String> {
        let window = truncate_chars(combined, KEY_POINT_WINDOW_CHARS);
        split_sentences(window)
            .into_iter()
            .filter(|sentence| {
                let lower = sentence.to_lowercase();
                self.urgent_keywords.iter().any(|k| lower.contains(k))
            })
            .take(MAX_KEY_POINTS)
            .collect()
    }
}

fn latest_update(bodies: &[String]) -> String {
    let Some(last) = bodies.last() else {
        return String::new();
    };
    if last.chars().count() <= LATEST_UPDATE_MAX_CHARS {
        last.clone()
    } else {
        format!("{}...", truncate_chars(last, LATEST_UPDATE_MAX_CHARS))
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Truncate on a character boundary; byte slicing would panic mid-codepoint.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
