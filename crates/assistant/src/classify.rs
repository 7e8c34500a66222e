//! Keyword-driven priority classification.
//!
//! The score is a linear combination of urgent-keyword hits, the backend's
//! importance flag, and the sender's historical response rate. Thresholds
//! and weights are configuration constants, not derived behavior.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared_types::{Polarity, Priority};

use crate::capability::SentimentAnalyzer;

/// How much message text is handed to the sentiment capability.
const SENTIMENT_WINDOW: usize = 512;

/// Scoring constants. Defaults follow the historical tuning; override them
/// from the config file rather than editing code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub urgent_keywords: Vec<String>,
    pub keyword_weight: u32,
    pub importance_weight: u32,
    pub history_weight: u32,
    /// Response rate strictly above this contributes the history term.
    pub history_threshold: f64,
    /// score >= this is at least Follow-up.
    pub follow_up_threshold: u32,
    /// score >= this is Urgent.
    pub urgent_threshold: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            urgent_keywords: [
                "urgent",
                "asap",
                "immediately",
                "immediate",
                "critical",
                "deadline",
                "important",
                "emergency",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            keyword_weight: 2,
            importance_weight: 3,
            history_weight: 2,
            history_threshold: 0.7,
            follow_up_threshold: 3,
            urgent_threshold: 6,
        }
    }
}

/// Outcome of classifying one message.
#[derive(Debug, Clone)]
pub struct Classification {
    pub priority: Priority,
    pub score: u32,
    pub keyword_hits: usize,
    /// Sentiment annotation for display and logging; does not feed the
    /// score. Empty when the capability is unavailable or failed.
    pub polarity: Option<Polarity>,
}

/// Scores a single message. Classification never surfaces an error: a
/// failing sub-step degrades the result, falling back to Low Priority.
pub struct PriorityClassifier {
    config: ScoringConfig,
    sentiment: Arc<dyn SentimentAnalyzer>,
}

impl PriorityClassifier {
    pub fn new(config: ScoringConfig, sentiment: Arc<dyn SentimentAnalyzer>) -> Self {
        Self { config, sentiment }
    }

    pub async fn classify(
        &self,
        subject: &str,
        body: &str,
        is_important: bool,
        response_rate: f64,
    ) -> Classification {
        let content = format!("{} {}", subject, body).to_lowercase();

        let keyword_hits = content
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .filter(|token| self.config.urgent_keywords.iter().any(|k| k == token))
            .count();

        let mut score = self.config.keyword_weight * keyword_hits as u32;
        if is_important {
            score += self.config.importance_weight;
        }
        if response_rate > self.config.history_threshold {
            score += self.config.history_weight;
        }

        let priority = if score >= self.config.urgent_threshold {
            Priority::Urgent
        } else if score >= self.config.follow_up_threshold {
            Priority::FollowUp
        } else {
            Priority::LowPriority
        };

        let polarity = match self
            .sentiment
            .polarity(truncate_chars(&content, SENTIMENT_WINDOW))
            .await
        {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::debug!("sentiment annotation skipped: {e}");
                None
            }
        };

        Classification {
            priority,
            score,
            keyword_hits,
            polarity,
        }
    }
}

/// Truncate on a character boundary; byte slicing would panic mid-codepoint.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
