//! Canned reply suggestions.
//!
//! Rules run in a fixed order and each appends at most once; the final list
//! keeps rule-application order. Template texts come from a built-in set or
//! from a JSON template file; the file-driven variant caps its output at 5.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use shared_types::{Suggestion, SuggestionKind};

use crate::error::{Error, Result};

const MEETING_WORDS: &[&str] = &["meet", "meeting", "appointment", "schedule", "calendar"];
const INQUIRY_WORDS: &[&str] = &["question", "inquiry", "help", "information", "details"];

/// Maximum suggestions returned by the template-file variant.
const TEMPLATE_FILE_CAP: usize = 5;

/// Context fields the suggester consults alongside the message content.
#[derive(Debug, Clone, Copy)]
pub struct MessageContext<'a> {
    pub subject: &'a str,
    /// Raw `From` header value; empty when unknown.
    pub sender: &'a str,
    pub is_important: bool,
}

/// Reply template texts. The personal template carries `{name}` and
/// `{subject}` placeholders.
#[derive(Debug, Clone)]
struct TemplateSet {
    acknowledgment: String,
    meeting_accept: String,
    meeting_reject: String,
    more_info: String,
    personal: String,
    priority: String,
}

impl TemplateSet {
    fn builtin() -> Self {
        Self {
            acknowledgment: "Thank you for your email. I've received it and will get back to \
                             you shortly."
                .into(),
            meeting_accept: "I'd be happy to meet with you. The proposed time works for me."
                .into(),
            meeting_reject: "Unfortunately, I won't be able to make that time. Could we find \
                             an alternative?"
                .into(),
            more_info: "Thank you for reaching out. Could you provide some additional details \
                        so I can better assist you?"
                .into(),
            personal: "Hi {name}, thanks for your email about '{subject}'. I'll look into \
                       this and get back to you as soon as possible."
                .into(),
            priority: "I see this is an important matter. I'm prioritizing it and will \
                       address it promptly."
                .into(),
        }
    }

    /// Overlay templates from a JSON file: `{"acknowledgment": [...],
    /// "meeting": [accept, reject], "inquiry": [...], "personal": [...],
    /// "urgent": [...]}`. Missing keys keep the built-in text; the first
    /// entry of each list wins.
    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read templates {}: {e}", path.display())))?;
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("parse templates {}: {e}", path.display())))?;

        let mut set = Self::builtin();
        let first = |key: &str| raw.get(key).and_then(|v| v.first()).cloned();
        let nth = |key: &str, i: usize| raw.get(key).and_then(|v| v.get(i)).cloned();

        if let Some(t) = first("acknowledgment") {
            set.acknowledgment = t;
        }
        if let Some(t) = nth("meeting", 0) {
            set.meeting_accept = t;
        }
        if let Some(t) = nth("meeting", 1) {
            set.meeting_reject = t;
        }
        if let Some(t) = first("inquiry") {
            set.more_info = t;
        }
        if let Some(t) = first("personal") {
            set.personal = t;
        }
        if let Some(t) = first("urgent") {
            set.priority = t;
        }
        Ok(set)
    }
}

#[derive(Debug)]
pub struct ResponseSuggester {
    templates: TemplateSet,
    cap: Option<usize>,
}

impl ResponseSuggester {
    /// Built-in templates, uncapped output.
    pub fn builtin() -> Self {
        Self {
            templates: TemplateSet::builtin(),
            cap: None,
        }
    }

    /// Template-file variant; output capped at 5.
    pub fn from_template_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            templates: TemplateSet::from_file(path.as_ref())?,
            cap: Some(TEMPLATE_FILE_CAP),
        })
    }

    /// Apply the suggestion rules in order. Each rule fires at most once;
    /// nothing is deduplicated afterwards.
    pub fn suggest(&self, content: &str, ctx: &MessageContext<'_>) -> Vec<Suggestion> {
        let lower = content.to_lowercase();
        let mut suggestions = vec![Suggestion {
            kind: SuggestionKind::Acknowledgment,
            text: self.templates.acknowledgment.clone(),
        }];

        if MEETING_WORDS.iter().any(|w| lower.contains(w)) {
            suggestions.push(Suggestion {
                kind: SuggestionKind::MeetingAccept,
                text: self.templates.meeting_accept.clone(),
            });
            suggestions.push(Suggestion {
                kind: SuggestionKind::MeetingReject,
                text: self.templates.meeting_reject.clone(),
            });
        }

        if content.contains('?') || INQUIRY_WORDS.iter().any(|w| lower.contains(w)) {
            suggestions.push(Suggestion {
                kind: SuggestionKind::MoreInfo,
                text: self.templates.more_info.clone(),
            });
        }

        if !ctx.sender.is_empty() {
            let name = match ctx.sender.split_once('<') {
                Some((name, _)) => name.trim(),
                None => ctx.sender.trim(),
            };
            suggestions.push(Suggestion {
                kind: SuggestionKind::CustomPersonal,
                text: self
                    .templates
                    .personal
                    .replace("{name}", name)
                    .replace("{subject}", ctx.subject),
            });
        }

        if ctx.is_important {
            suggestions.push(Suggestion {
                kind: SuggestionKind::PriorityResponse,
                text: self.templates.priority.clone(),
            });
        }

        if let Some(cap) = self.cap {
            suggestions.truncate(cap);
        }
        suggestions
    }
}
