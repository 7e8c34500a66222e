use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single email message as fetched from the mail backend.
///
/// Transient: extracted fields only, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    /// Raw `From` header value, e.g. `"Jane Doe <jane@example.com>"`.
    pub from: String,
    pub body: String,
    pub is_important: bool,
    pub labels: Vec<String>,
}

impl EmailMessage {
    /// Bare sender address extracted from the `From` header.
    ///
    /// `"Name <a@b.com>"` → `"a@b.com"`; a bare address passes through.
    pub fn sender_address(&self) -> &str {
        if let Some(start) = self.from.rfind('<') {
            if let Some(end) = self.from[start..].find('>') {
                return &self.from[start + 1..start + end];
            }
        }
        self.from.trim()
    }

    /// Display name portion of the `From` header (text before any `<`).
    pub fn sender_name(&self) -> &str {
        match self.from.split_once('<') {
            Some((name, _)) => name.trim(),
            None => self.from.trim(),
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn is_unread(&self) -> bool {
        self.has_label("UNREAD")
    }
}

/// Priority label produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Urgent,
    FollowUp,
    LowPriority,
}

impl Priority {
    pub fn as_str(&self) -> &str {
        match self {
            Priority::Urgent => "Urgent",
            Priority::FollowUp => "Follow-up",
            Priority::LowPriority => "Low Priority",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Urgent" => Some(Priority::Urgent),
            "Follow-up" => Some(Priority::FollowUp),
            "Low Priority" => Some(Priority::LowPriority),
            _ => None,
        }
    }
}

/// Condensed view of one email thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub subject: String,
    pub participants: Vec<String>,
    pub summary: String,
    /// Up to 3 sentences containing an urgent keyword, in original order.
    pub key_points: Vec<String>,
    /// Last message body truncated for display.
    pub latest_update: String,
    pub message_count: usize,
}

impl ThreadSummary {
    /// The safe default returned when summarization fails: empty summary,
    /// no key points, message_count 0. Callers treat this as "summary
    /// unavailable" rather than an error.
    pub fn degraded(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }
}

/// Fixed vocabulary of reply suggestion kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Acknowledgment,
    MeetingAccept,
    MeetingReject,
    MoreInfo,
    CustomPersonal,
    PriorityResponse,
}

impl SuggestionKind {
    pub fn as_str(&self) -> &str {
        match self {
            SuggestionKind::Acknowledgment => "acknowledgment",
            SuggestionKind::MeetingAccept => "meeting_accept",
            SuggestionKind::MeetingReject => "meeting_reject",
            SuggestionKind::MoreInfo => "more_info",
            SuggestionKind::CustomPersonal => "custom_personal",
            SuggestionKind::PriorityResponse => "priority_response",
        }
    }
}

/// One ranked reply suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub text: String,
}

/// Whether a flagged message has been answered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Unanswered,
    Read,
}

/// How the reminder time was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Default,
    Custom,
}

/// Pending-reminder state for one message, stored under its sender's record.
///
/// Entries are retired by clearing `flagged`, never physically removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderEntry {
    pub flagged: bool,
    pub status: ReminderStatus,
    pub reminder_time: DateTime<Utc>,
    pub reminder_type: ReminderKind,
    /// Cached display string; the message itself is not persisted.
    pub subject: String,
}

impl ReminderEntry {
    pub fn new(
        reminder_time: DateTime<Utc>,
        kind: ReminderKind,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            flagged: true,
            status: ReminderStatus::Unanswered,
            reminder_time,
            reminder_type: kind,
            subject: subject.into(),
        }
    }

    /// A reminder fires only while still flagged, still unanswered, and past
    /// its scheduled time. Listing due entries never consumes them.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.flagged && self.status == ReminderStatus::Unanswered && self.reminder_time <= now
    }

    /// Snooze: move the scheduled time, keep the entry pending.
    pub fn reschedule(&mut self, reminder_time: DateTime<Utc>, kind: ReminderKind) {
        self.reminder_time = reminder_time;
        self.reminder_type = kind;
        self.flagged = true;
    }

    /// Backend-side read detection: the status guard skips the entry in
    /// sweeps from here on; `flagged` is left untouched.
    pub fn mark_read(&mut self) {
        self.status = ReminderStatus::Read;
    }

    /// Explicit user dismissal from the due-reminder prompt.
    pub fn dismiss(&mut self) {
        self.flagged = false;
    }
}

/// Persisted per-sender interaction statistics and reminder state.
///
/// Serialized field names match the behavior-store file format
/// (`total_emails` on disk, `total_messages` in code).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderRecord {
    #[serde(rename = "total_emails")]
    pub total_messages: u64,
    pub responses: u64,
    pub response_rate: f64,
    pub last_interaction: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminders: BTreeMap<String, ReminderEntry>,
}

impl Default for SenderRecord {
    fn default() -> Self {
        Self {
            total_messages: 0,
            responses: 0,
            response_rate: 0.0,
            last_interaction: None,
            reminders: BTreeMap::new(),
        }
    }
}

impl SenderRecord {
    /// Count one processed message from this sender.
    pub fn record_message(&mut self, now: DateTime<Utc>) {
        self.total_messages += 1;
        self.last_interaction = Some(now);
        self.recompute_rate();
    }

    /// Count one reply sent to this sender.
    pub fn record_response(&mut self, now: DateTime<Utc>) {
        self.responses += 1;
        self.last_interaction = Some(now);
        self.recompute_rate();
    }

    /// response_rate is derived state: always responses / total_messages,
    /// 0.0 while no messages have been seen.
    fn recompute_rate(&mut self) {
        self.response_rate = if self.total_messages == 0 {
            0.0
        } else {
            self.responses as f64 / self.total_messages as f64
        };
    }
}

/// The full behavior store: sender address → record. Loaded and saved as a
/// whole; last writer wins on the entire mapping.
pub type SenderLedger = BTreeMap<String, SenderRecord>;

/// Sentiment polarity label from the classification capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl Polarity {
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "POSITIVE" => Some(Polarity::Positive),
            "NEGATIVE" => Some(Polarity::Negative),
            "NEUTRAL" => Some(Polarity::Neutral),
            _ => None,
        }
    }
}

/// What to do with an incoming chat message.
///
/// One variant-tagged enum consumed by a single dispatcher, whether the
/// action came from an explicit numeric code or a heuristic strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAction {
    SmartReply,
    Summarize,
    BasicQuery,
}

impl ChatAction {
    /// Parse the numeric action codes used by the chat webhook surface.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "1" => Some(ChatAction::SmartReply),
            "2" => Some(ChatAction::Summarize),
            "3" => Some(ChatAction::BasicQuery),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn sender_address_extraction() {
        let msg = EmailMessage {
            from: "Jane Doe <jane@example.com>".into(),
            ..Default::default()
        };
        assert_eq!(msg.sender_address(), "jane@example.com");
        assert_eq!(msg.sender_name(), "Jane Doe");

        let bare = EmailMessage {
            from: "  bob@example.com ".into(),
            ..Default::default()
        };
        assert_eq!(bare.sender_address(), "bob@example.com");
        assert_eq!(bare.sender_name(), "bob@example.com");
    }

    #[test]
    fn response_rate_tracks_counters() {
        let mut rec = SenderRecord::default();
        assert_eq!(rec.response_rate, 0.0);

        rec.record_message(t0());
        rec.record_message(t0());
        rec.record_message(t0());
        rec.record_response(t0());
        rec.record_response(t0());

        assert_eq!(rec.total_messages, 3);
        assert_eq!(rec.responses, 2);
        assert!((rec.response_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(rec.last_interaction, Some(t0()));
    }

    #[test]
    fn reminder_due_boundary() {
        let entry = ReminderEntry::new(t0(), ReminderKind::Default, "subj");
        // Exactly at the scheduled time: due.
        assert!(entry.is_due(t0()));
        // One microsecond early: not due.
        assert!(!entry.is_due(t0() - chrono::Duration::microseconds(1)));
    }

    #[test]
    fn read_status_blocks_due_but_keeps_flag() {
        let mut entry = ReminderEntry::new(t0(), ReminderKind::Default, "subj");
        entry.mark_read();
        assert!(entry.flagged);
        assert!(!entry.is_due(t0() + chrono::Duration::hours(1)));
    }

    #[test]
    fn dismiss_clears_flag() {
        let mut entry = ReminderEntry::new(t0(), ReminderKind::Custom, "subj");
        entry.dismiss();
        assert!(!entry.is_due(t0() + chrono::Duration::hours(1)));
        assert_eq!(entry.status, ReminderStatus::Unanswered);
    }

    #[test]
    fn reschedule_keeps_entry_pending() {
        let mut entry = ReminderEntry::new(t0(), ReminderKind::Default, "subj");
        let later = t0() + chrono::Duration::hours(5);
        entry.reschedule(later, ReminderKind::Custom);
        assert!(entry.flagged);
        assert_eq!(entry.reminder_type, ReminderKind::Custom);
        assert!(!entry.is_due(later - chrono::Duration::minutes(1)));
        assert!(entry.is_due(later));
    }

    #[test]
    fn sender_record_file_format() {
        let mut rec = SenderRecord::default();
        rec.record_message(t0());
        rec.reminders.insert(
            "msg-1".into(),
            ReminderEntry::new(t0(), ReminderKind::Default, "Quarterly report"),
        );

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["total_emails"], 1);
        assert_eq!(json["reminders"]["msg-1"]["status"], "unanswered");
        assert_eq!(json["reminders"]["msg-1"]["reminder_type"], "default");

        let back: SenderRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn priority_str_roundtrip() {
        for p in [Priority::Urgent, Priority::FollowUp, Priority::LowPriority] {
            assert_eq!(Priority::from_str(p.as_str()), Some(p));
        }
        assert_eq!(Priority::from_str("bogus"), None);
    }

    #[test]
    fn chat_action_codes() {
        assert_eq!(ChatAction::from_code("1"), Some(ChatAction::SmartReply));
        assert_eq!(ChatAction::from_code(" 2 "), Some(ChatAction::Summarize));
        assert_eq!(ChatAction::from_code("3"), Some(ChatAction::BasicQuery));
        assert_eq!(ChatAction::from_code("4"), None);
        assert_eq!(ChatAction::from_code(""), None);
    }
}
