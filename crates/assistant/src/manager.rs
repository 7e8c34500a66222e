//! The priority manager: fetch → extract → classify → summarize →
//! auto-flag → write-back, composed over the injected mail backend,
//! behavior repository, and model capabilities.

use std::sync::Arc;

use chrono::Utc;
use shared_types::{EmailMessage, ReminderEntry, ReminderKind, Suggestion, ThreadSummary};

use crate::classify::{Classification, PriorityClassifier};
use crate::error::{Error, Result};
use crate::mail::Mailbox;
use crate::reminder::{self, DueReminder, ReminderAction, ReminderPrompt};
use crate::store::BehaviorRepository;
use crate::suggest::{MessageContext, ResponseSuggester};
use crate::summarize::ThreadSummarizer;

/// Everything the front end needs to present one triaged message.
#[derive(Debug)]
pub struct ProcessedMessage {
    pub classification: Classification,
    pub thread_summary: ThreadSummary,
    pub message: EmailMessage,
}

pub struct PriorityManager {
    mailbox: Arc<dyn Mailbox>,
    repo: Arc<dyn BehaviorRepository>,
    classifier: PriorityClassifier,
    summarizer: ThreadSummarizer,
    suggester: ResponseSuggester,
}

impl PriorityManager {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        repo: Arc<dyn BehaviorRepository>,
        classifier: PriorityClassifier,
        summarizer: ThreadSummarizer,
        suggester: ResponseSuggester,
    ) -> Self {
        Self {
            mailbox,
            repo,
            classifier,
            summarizer,
            suggester,
        }
    }

    /// Triage one message.
    ///
    /// Never returns an error: every internal failure degrades to a
    /// Low-Priority, empty-summary result, preserving whatever message data
    /// was recovered. Processing counts the message against its sender and
    /// auto-flags a default reminder while the message is still unread.
    pub async fn process_message(&self, message_id: &str) -> ProcessedMessage {
        let message = match self.mailbox.fetch_message(message_id).await {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("failed to fetch message {message_id}: {e}");
                return Self::degraded(EmailMessage::default());
            }
        };

        let mut ledger = self.repo.load();
        let response_rate = ledger
            .get(message.sender_address())
            .map(|r| r.response_rate)
            .unwrap_or(0.0);

        let classification = self
            .classifier
            .classify(
                &message.subject,
                &message.body,
                message.is_important,
                response_rate,
            )
            .await;

        let thread_summary = match self.mailbox.fetch_thread(&message.thread_id).await {
            Ok(thread) if !thread.is_empty() => {
                let participants = participants(&thread);
                let bodies: Vec<String> = thread.into_iter().map(|m| m.body).collect();
                self.summarizer
                    .summarize_thread(&message.subject, participants, &bodies)
                    .await
            }
            Ok(_) => {
                // Thread lookup came back empty; summarize the message alone.
                self.summarizer
                    .summarize_thread(
                        &message.subject,
                        vec![message.from.clone()],
                        std::slice::from_ref(&message.body),
                    )
                    .await
            }
            Err(e) => {
                tracing::error!("failed to fetch thread {}: {e}", message.thread_id);
                ThreadSummary::degraded(message.subject.as_str())
            }
        };

        let now = Utc::now();
        ledger
            .entry(message.sender_address().to_string())
            .or_default()
            .record_message(now);
        if reminder::auto_flag_unread(&mut ledger, &message, now) {
            tracing::info!("auto-flagged unread message {} for reminder", message.id);
        }
        if let Err(e) = self.repo.save(&ledger) {
            tracing::error!("failed to persist behavior store: {e}");
        }

        ProcessedMessage {
            classification,
            thread_summary,
            message,
        }
    }

    /// Reply suggestions for a processed message.
    pub fn suggest_responses(&self, message: &EmailMessage) -> Vec<Suggestion> {
        self.suggester.suggest(
            &format!("{} {}", message.subject, message.body),
            &MessageContext {
                subject: &message.subject,
                sender: &message.from,
                is_important: message.is_important,
            },
        )
    }

    /// Send a reply to the message's sender.
    ///
    /// On success the sender's `responses` counter is incremented and the
    /// source message is marked read (the backend-detection transition:
    /// status flips, the reminder flag stays). The send failure itself is
    /// the one error that propagates.
    pub async fn send_quick_response(
        &self,
        message: &EmailMessage,
        text: &str,
    ) -> Result<String> {
        let recipient = message.sender_address();
        if recipient.is_empty() {
            return Err(Error::InvalidInput("message has no sender address".into()));
        }

        let sent_id = self
            .mailbox
            .send_message(recipient, &reply_subject(&message.subject), text)
            .await?;
        tracing::info!("sent response to {recipient} ({sent_id})");

        let mut ledger = self.repo.load();
        ledger
            .entry(recipient.to_string())
            .or_default()
            .record_response(Utc::now());
        reminder::mark_entry_read(&mut ledger, recipient, &message.id);
        if let Err(e) = self.repo.save(&ledger) {
            tracing::error!("failed to persist behavior store after send: {e}");
        }

        if let Err(e) = self.mailbox.mark_read(&message.id).await {
            tracing::error!("failed to mark {} read after send: {e}", message.id);
        }

        Ok(sent_id)
    }

    /// Explicit user flagging of a message for a reminder. Unlike the
    /// auto-flag path, an explicit flag replaces any existing entry.
    pub fn flag_for_reminder(
        &self,
        message: &EmailMessage,
        reminder_time: chrono::DateTime<Utc>,
        kind: ReminderKind,
    ) -> Result<()> {
        let mut ledger = self.repo.load();
        ledger
            .entry(message.sender_address().to_string())
            .or_default()
            .reminders
            .insert(
                message.id.clone(),
                ReminderEntry::new(reminder_time, kind, message.subject.as_str()),
            );
        self.repo.save(&ledger)
    }

    /// Sweep for due reminders and walk the user through them one at a
    /// time. Returns the handled reminders with the action taken on each.
    pub async fn check_reminders(
        &self,
        prompt: &mut dyn ReminderPrompt,
    ) -> Vec<(DueReminder, ReminderAction)> {
        let mut ledger = self.repo.load();
        let now = Utc::now();
        let due = reminder::sweep(&ledger, now);

        let mut handled = Vec::with_capacity(due.len());
        for item in due {
            let action = prompt.choose_action(&item);
            reminder::apply_action(&mut ledger, &item, action, Utc::now());
            if action == ReminderAction::MarkRead {
                if let Err(e) = self.mailbox.mark_read(&item.message_id).await {
                    tracing::error!("failed to mark {} read: {e}", item.message_id);
                }
            }
            handled.push((item, action));
        }

        if !handled.is_empty() {
            if let Err(e) = self.repo.save(&ledger) {
                tracing::error!("failed to persist behavior store after reminders: {e}");
            }
        }
        handled
    }

    /// Fetch a message for display (the "open" reminder action).
    pub async fn fetch_message(&self, message_id: &str) -> Result<EmailMessage> {
        self.mailbox.fetch_message(message_id).await
    }

    /// IDs of the most recent inbox messages, for the priority-inbox view.
    pub async fn list_recent(&self, max_results: u32) -> Result<Vec<String>> {
        self.mailbox.list_recent(max_results).await
    }

    fn degraded(message: EmailMessage) -> ProcessedMessage {
        ProcessedMessage {
            classification: Classification {
                priority: shared_types::Priority::LowPriority,
                score: 0,
                keyword_hits: 0,
                polarity: None,
            },
            thread_summary: ThreadSummary::degraded(message.subject.as_str()),
            message,
        }
    }
}

fn participants(thread: &[EmailMessage]) -> Vec<String> {
    let mut seen = Vec::new();
    for message in thread {
        let addr = message.sender_address().to_string();
        if !addr.is_empty() && !seen.contains(&addr) {
            seen.push(addr);
        }
    }
    seen
}

fn reply_subject(subject: &str) -> String {
    if subject.to_lowercase().starts_with("re:") {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Unavailable;
    use crate::classify::ScoringConfig;
    use crate::store::JsonFileStore;
    use async_trait::async_trait;
    use shared_types::{Priority, ReminderStatus, SuggestionKind};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMailbox {
        messages: HashMap<String, EmailMessage>,
        threads: HashMap<String, Vec<EmailMessage>>,
        sent: Mutex<Vec<(String, String, String)>>,
        read: Mutex<Vec<String>>,
        fail_fetch: bool,
        fail_thread: bool,
        fail_send: bool,
    }

    #[async_trait]
    impl Mailbox for FakeMailbox {
        async fn list_recent(&self, _max_results: u32) -> Result<Vec<String>> {
            Ok(self.messages.keys().cloned().collect())
        }

        async fn fetch_message(&self, message_id: &str) -> Result<EmailMessage> {
            if self.fail_fetch {
                return Err(Error::Mail("backend down".into()));
            }
            self.messages
                .get(message_id)
                .cloned()
                .ok_or_else(|| Error::Mail(format!("no message {message_id}")))
        }

        async fn fetch_thread(&self, thread_id: &str) -> Result<Vec<EmailMessage>> {
            if self.fail_thread {
                return Err(Error::Mail("thread lookup failed".into()));
            }
            Ok(self.threads.get(thread_id).cloned().unwrap_or_default())
        }

        async fn send_message(&self, to: &str, subject: &str, body: &str) -> Result<String> {
            if self.fail_send {
                return Err(Error::Send("smtp refused".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.into(), subject.into(), body.into()));
            Ok("sent-1".into())
        }

        async fn mark_read(&self, message_id: &str) -> Result<()> {
            self.read.lock().unwrap().push(message_id.into());
            Ok(())
        }
    }

    struct ScriptedPrompt {
        actions: Vec<ReminderAction>,
    }

    impl ReminderPrompt for ScriptedPrompt {
        fn choose_action(&mut self, _due: &DueReminder) -> ReminderAction {
            self.actions.remove(0)
        }
    }

    fn sample_message(id: &str, unread: bool) -> EmailMessage {
        let mut labels = vec!["INBOX".to_string()];
        if unread {
            labels.push("UNREAD".to_string());
        }
        EmailMessage {
            id: id.into(),
            thread_id: format!("t-{id}"),
            subject: "URGENT: critical deadline".into(),
            from: "Jane Doe <jane@example.com>".into(),
            body: "please respond".into(),
            is_important: true,
            labels,
        }
    }

    fn manager_with(mailbox: FakeMailbox, dir: &tempfile::TempDir) -> PriorityManager {
        let repo = Arc::new(JsonFileStore::new(dir.path().join("store.json")));
        PriorityManager::new(
            Arc::new(mailbox),
            repo,
            PriorityClassifier::new(ScoringConfig::default(), Arc::new(Unavailable)),
            ThreadSummarizer::new(
                Arc::new(Unavailable),
                ScoringConfig::default().urgent_keywords,
            ),
            ResponseSuggester::builtin(),
        )
    }

    fn repo_for(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::new(dir.path().join("store.json"))
    }

    #[tokio::test]
    async fn process_message_classifies_counts_and_autoflags() {
        let msg = sample_message("m1", true);
        let mut mailbox = FakeMailbox::default();
        mailbox
            .threads
            .insert("t-m1".into(), vec![msg.clone()]);
        mailbox.messages.insert("m1".into(), msg);

        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(mailbox, &dir);

        let result = manager.process_message("m1").await;

        assert_eq!(result.classification.priority, Priority::Urgent);
        // Short thread: summary is the raw body.
        assert_eq!(result.thread_summary.summary, "please respond");
        assert_eq!(result.thread_summary.message_count, 1);
        assert_eq!(result.message.id, "m1");

        let ledger = repo_for(&dir).load();
        let record = &ledger["jane@example.com"];
        assert_eq!(record.total_messages, 1);
        assert_eq!(record.responses, 0);
        let entry = &record.reminders["m1"];
        assert!(entry.flagged);
        assert_eq!(entry.status, ReminderStatus::Unanswered);
    }

    #[tokio::test]
    async fn fetch_failure_degrades_to_low_priority() {
        let mailbox = FakeMailbox {
            fail_fetch: true,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(mailbox, &dir);

        let result = manager.process_message("m1").await;

        assert_eq!(result.classification.priority, Priority::LowPriority);
        assert_eq!(result.thread_summary.message_count, 0);
        assert!(result.message.id.is_empty());
        // Nothing was counted against any sender.
        assert!(repo_for(&dir).load().is_empty());
    }

    #[tokio::test]
    async fn thread_failure_degrades_summary_only() {
        let msg = sample_message("m1", false);
        let mut mailbox = FakeMailbox {
            fail_thread: true,
            ..Default::default()
        };
        mailbox.messages.insert("m1".into(), msg);

        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(mailbox, &dir);

        let result = manager.process_message("m1").await;

        assert_eq!(result.classification.priority, Priority::Urgent);
        assert!(result.thread_summary.summary.is_empty());
        assert_eq!(result.thread_summary.message_count, 0);
        assert_eq!(result.message.id, "m1");
        // The message still counts against its sender.
        assert_eq!(repo_for(&dir).load()["jane@example.com"].total_messages, 1);
    }

    #[tokio::test]
    async fn send_quick_response_counts_reply_and_marks_entry_read() {
        let msg = sample_message("m1", true);
        let mut mailbox = FakeMailbox::default();
        mailbox
            .threads
            .insert("t-m1".into(), vec![msg.clone()]);
        mailbox.messages.insert("m1".into(), msg.clone());

        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(mailbox, &dir);

        // Processing first creates the sender record and the auto reminder.
        manager.process_message("m1").await;
        let sent_id = manager
            .send_quick_response(&msg, "on it, will reply in full tomorrow")
            .await
            .unwrap();
        assert_eq!(sent_id, "sent-1");

        let ledger = repo_for(&dir).load();
        let record = &ledger["jane@example.com"];
        // Only the response counter moved.
        assert_eq!(record.total_messages, 1);
        assert_eq!(record.responses, 1);
        assert!((record.response_rate - 1.0).abs() < 1e-9);
        // The reminder entry flipped to read but kept its flag.
        let entry = &record.reminders["m1"];
        assert_eq!(entry.status, ReminderStatus::Read);
        assert!(entry.flagged);
    }

    #[tokio::test]
    async fn send_quick_response_composes_reply() {
        let msg = sample_message("m1", false);
        let mut fake = FakeMailbox::default();
        fake.messages.insert("m1".into(), msg.clone());
        let mailbox = Arc::new(fake);

        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(repo_for(&dir));
        let manager = PriorityManager::new(
            mailbox.clone(),
            repo,
            PriorityClassifier::new(ScoringConfig::default(), Arc::new(Unavailable)),
            ThreadSummarizer::new(Arc::new(Unavailable), vec![]),
            ResponseSuggester::builtin(),
        );

        manager.send_quick_response(&msg, "ack").await.unwrap();

        let sent = mailbox.sent.lock().unwrap();
        assert_eq!(
            sent[0],
            (
                "jane@example.com".to_string(),
                "Re: URGENT: critical deadline".to_string(),
                "ack".to_string()
            )
        );
        assert_eq!(mailbox.read.lock().unwrap().as_slice(), ["m1"]);
    }

    #[tokio::test]
    async fn send_failure_propagates_and_leaves_store_untouched() {
        let msg = sample_message("m1", false);
        let mailbox = FakeMailbox {
            fail_send: true,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(mailbox, &dir);

        let err = manager.send_quick_response(&msg, "hello").await.unwrap_err();
        assert!(matches!(err, Error::Send(_)));
        assert!(repo_for(&dir).load().is_empty());
    }

    #[tokio::test]
    async fn send_without_sender_is_invalid_input() {
        let mut msg = sample_message("m1", false);
        msg.from = String::new();
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(FakeMailbox::default(), &dir);

        let err = manager.send_quick_response(&msg, "hello").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn check_reminders_applies_chosen_actions() {
        let msg = sample_message("m1", false);
        let mut mailbox = FakeMailbox::default();
        mailbox.messages.insert("m1".into(), msg.clone());

        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(mailbox, &dir);

        // Flag in the past so the sweep sees it immediately.
        let past = Utc::now() - chrono::Duration::hours(1);
        manager
            .flag_for_reminder(&msg, past, ReminderKind::Custom)
            .unwrap();

        let mut prompt = ScriptedPrompt {
            actions: vec![ReminderAction::MarkRead],
        };
        let handled = manager.check_reminders(&mut prompt).await;
        assert_eq!(handled.len(), 1);
        assert_eq!(handled[0].0.message_id, "m1");

        let ledger = repo_for(&dir).load();
        let entry = &ledger["jane@example.com"].reminders["m1"];
        assert_eq!(entry.status, ReminderStatus::Read);
        assert!(!entry.flagged);

        // Nothing left due.
        let mut empty_prompt = ScriptedPrompt { actions: vec![] };
        assert!(manager.check_reminders(&mut empty_prompt).await.is_empty());
    }

    #[tokio::test]
    async fn snoozed_reminder_stays_pending_for_later() {
        let msg = sample_message("m1", false);
        let mut mailbox = FakeMailbox::default();
        mailbox.messages.insert("m1".into(), msg.clone());

        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(mailbox, &dir);

        let past = Utc::now() - chrono::Duration::hours(1);
        manager
            .flag_for_reminder(&msg, past, ReminderKind::Default)
            .unwrap();

        let mut prompt = ScriptedPrompt {
            actions: vec![ReminderAction::SnoozeHours(2.0)],
        };
        manager.check_reminders(&mut prompt).await;

        let ledger = repo_for(&dir).load();
        let entry = &ledger["jane@example.com"].reminders["m1"];
        assert!(entry.flagged);
        assert_eq!(entry.status, ReminderStatus::Unanswered);
        assert!(entry.reminder_time > Utc::now());
    }

    #[tokio::test]
    async fn suggestions_use_message_context() {
        let msg = sample_message("m1", false);
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(FakeMailbox::default(), &dir);

        let suggestions = manager.suggest_responses(&msg);
        let kinds: Vec<SuggestionKind> = suggestions.iter().map(|s| s.kind).collect();
        assert_eq!(kinds[0], SuggestionKind::Acknowledgment);
        assert!(kinds.contains(&SuggestionKind::CustomPersonal));
        assert!(kinds.contains(&SuggestionKind::PriorityResponse));
    }

    #[test]
    fn reply_subject_adds_prefix_once() {
        assert_eq!(reply_subject("hello"), "Re: hello");
        assert_eq!(reply_subject("Re: hello"), "Re: hello");
        assert_eq!(reply_subject("RE: hello"), "RE: hello");
    }
}
