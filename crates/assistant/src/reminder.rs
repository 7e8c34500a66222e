//! Reminder scheduling and the due-check sweep.
//!
//! Reminders live inside the behavior store, keyed by message under each
//! sender. The sweep is a pure scan: listing due entries never consumes
//! them, so two consecutive sweeps with no action in between agree.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use shared_types::{EmailMessage, ReminderEntry, ReminderKind, SenderLedger};

/// Default snooze delta, also used as the fallback for invalid input.
pub const DEFAULT_SNOOZE_HOURS: f64 = 5.0;

/// A reminder that has come due, detached from the ledger for display.
#[derive(Debug, Clone, PartialEq)]
pub struct DueReminder {
    pub sender: String,
    pub message_id: String,
    pub subject: String,
    pub reminder_time: DateTime<Utc>,
}

/// What the user chose to do with a due reminder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReminderAction {
    /// Open the email; the reminder is dismissed.
    Open,
    /// Mark the email read and dismiss the reminder.
    MarkRead,
    /// Snooze by the default delta.
    SnoozeDefault,
    /// Snooze by a custom number of hours.
    SnoozeHours(f64),
    /// Snooze until an absolute time.
    SnoozeUntil(DateTime<Utc>),
}

/// Interactive surface for handling due reminders one at a time. The
/// terminal implementation re-prompts on invalid input and falls back to
/// the default snooze; tests supply scripted implementations.
pub trait ReminderPrompt {
    fn choose_action(&mut self, due: &DueReminder) -> ReminderAction;
}

/// Scan every sender's reminders for due entries.
///
/// Due iff flagged, unanswered, and reminder_time <= now. Iteration order
/// follows the ledger; no sort is promised.
pub fn sweep(ledger: &SenderLedger, now: DateTime<Utc>) -> Vec<DueReminder> {
    let mut due = Vec::new();
    for (sender, record) in ledger {
        for (message_id, entry) in &record.reminders {
            if entry.is_due(now) {
                due.push(DueReminder {
                    sender: sender.clone(),
                    message_id: message_id.clone(),
                    subject: entry.subject.clone(),
                    reminder_time: entry.reminder_time,
                });
            }
        }
    }
    due
}

/// Apply the chosen action to the ledger entry behind a due reminder.
///
/// Open and MarkRead dismiss the entry (MarkRead also flips the status);
/// the snooze variants reschedule it and keep it pending. A non-positive
/// snooze falls back to the default delta rather than erroring.
pub fn apply_action(
    ledger: &mut SenderLedger,
    due: &DueReminder,
    action: ReminderAction,
    now: DateTime<Utc>,
) {
    let Some(entry) = ledger
        .get_mut(&due.sender)
        .and_then(|r| r.reminders.get_mut(&due.message_id))
    else {
        tracing::warn!(
            "reminder {}/{} vanished before action applied",
            due.sender,
            due.message_id
        );
        return;
    };

    match action {
        ReminderAction::Open => entry.dismiss(),
        ReminderAction::MarkRead => {
            entry.mark_read();
            entry.dismiss();
        }
        ReminderAction::SnoozeDefault => {
            entry.reschedule(now + snooze_delta(DEFAULT_SNOOZE_HOURS), ReminderKind::Default);
        }
        ReminderAction::SnoozeHours(hours) => {
            let hours = if hours > 0.0 {
                hours
            } else {
                tracing::warn!("non-positive snooze {hours}h, using default");
                DEFAULT_SNOOZE_HOURS
            };
            entry.reschedule(now + snooze_delta(hours), ReminderKind::Custom);
        }
        ReminderAction::SnoozeUntil(when) => {
            entry.reschedule(when, ReminderKind::Custom);
        }
    }
}

/// Auto-flagging side effect of processing: a message still tagged UNREAD
/// gets a default pending reminder at now + 5 h. An existing entry for the
/// message is left alone so reprocessing does not reset its clock.
pub fn auto_flag_unread(
    ledger: &mut SenderLedger,
    message: &EmailMessage,
    now: DateTime<Utc>,
) -> bool {
    if !message.is_unread() {
        return false;
    }
    let record = ledger.entry(message.sender_address().to_string()).or_default();
    let created = !record.reminders.contains_key(&message.id);
    record.reminders.entry(message.id.clone()).or_insert_with(|| {
        ReminderEntry::new(
            now + snooze_delta(DEFAULT_SNOOZE_HOURS),
            ReminderKind::Default,
            message.subject.as_str(),
        )
    });
    created
}

/// Backend-side read detection: flip the status, leave the flag alone.
/// The due sweep skips the entry via its status guard from here on.
pub fn mark_entry_read(ledger: &mut SenderLedger, sender: &str, message_id: &str) {
    if let Some(entry) = ledger
        .get_mut(sender)
        .and_then(|r| r.reminders.get_mut(message_id))
    {
        entry.mark_read();
    }
}

fn snooze_delta(hours: f64) -> Duration {
    Duration::seconds((hours * 3600.0) as i64)
}

/// Parse user-entered snooze hours; positive finite values only.
pub fn parse_snooze_hours(input: &str) -> Option<f64> {
    let hours: f64 = input.trim().parse().ok()?;
    (hours.is_finite() && hours > 0.0).then_some(hours)
}

/// Parse a user-entered snooze datetime, `YYYY-MM-DD HH:MM`, taken as UTC.
pub fn parse_snooze_datetime(input: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(input.trim(), "%Y-%m-%d %H:%M")
        .ok()
        .map(|naive| naive.and_utc())
}
