//! Mail backend abstraction.
//!
//! The priority manager talks to mail through this trait; the production
//! implementation is the Gmail client in [`gmail`], and tests use scripted
//! fakes.

pub mod gmail;

use async_trait::async_trait;
use shared_types::EmailMessage;

use crate::error::Result;

#[async_trait]
pub trait Mailbox: Send + Sync {
    /// IDs of the most recent inbox messages, newest first.
    async fn list_recent(&self, max_results: u32) -> Result<Vec<String>>;

    /// Fetch one message with headers, body, and labels.
    async fn fetch_message(&self, message_id: &str) -> Result<EmailMessage>;

    /// Fetch every message of a thread, oldest first.
    async fn fetch_thread(&self, thread_id: &str) -> Result<Vec<EmailMessage>>;

    /// Send a plain-text message. Failures map to [`crate::Error::Send`]
    /// and always propagate to the caller.
    async fn send_message(&self, to: &str, subject: &str, body: &str) -> Result<String>;

    /// Remove the UNREAD label from a message.
    async fn mark_read(&self, message_id: &str) -> Result<()>;
}
