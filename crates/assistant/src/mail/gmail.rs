//! Gmail API client.

use async_trait::async_trait;
use google_gmail1::api::{Message, ModifyMessageRequest};
use google_gmail1::hyper_rustls::HttpsConnector;
use google_gmail1::Gmail;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use shared_types::EmailMessage;

use crate::config::GmailSecrets;
use crate::error::{Error, Result};
use crate::mail::Mailbox;

/// Gmail-backed [`Mailbox`] using stored OAuth refresh-token credentials.
pub struct GmailMailbox {
    hub: Gmail<HttpsConnector<HttpConnector>>,
}

impl GmailMailbox {
    /// Connect using the authorized-user flow with a stored refresh token.
    ///
    /// Uses the `yup_oauth2` re-exported by `google_gmail1` to avoid
    /// version mismatch between the two crates.
    pub async fn connect(secrets: &GmailSecrets) -> Result<Self> {
        let secret = google_gmail1::yup_oauth2::authorized_user::AuthorizedUserSecret {
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            refresh_token: secrets.refresh_token.clone(),
            key_type: "authorized_user".to_string(),
        };

        let auth = google_gmail1::yup_oauth2::AuthorizedUserAuthenticator::builder(secret)
            .build()
            .await
            .map_err(|e| Error::Mail(format!("failed to build authenticator: {e}")))?;

        let connector = google_gmail1::hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| Error::Mail(format!("failed to load TLS roots: {e}")))?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new()).build(connector);
        let hub = Gmail::new(client, auth);

        Ok(Self { hub })
    }
}

#[async_trait]
impl Mailbox for GmailMailbox {
    async fn list_recent(&self, max_results: u32) -> Result<Vec<String>> {
        let (_, list_response) = self
            .hub
            .users()
            .messages_list("me")
            .add_label_ids("INBOX")
            .max_results(max_results)
            .doit()
            .await
            .map_err(|e| Error::Mail(format!("failed to list messages: {e}")))?;

        Ok(list_response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect())
    }

    async fn fetch_message(&self, message_id: &str) -> Result<EmailMessage> {
        let (_, message) = self
            .hub
            .users()
            .messages_get("me", message_id)
            .format("full")
            .doit()
            .await
            .map_err(|e| Error::Mail(format!("failed to get message {message_id}: {e}")))?;

        Ok(parse_message(message))
    }

    async fn fetch_thread(&self, thread_id: &str) -> Result<Vec<EmailMessage>> {
        let (_, thread) = self
            .hub
            .users()
            .threads_get("me", thread_id)
            .format("full")
            .doit()
            .await
            .map_err(|e| Error::Mail(format!("failed to get thread {thread_id}: {e}")))?;

        Ok(thread
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(parse_message)
            .collect())
    }

    async fn send_message(&self, to: &str, subject: &str, body: &str) -> Result<String> {
        // messages.send is a media-upload method: the RFC 822 payload goes
        // through the upload stream, not the metadata.
        let raw = format!(
            "To: {to}\r\nSubject: {subject}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{body}"
        );
        let mime = "message/rfc822"
            .parse()
            .map_err(|e| Error::Send(format!("invalid mime type: {e}")))?;

        let (_, sent) = self
            .hub
            .users()
            .messages_send(Message::default(), "me")
            .upload(std::io::Cursor::new(raw.into_bytes()), mime)
            .await
            .map_err(|e| Error::Send(format!("failed to send to {to}: {e}")))?;

        Ok(sent.id.unwrap_or_default())
    }

    async fn mark_read(&self, message_id: &str) -> Result<()> {
        let modify_request = ModifyMessageRequest {
            remove_label_ids: Some(vec!["UNREAD".to_string()]),
            add_label_ids: None,
        };

        self.hub
            .users()
            .messages_modify(modify_request, "me", message_id)
            .doit()
            .await
            .map_err(|e| Error::Mail(format!("failed to mark {message_id} read: {e}")))?;

        tracing::debug!("marked message read: {message_id}");
        Ok(())
    }
}

fn parse_message(message: Message) -> EmailMessage {
    let id = message.id.clone().unwrap_or_default();
    let thread_id = message.thread_id.clone().unwrap_or_default();
    let labels = message.label_ids.clone().unwrap_or_default();

    let mut subject = String::new();
    let mut from = String::new();

    if let Some(payload) = &message.payload {
        if let Some(headers) = &payload.headers {
            for header in headers {
                match header.name.as_deref() {
                    Some("Subject") => subject = header.value.clone().unwrap_or_default(),
                    Some("From") => from = header.value.clone().unwrap_or_default(),
                    _ => {}
                }
            }
        }
    }

    // Prefer the decoded plain-text body, fall back to the snippet.
    let body = extract_text_body(&message)
        .or_else(|| message.snippet.clone())
        .unwrap_or_default();
    let is_important = labels.iter().any(|l| l == "IMPORTANT");

    EmailMessage {
        id,
        thread_id,
        subject,
        from,
        body,
        is_important,
        labels,
    }
}

fn extract_text_body(message: &Message) -> Option<String> {
    let payload = message.payload.as_ref()?;

    if let Some(body) = &payload.body {
        if let Some(data) = &body.data {
            if payload.mime_type.as_deref() != Some("text/html") {
                if let Some(text) = bytes_to_string(data) {
                    return Some(text);
                }
            }
        }
    }

    payload
        .parts
        .as_ref()
        .and_then(|parts| text_from_parts(parts))
}

fn text_from_parts(parts: &[google_gmail1::api::MessagePart]) -> Option<String> {
    for part in parts {
        match part.mime_type.as_deref() {
            Some("text/plain") => {
                if let Some(text) = part
                    .body
                    .as_ref()
                    .and_then(|b| b.data.as_ref())
                    .and_then(|d| bytes_to_string(d))
                {
                    return Some(text);
                }
            }
            Some(mime) if mime.starts_with("multipart/") => {
                if let Some(text) = part.parts.as_ref().and_then(|p| text_from_parts(p)) {
                    return Some(text);
                }
            }
            _ => {}
        }
    }
    None
}

fn bytes_to_string(data: &[u8]) -> Option<String> {
    String::from_utf8(data.to_vec()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_gmail1::api::{MessagePart, MessagePartBody, MessagePartHeader};

    fn header(name: &str, value: &str) -> MessagePartHeader {
        MessagePartHeader {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
        }
    }

    #[test]
    fn parse_message_extracts_headers_and_labels() {
        let message = Message {
            id: Some("m1".into()),
            thread_id: Some("t1".into()),
            label_ids: Some(vec!["UNREAD".into(), "IMPORTANT".into()]),
            snippet: Some("snippet text".into()),
            payload: Some(MessagePart {
                headers: Some(vec![
                    header("Subject", "Quarterly report"),
                    header("From", "Jane <jane@example.com>"),
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let email = parse_message(message);
        assert_eq!(email.id, "m1");
        assert_eq!(email.thread_id, "t1");
        assert_eq!(email.subject, "Quarterly report");
        assert_eq!(email.sender_address(), "jane@example.com");
        assert!(email.is_important);
        assert!(email.is_unread());
        // No body part: falls back to the snippet.
        assert_eq!(email.body, "snippet text");
    }

    #[test]
    fn plain_text_part_preferred_over_snippet() {
        let message = Message {
            id: Some("m2".into()),
            snippet: Some("short".into()),
            payload: Some(MessagePart {
                mime_type: Some("multipart/alternative".into()),
                parts: Some(vec![
                    MessagePart {
                        mime_type: Some("text/html".into()),
                        body: Some(MessagePartBody {
                            data: Some(b"<p>hi</p>".to_vec()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    MessagePart {
                        mime_type: Some("text/plain".into()),
                        body: Some(MessagePartBody {
                            data: Some(b"full body".to_vec()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let email = parse_message(message);
        assert_eq!(email.body, "full body");
    }

    #[test]
    fn nested_multipart_bodies_are_found() {
        let message = Message {
            payload: Some(MessagePart {
                mime_type: Some("multipart/mixed".into()),
                parts: Some(vec![MessagePart {
                    mime_type: Some("multipart/alternative".into()),
                    parts: Some(vec![MessagePart {
                        mime_type: Some("text/plain".into()),
                        body: Some(MessagePartBody {
                            data: Some(b"nested".to_vec()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(parse_message(message).body, "nested");
    }
}
