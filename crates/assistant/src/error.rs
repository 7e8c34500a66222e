//! Unified error type for the assistant library.
//!
//! Core operations catch collaborator failures at their own boundary and
//! degrade to safe defaults; the variants here exist for the paths that do
//! surface errors to callers (configuration, persistence, and sends).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration (file or environment).
    #[error("configuration error: {0}")]
    Config(String),

    /// Behavior store could not be read or written.
    #[error("behavior store error: {0}")]
    Store(String),

    /// Mail backend call failed.
    #[error("mail backend error: {0}")]
    Mail(String),

    /// Slack backend call failed.
    #[error("slack backend error: {0}")]
    Slack(String),

    /// WhatsApp/Twilio backend call failed.
    #[error("whatsapp backend error: {0}")]
    WhatsApp(String),

    /// A model capability was constructed in unavailable mode.
    #[error("{0} capability unavailable")]
    CapabilityUnavailable(&'static str),

    /// A model capability call failed or returned a malformed payload.
    #[error("model capability error: {0}")]
    Capability(String),

    /// User-supplied input that failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An outbound send failed. The one failure class that always
    /// propagates to the caller.
    #[error("send failed: {0}")]
    Send(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
