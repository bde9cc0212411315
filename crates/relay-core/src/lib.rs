//! # Relay Core
//!
//! Core types and traits for the smsrelay symptom log.
//!
//! This crate provides the fundamental building blocks:
//! - [`SymptomEntry`] and [`Urgency`], the one thing the relay records
//! - [`MessageRouter`], which turns an inbound SMS into a [`RouterResult`]
//! - [`RowStore`] and [`Notifier`] traits for the collaborators the caller drives
//! - Framework-free response types shared by the web adapters
//!
//! ## Example
//!
//! ```rust,ignore
//! use relay_core::{MessageRouter, RouterResult};
//!
//! let router = MessageRouter::default();
//! match router.route(&store, "+15551234567", "Headache, urgency 7", now).await? {
//!     RouterResult::LogEntry(entry) => store.append(&entry).await?,
//!     other => println!("{other:?}"),
//! }
//! ```

pub mod entry;
pub mod local;
pub mod router;

pub use entry::{SymptomEntry, Urgency};
pub use local::{DisabledNotifier, MemoryNotifier, MemoryRowStore, SentMessage};
pub use router::{
    Command, CommandWords, DEFAULT_SUMMARY_SIZE, MessageRouter, RouterResult, render_summary,
};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors raised by a [`RowStore`] implementation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// HTTP communication error
    #[error("http error: {0}")]
    Http(String),
    /// Credentials were missing or refused
    #[error("authentication error: {0}")]
    Auth(String),
    /// Backing service answered with an error
    #[error("store api error: {0}")]
    Api(String),
    /// Backing service answered with something we could not read
    #[error("malformed store response: {0}")]
    Malformed(String),
}

/// Errors raised by a [`Notifier`] implementation
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("http error: {0}")]
    Http(String),
    #[error("notifier not configured: {0}")]
    NotConfigured(String),
    #[error("notifier rejected message: {0}")]
    Rejected(String),
}

/// Request-level errors surfaced by the web processor
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid JSON payload: {0}")]
    InvalidPayload(String),
    #[error("Empty message body")]
    EmptyBody,
    /// Body larger than the configured limit, in bytes
    #[error("Payload too large: limit is {0} bytes")]
    PayloadTooLarge(usize),
    #[error("Rate limit exceeded, retry after {}s", .0.as_secs())]
    RateLimited(Duration),
    #[error("Invalid or missing secret")]
    Forbidden,
    #[error("{0} not configured on server")]
    NotConfigured(&'static str),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("send error: {0}")]
    Send(#[from] SendError),
}

impl RelayError {
    pub fn status(&self) -> HttpStatus {
        match self {
            RelayError::InvalidPayload(_) | RelayError::EmptyBody => HttpStatus::BadRequest,
            RelayError::PayloadTooLarge(_) => HttpStatus::PayloadTooLarge,
            RelayError::RateLimited(_) => HttpStatus::TooManyRequests,
            RelayError::Forbidden => HttpStatus::Forbidden,
            RelayError::NotConfigured(_) | RelayError::Store(_) => {
                HttpStatus::InternalServerError
            }
            RelayError::Send(_) => HttpStatus::BadGateway,
        }
    }
}

/// HTTP status code for web responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok = 200,
    BadRequest = 400,
    Forbidden = 403,
    NotFound = 404,
    PayloadTooLarge = 413,
    TooManyRequests = 429,
    InternalServerError = 500,
    BadGateway = 502,
}

impl HttpStatus {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Forwarded SMS as posted by the phone-side forwarder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InboundSms {
    #[serde(default = "unknown_sender")]
    pub sender: String,
    pub body: String,
}

fn unknown_sender() -> String {
    "unknown".to_string()
}

impl InboundSms {
    /// Decode and validate a JSON payload. Blank bodies are rejected here so the
    /// router never sees a malformed request.
    pub fn from_json(payload: &[u8]) -> Result<Self, RelayError> {
        let sms: InboundSms = serde_json::from_slice(payload)
            .map_err(|e| RelayError::InvalidPayload(e.to_string()))?;
        if sms.body.trim().is_empty() {
            return Err(RelayError::EmptyBody);
        }
        Ok(sms)
    }
}

/// Generic response that can be converted to any framework's response type
#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub status: HttpStatus,
    pub body: String,
    pub content_type: String,
}

impl RelayResponse {
    pub fn json(status: HttpStatus, value: &serde_json::Value) -> Self {
        Self {
            status,
            body: value.to_string(),
            content_type: "application/json".to_string(),
        }
    }

    pub fn success(value: serde_json::Value) -> Self {
        Self::json(HttpStatus::Ok, &value)
    }

    pub fn error(status: HttpStatus, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }
}

impl From<RelayError> for RelayResponse {
    fn from(e: RelayError) -> Self {
        RelayResponse::error(e.status(), &e.to_string())
    }
}

/// Append-only, insertion-ordered log of symptom entries.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Append one entry at the end of the log.
    async fn append(&self, entry: &SymptomEntry) -> Result<(), StoreError>;
    /// Last `n` entries in insertion order (oldest first).
    async fn recent(&self, n: usize) -> Result<Vec<SymptomEntry>, StoreError>;
    /// Link a human can open to browse the whole log.
    fn share_url(&self) -> String;
}

/// Outbound text delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, text: &str) -> Result<(), SendError>;
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

/// Admission check applied per sender before a message is routed.
#[async_trait]
pub trait RateGate: Send + Sync {
    async fn check(&self, key: &str) -> RateDecision;
}
