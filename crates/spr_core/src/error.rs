//! Collaborator failures and their user-facing classification.
//!
//! # Responsibility
//! - Carry failures from the record, skeleton and assessment collaborators.
//! - Turn any failure into one `AppError` title/message/suggestion triple.
//!
//! # Invariants
//! - Keyword inspection runs in a fixed order:
//!   attachment, quota, key, network, parse, then unknown.
//! - Unknown errors keep at most the first 100 characters of the message.

use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

const UNKNOWN_MESSAGE_CHARS: usize = 100;

const ATTACHMENT_KEYWORDS: &[&str] = &["attachment", "附件", "字段"];
const QUOTA_KEYWORDS: &[&str] = &["quota", "exceeded", "limit"];
const API_KEY_KEYWORDS: &[&str] = &["api key", "unauthorized", "auth"];
const NETWORK_KEYWORDS: &[&str] = &["network", "fetch", "connection"];
const PARSE_KEYWORDS: &[&str] = &["parse", "json", "format"];

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// No record is selected in the host table.
    NoActiveSession,
    /// The configured attachment field is empty or holds no readable file.
    MissingAttachment(String),
    Transport(String),
    /// Upstream provider answered with a non-success status.
    Provider { status: u16, message: String },
    MalformedResponse(String),
    Other(String),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoActiveSession => write!(f, "no active record selected"),
            Self::MissingAttachment(field) => {
                write!(f, "no markdown attachment found in field `{field}`")
            }
            Self::Transport(message) => write!(f, "network request failed: {message}"),
            Self::Provider { status, message } => {
                write!(f, "provider returned status {status}: {message}")
            }
            Self::MalformedResponse(message) => {
                write!(f, "failed to parse response: {message}")
            }
            Self::Other(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ServiceError {}

impl From<serde_json::Error> for ServiceError {
    fn from(value: serde_json::Error) -> Self {
        Self::MalformedResponse(value.to_string())
    }
}

/// User-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Attachment,
    ApiQuota,
    ApiKey,
    Network,
    Parse,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attachment => "attachment",
            Self::ApiQuota => "api_quota",
            Self::ApiKey => "api_key",
            Self::Network => "network",
            Self::Parse => "parse",
            Self::Unknown => "unknown",
        }
    }
}

/// Error state shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppError {
    pub kind: ErrorKind,
    pub title: String,
    pub message: String,
    pub suggestion: String,
}

impl AppError {
    fn new(kind: ErrorKind, title: &str, message: &str, suggestion: &str) -> Self {
        Self {
            kind,
            title: title.to_string(),
            message: message.to_string(),
            suggestion: suggestion.to_string(),
        }
    }

    /// Canned presentation for a known category.
    ///
    /// `Unknown` uses the raw message instead; build it with [`classify_error`].
    pub fn of_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Attachment => Self::new(
                kind,
                "Attachment could not be read",
                "No file could be read from the attachment field",
                "Make sure the current record has a Markdown file in its attachment field.",
            ),
            ErrorKind::ApiQuota => Self::new(
                kind,
                "API quota exhausted",
                "The AI provider quota has been reached",
                "Retry later, or configure your own API key.",
            ),
            ErrorKind::ApiKey => Self::new(
                kind,
                "Invalid API key",
                "The AI provider rejected the API key",
                "Check the API key configured for the selected provider.",
            ),
            ErrorKind::Network => Self::new(
                kind,
                "Network connection failed",
                "The server could not be reached",
                "Check the network connection and retry.",
            ),
            ErrorKind::Parse => Self::new(
                kind,
                "Content could not be parsed",
                "The AI response was not in the expected format",
                "The Markdown source may be malformed; check the document.",
            ),
            ErrorKind::Unknown => Self::new(
                kind,
                "Unknown error",
                "",
                "Retry, or contact support.",
            ),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

impl Error for AppError {}

/// Classifies a raw failure message by keyword inspection.
pub fn classify_error(message: &str) -> AppError {
    let lower = message.to_lowercase();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|keyword| lower.contains(keyword));

    let kind = if contains_any(ATTACHMENT_KEYWORDS) {
        ErrorKind::Attachment
    } else if contains_any(QUOTA_KEYWORDS) {
        ErrorKind::ApiQuota
    } else if contains_any(API_KEY_KEYWORDS) {
        ErrorKind::ApiKey
    } else if contains_any(NETWORK_KEYWORDS) {
        ErrorKind::Network
    } else if contains_any(PARSE_KEYWORDS) {
        ErrorKind::Parse
    } else {
        let mut unknown = AppError::of_kind(ErrorKind::Unknown);
        unknown.message = message.chars().take(UNKNOWN_MESSAGE_CHARS).collect();
        return unknown;
    };
    AppError::of_kind(kind)
}

impl From<&ServiceError> for AppError {
    fn from(value: &ServiceError) -> Self {
        match value {
            ServiceError::MissingAttachment(_) => Self::of_kind(ErrorKind::Attachment),
            ServiceError::Transport(_) => Self::of_kind(ErrorKind::Network),
            ServiceError::MalformedResponse(_) => Self::of_kind(ErrorKind::Parse),
            ServiceError::Provider { status: 429, .. } => Self::of_kind(ErrorKind::ApiQuota),
            ServiceError::Provider {
                status: 401 | 403, ..
            } => Self::of_kind(ErrorKind::ApiKey),
            ServiceError::Provider { .. }
            | ServiceError::NoActiveSession
            | ServiceError::Other(_) => classify_error(&value.to_string()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(value: ServiceError) -> Self {
        Self::from(&value)
    }
}
