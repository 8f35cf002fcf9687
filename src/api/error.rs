// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Error bodies longer than this are cut before they reach a message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Network or connection failure; the request may or may not have reached the server.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-success status from the remote API. Precondition, validation and auth
    /// failures all land here with whatever message the server supplied.
    #[error("API returned status {status}{}", suffix(.message))]
    Status { status: u16, message: Option<String> },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The deadline passed while the request was in flight. The server may
    /// have applied it.
    #[error("Deadline exceeded while the call was in flight; its outcome is unknown")]
    Abandoned,
}

impl ApiError {
    /// Builds the error for a non-success response, pulling `message` out of a
    /// JSON error envelope when there is one and falling back to the raw text.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = extract_message(body);
        if status == 404 {
            return ApiError::NotFound(message.unwrap_or_else(|| "resource not found".to_string()));
        }
        ApiError::Status { status, message }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// True for 4xx statuses the caller has to fix (precondition, validation, auth).
    pub fn is_user_facing(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if (400..500).contains(status))
    }

    /// Cancellation and deadline expiry stop a sequence without saying anything about the server.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, ApiError::Cancelled | ApiError::DeadlineExceeded | ApiError::Abandoned)
    }

    /// True when the request was sent but no reply was seen.
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, ApiError::Abandoned)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::NotFound(_) => Some(404),
            _ => None,
        }
    }
}

fn suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default()
}

fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(msg) = value.get("message").and_then(|m| m.as_str()) {
            return Some(msg.to_string());
        }
        if let Some(code) = value.get("code").and_then(|c| c.as_str()) {
            return Some(code.to_string());
        }
    }
    let mut text: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
    if trimmed.chars().count() > MAX_ERROR_BODY {
        text.push_str("...");
    }
    Some(text)
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::from_response(status.as_u16(), "")
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
