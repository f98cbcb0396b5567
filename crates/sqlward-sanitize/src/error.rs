//! Error types for the sanitize crate.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pattern family that caused a value to be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionCategory {
    Symbol,
    Keyword,
    LogicGate,
    /// Malformed data URI after a `;base64` marker.
    Base64,
}

impl fmt::Display for InjectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectionCategory::Symbol => write!(f, "symbol"),
            InjectionCategory::Keyword => write!(f, "keyword"),
            InjectionCategory::LogicGate => write!(f, "logic gate"),
            InjectionCategory::Base64 => write!(f, "base64 payload"),
        }
    }
}

/// Errors raised while validating or rewriting caller input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SanitizeError {
    /// Input matched a disallowed pattern.
    #[error("injection detected ({category}) in '{input}'")]
    InjectionDetected {
        input: String,
        category: InjectionCategory,
    },

    /// Clause could not be reassembled safely.
    #[error("malformed clause: {reason}")]
    MalformedClause { reason: String },

    /// Trigger definition failed validation.
    #[error("invalid trigger: {reason}")]
    InvalidTrigger { reason: String },
}

impl SanitizeError {
    pub(crate) fn injection(input: impl Into<String>, category: InjectionCategory) -> Self {
        SanitizeError::InjectionDetected {
            input: input.into(),
            category,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        SanitizeError::MalformedClause {
            reason: reason.into(),
        }
    }

    pub(crate) fn trigger(reason: impl Into<String>) -> Self {
        SanitizeError::InvalidTrigger {
            reason: reason.into(),
        }
    }
}
