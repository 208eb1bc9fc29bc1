//! Failure taxonomy and retry directives.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chain::ChainClass;

/// Who or what caused a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// The user asked for something the chain will never accept. Never retried.
    UserError,
    /// Wrong endpoint, pallet, or runtime for the request. Retried with one correction.
    ConfigurationError,
    /// Transient transport fault. Retried unchanged.
    NetworkError,
    /// Unrecognised. Retried once with a chain switch.
    UnknownError,
}

impl ErrorCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserError => "USER_ERROR",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one raw failure. Lives for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    pub category: ErrorCategory,
    pub should_retry: bool,
    pub suggested_fix: Option<String>,
    /// Fixed, category-specific sentence. Never the raw message.
    pub user_message: String,
    /// The raw failure, verbatim.
    pub technical_details: String,
    /// Name of the classification rule that matched, if any.
    pub matched_rule: Option<String>,
}

impl ErrorAnalysis {
    /// Explicit rejection in the signer. Always a user-caused stop.
    #[must_use]
    pub fn signer_rejected(raw: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::UserError,
            should_retry: false,
            suggested_fix: None,
            user_message: "Transaction was rejected in the signer".to_string(),
            technical_details: raw.into(),
            matched_rule: Some("signer_rejected".to_string()),
        }
    }

    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(self.category, ErrorCategory::UserError)
    }
}

/// One targeted correction for the next attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub enum RetryDirective {
    SwitchChain { to: ChainClass },
    ForceKeepAlive,
    ForceAllowDeath,
    AdjustParameters { parameters: Map<String, Value> },
}

/// What to do before the next attempt.
///
/// `directive: None` means retry with the configuration unchanged. Planners
/// that want to stop return no strategy at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryStrategy {
    pub directive: Option<RetryDirective>,
    pub reason: String,
}

impl RetryStrategy {
    #[must_use]
    pub fn unchanged(reason: impl Into<String>) -> Self {
        Self {
            directive: None,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn switch_chain(to: ChainClass, reason: impl Into<String>) -> Self {
        Self {
            directive: Some(RetryDirective::SwitchChain { to }),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn switches_chain(&self) -> bool {
        matches!(self.directive, Some(RetryDirective::SwitchChain { .. }))
    }
}
