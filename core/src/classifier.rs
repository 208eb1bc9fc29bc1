//! Ordered rule table mapping raw failures onto the error taxonomy.
//!
//! Rules are evaluated top to bottom against the lowercased message and the
//! first match wins. User-caused conditions come first so that a message like
//! `"dispatch error: insufficient balance"` is never retried.

use std::iter;

use dotexec_types::{ErrorAnalysis, ErrorCategory, NonEmptyStaticStr};
use tracing::debug;

/// Text every "switch chain" suggestion contains. The planner keys off it.
pub(crate) const ALTERNATE_CHAIN_HINT: &str = "alternate chain";

pub(crate) const UNKNOWN_ASSET_PATTERNS: &[&str] = &[
    "unknown asset",
    "unknownasset",
    "asset not found",
    "invalid asset",
    "asset does not exist",
];

pub(crate) const CALL_NOT_FOUND_PATTERNS: &[&str] = &[
    "call not found",
    "pallet not found",
    "method not found",
    "is not a function",
    "no such call",
    "unknown call",
];

pub(crate) const TRAP_PATTERNS: &[&str] = &[
    "wasm unreachable",
    "unreachable",
    "wasm trap",
    "runtime trap",
    "panicked",
    "1010:",
    "invalid transaction",
    "invalidtransaction",
];

pub(crate) const NO_PROVIDERS_PATTERNS: &[&str] = &[
    "noproviders",
    "no providers",
    "dangling consumers",
    "consumer remaining",
];

/// One row of the classification table.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    pub name: &'static str,
    /// Lowercase substrings; any one of them matches.
    pub patterns: &'static [&'static str],
    pub category: ErrorCategory,
    pub should_retry: bool,
    pub user_message: NonEmptyStaticStr,
    pub suggested_fix: Option<&'static str>,
}

impl ClassificationRule {
    #[must_use]
    pub fn matches(&self, lowered: &str) -> bool {
        matches_any(lowered, self.patterns)
    }

    fn analysis(&self, raw: &str) -> ErrorAnalysis {
        ErrorAnalysis {
            category: self.category,
            should_retry: self.should_retry,
            suggested_fix: self.suggested_fix.map(str::to_string),
            user_message: self.user_message.as_str().to_string(),
            technical_details: raw.to_string(),
            matched_rule: Some(self.name.to_string()),
        }
    }
}

// ============================================================================
// Rule table
// ============================================================================

/// Priority-ordered. The fallthrough is [`UNKNOWN_RULE`], which has no patterns.
pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "insufficient_balance",
        patterns: &[
            "insufficient balance",
            "insufficientbalance",
            "funds too low",
            "balance too low",
            "inability to pay",
            "invalidtransaction: payment",
            "balancelow",
        ],
        category: ErrorCategory::UserError,
        should_retry: false,
        user_message: NonEmptyStaticStr::new(
            "Insufficient balance for this transaction including fees",
        ),
        suggested_fix: Some("Top up the sending account or reduce the amount"),
    },
    ClassificationRule {
        name: "invalid_address",
        patterns: &[
            "invalid address",
            "invalid recipient",
            "malformed address",
            "invalid ss58",
            "bad address",
            "invalid destination",
        ],
        category: ErrorCategory::UserError,
        should_retry: false,
        user_message: NonEmptyStaticStr::new("The recipient address is not valid"),
        suggested_fix: Some("Check the recipient address and its network prefix"),
    },
    ClassificationRule {
        name: "existential_deposit",
        patterns: &[
            "existential deposit",
            "existentialdeposit",
            "would be reaped",
            "reaped",
            "below minimum",
            "belowminimum",
            "would kill account",
            "keepalive",
        ],
        category: ErrorCategory::UserError,
        should_retry: false,
        user_message: NonEmptyStaticStr::new(
            "This transfer would leave an account below the existential deposit",
        ),
        suggested_fix: Some("Send a larger amount or leave enough to keep the account alive"),
    },
    ClassificationRule {
        name: "invalid_amount",
        patterns: &[
            "invalid amount",
            "amount must be",
            "amount too small",
            "zero amount",
            "amount is zero",
            "negative amount",
        ],
        category: ErrorCategory::UserError,
        should_retry: false,
        user_message: NonEmptyStaticStr::new("The transfer amount is not valid"),
        suggested_fix: Some("Enter a positive amount within the token's precision"),
    },
    ClassificationRule {
        name: "unknown_asset",
        patterns: UNKNOWN_ASSET_PATTERNS,
        category: ErrorCategory::ConfigurationError,
        should_retry: true,
        user_message: NonEmptyStaticStr::new("This asset is not available on the selected chain"),
        suggested_fix: Some("Retry on the alternate chain, where the asset may be registered"),
    },
    ClassificationRule {
        name: "call_not_found",
        patterns: CALL_NOT_FOUND_PATTERNS,
        category: ErrorCategory::ConfigurationError,
        should_retry: true,
        user_message: NonEmptyStaticStr::new(
            "The selected chain does not support this transfer method",
        ),
        suggested_fix: Some("Retry on the alternate chain or with a different transfer method"),
    },
    ClassificationRule {
        name: "runtime_trap",
        patterns: TRAP_PATTERNS,
        category: ErrorCategory::ConfigurationError,
        should_retry: true,
        user_message: NonEmptyStaticStr::new("The chain rejected this transaction"),
        suggested_fix: Some("Possibly wrong chain; retry on the alternate chain"),
    },
    ClassificationRule {
        name: "dispatch_error",
        patterns: &[
            "module error",
            "moduleerror",
            "dispatch error",
            "dispatcherror",
            "dispatch_error",
        ],
        category: ErrorCategory::ConfigurationError,
        should_retry: true,
        user_message: NonEmptyStaticStr::new("The transaction failed during execution"),
        suggested_fix: Some("Check the transfer parameters and retry"),
    },
    ClassificationRule {
        name: "token_error",
        patterns: &[
            "tokenerror",
            "token error",
            "liquidity restrictions",
            "liquidityrestrictions",
            "funds unavailable",
            "fundsunavailable",
            "frozen",
        ],
        category: ErrorCategory::ConfigurationError,
        should_retry: true,
        user_message: NonEmptyStaticStr::new("The funds cannot be moved on this chain"),
        suggested_fix: Some("Retry on the alternate chain"),
    },
    ClassificationRule {
        name: "no_providers",
        patterns: NO_PROVIDERS_PATTERNS,
        category: ErrorCategory::ConfigurationError,
        should_retry: true,
        user_message: NonEmptyStaticStr::new(
            "The account cannot exist on this chain without a provider",
        ),
        suggested_fix: Some("Send from the opposite chain class (asset hub <-> relay)"),
    },
    ClassificationRule {
        name: "network",
        patterns: &[
            "network",
            "timeout",
            "timed out",
            "connection",
            "disconnected",
            "websocket",
            "rpc",
            "econnrefused",
            "socket",
        ],
        category: ErrorCategory::NetworkError,
        should_retry: true,
        user_message: NonEmptyStaticStr::new("A network problem interrupted the transaction"),
        suggested_fix: None,
    },
];

pub const UNKNOWN_RULE: ClassificationRule = ClassificationRule {
    name: "unknown",
    patterns: &[],
    category: ErrorCategory::UnknownError,
    should_retry: true,
    user_message: NonEmptyStaticStr::new("An unexpected error occurred"),
    suggested_fix: Some("Retry once on the alternate chain"),
};

#[must_use]
pub fn rule_named(name: &str) -> Option<&'static ClassificationRule> {
    CLASSIFICATION_RULES
        .iter()
        .chain(iter::once(&UNKNOWN_RULE))
        .find(|rule| rule.name == name)
}

/// Classify a raw failure message. Never fails; unmatched input is `UNKNOWN_ERROR`.
#[must_use]
pub fn classify(raw: &str) -> ErrorAnalysis {
    let lowered = raw.to_lowercase();
    let rule = CLASSIFICATION_RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .unwrap_or(&UNKNOWN_RULE);
    debug!(rule = rule.name, category = %rule.category, "Classified failure");
    rule.analysis(raw)
}

pub(crate) fn matches_any(lowered: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| lowered.contains(p))
}

/// Handle for code that wants the classifier as a value (e.g. in a shared context).
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    #[must_use]
    pub fn classify(&self, raw: &str) -> ErrorAnalysis {
        classify(raw)
    }

    #[must_use]
    pub fn rules(&self) -> &'static [ClassificationRule] {
        CLASSIFICATION_RULES
    }
}
