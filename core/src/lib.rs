//! Pure decision logic for dotexec.
//!
//! This crate decides what a failure means and what to do about it. It does
//! no IO and never fails: every input yields an [`ErrorAnalysis`] and every
//! analysis yields either a [`RetryStrategy`] or a stop.
//!
//! - [`classify`] maps a raw failure onto the four-category taxonomy using the
//!   ordered [`CLASSIFICATION_RULES`] table.
//! - [`RetryPlanner`] turns an analysis into at most one correction for the
//!   next attempt.
//!
//! [`ErrorAnalysis`]: dotexec_types::ErrorAnalysis
//! [`RetryStrategy`]: dotexec_types::RetryStrategy

mod classifier;
mod planner;

pub use classifier::{
    CLASSIFICATION_RULES, ClassificationRule, ErrorClassifier, UNKNOWN_RULE, classify, rule_named,
};
pub use planner::RetryPlanner;
