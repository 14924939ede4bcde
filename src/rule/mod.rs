//! Rules route fetched responses to response processors
//!
//! A [`RuleManager`] holds an ordered list of [`Rule`]s; the first rule whose
//! predicate accepts a response handles it. Each rule names exactly one
//! processor.

mod manager;
mod regex_rule;
mod sitemaps_rule;

pub use manager::DefaultRuleManager;
pub use regex_rule::{RegexRule, RuleField};
pub use sitemaps_rule::SitemapsRule;

use crate::entity::ResponseData;
use crate::processor::ResponseProcessor;
use std::sync::Arc;

/// Predicate over a response plus the processor that handles it
pub trait Rule: Send + Sync {
    fn rule_id(&self) -> &str;

    /// Returns true if this rule handles `response`
    fn matches(&self, response: &ResponseData) -> bool;

    /// The processor invoked for matched responses
    fn processor(&self) -> Option<Arc<dyn ResponseProcessor>>;
}

/// Maps a response to the rule that handles it
pub trait RuleManager: Send + Sync {
    /// Returns the first rule matching `response`, if any
    fn get_rule(&self, response: &ResponseData) -> Option<Arc<dyn Rule>>;
}
