//! Regex-based rule matching on response fields

use super::Rule;
use crate::entity::ResponseData;
use crate::processor::ResponseProcessor;
use regex::Regex;
use std::sync::Arc;

/// Response field a [`RegexRule`] pattern is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleField {
    Url,
    MimeType,
    Method,
    ParentUrl,
}

impl RuleField {
    fn value<'a>(&self, response: &'a ResponseData) -> Option<&'a str> {
        match self {
            Self::Url => Some(response.url.as_str()),
            Self::MimeType => response.mime_type.as_deref(),
            Self::Method => Some(response.method.as_str()),
            Self::ParentUrl => response.parent_url.as_deref(),
        }
    }
}

/// Rule that matches when response fields match regex patterns
///
/// With `all_required` every configured pattern must match; otherwise any
/// one is enough. A default rule matches every response and is meant to
/// sit last in a rule manager.
pub struct RegexRule {
    rule_id: String,
    patterns: Vec<(RuleField, Regex)>,
    all_required: bool,
    default_rule: bool,
    processor: Option<Arc<dyn ResponseProcessor>>,
}

impl RegexRule {
    pub fn new(rule_id: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            patterns: Vec::new(),
            all_required: true,
            default_rule: false,
            processor: None,
        }
    }

    /// Adds a pattern for `field`; the pattern must match the whole value
    ///
    /// # Errors
    ///
    /// Returns the regex error if `pattern` does not compile.
    pub fn with_pattern(mut self, field: RuleField, pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        self.patterns.push((field, regex));
        Ok(self)
    }

    pub fn all_required(mut self, all_required: bool) -> Self {
        self.all_required = all_required;
        self
    }

    pub fn default_rule(mut self, default_rule: bool) -> Self {
        self.default_rule = default_rule;
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn ResponseProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn is_default_rule(&self) -> bool {
        self.default_rule
    }

    fn field_matches(response: &ResponseData, field: RuleField, regex: &Regex) -> bool {
        field
            .value(response)
            .map(|value| regex.is_match(value))
            .unwrap_or(false)
    }
}

impl Rule for RegexRule {
    fn rule_id(&self) -> &str {
        &self.rule_id
    }

    fn matches(&self, response: &ResponseData) -> bool {
        if self.default_rule {
            return true;
        }
        if self.patterns.is_empty() {
            return false;
        }

        let mut results = self
            .patterns
            .iter()
            .map(|(field, regex)| Self::field_matches(response, *field, regex));
        if self.all_required {
            results.all(|matched| matched)
        } else {
            results.any(|matched| matched)
        }
    }

    fn processor(&self) -> Option<Arc<dyn ResponseProcessor>> {
        self.processor.clone()
    }
}
