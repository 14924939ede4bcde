use super::{Rule, RuleManager};
use crate::entity::ResponseData;
use std::sync::{Arc, PoisonError, RwLock};

/// Ordered rule list; the first matching rule wins
#[derive(Default)]
pub struct DefaultRuleManager {
    rules: RwLock<Vec<Arc<dyn Rule>>>,
}

impl DefaultRuleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule
    pub fn add_rule(&self, rule: Arc<dyn Rule>) {
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(rule);
    }

    /// Inserts a rule at `index`, appending if `index` is past the end
    pub fn add_rule_at(&self, index: usize, rule: Arc<dyn Rule>) {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        let index = index.min(rules.len());
        rules.insert(index, rule);
    }

    /// Removes the rule with `rule_id`, returning true if one was removed
    pub fn remove_rule(&self, rule_id: &str) -> bool {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        let before = rules.len();
        rules.retain(|rule| rule.rule_id() != rule_id);
        rules.len() != before
    }

    pub fn has_rule(&self, rule_id: &str) -> bool {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|rule| rule.rule_id() == rule_id)
    }

    pub fn rule_ids(&self) -> Vec<String> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|rule| rule.rule_id().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RuleManager for DefaultRuleManager {
    fn get_rule(&self, response: &ResponseData) -> Option<Arc<dyn Rule>> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|rule| rule.matches(response))
            .cloned()
    }
}
