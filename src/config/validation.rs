use crate::config::types::{Config, CrawlerConfig, FilterConfig, OutputConfig, RuleConfig, UserAgentConfig};
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_seeds(&config.seeds)?;
    validate_filter_config(&config.filter)?;
    validate_rules(&config.rules)?;
    Ok(())
}

/// Validates crawler configuration
///
/// Zero or negative thread counts are accepted and produce a session that
/// finishes immediately.
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.num_of_thread <= 0 {
        tracing::warn!(
            "num-of-thread is {}; sessions will finish without crawling",
            config.num_of_thread
        );
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed URLs: http, https and file schemes are crawlable
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if !matches!(url.scheme(), "http" | "https" | "file") {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http, https or file scheme",
                seed
            )));
        }
    }

    Ok(())
}

fn validate_pattern(pattern: &str, what: &str) -> Result<(), ConfigError> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern(format!("Invalid {} '{}': {}", what, pattern, e)))
}

/// Validates filter patterns
fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    for pattern in &config.include {
        validate_pattern(pattern, "include pattern")?;
    }
    for pattern in &config.exclude {
        validate_pattern(pattern, "exclude pattern")?;
    }
    Ok(())
}

/// Validates rule entries
fn validate_rules(rules: &[RuleConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for rule in rules {
        if rule.rule_id.is_empty() {
            return Err(ConfigError::Validation(
                "rule-id cannot be empty".to_string(),
            ));
        }

        if !seen.insert(rule.rule_id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate rule-id '{}'",
                rule.rule_id
            )));
        }

        let patterns = [
            &rule.url_pattern,
            &rule.mime_type_pattern,
            &rule.method_pattern,
        ];
        for pattern in patterns.into_iter().flatten() {
            validate_pattern(pattern, "rule pattern")?;
        }

        if !rule.default_rule && patterns.iter().all(|p| p.is_none()) {
            return Err(ConfigError::Validation(format!(
                "Rule '{}' needs at least one pattern or default = true",
                rule.rule_id
            )));
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{ProcessorKind, TransformerKind};

    fn rule(id: &str, url_pattern: Option<&str>) -> RuleConfig {
        RuleConfig {
            rule_id: id.to_string(),
            url_pattern: url_pattern.map(str::to_string),
            mime_type_pattern: None,
            method_pattern: None,
            all_required: true,
            default_rule: false,
            processor: ProcessorKind::Default,
            transformer: TransformerKind::Html,
        }
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }

    #[test]
    fn test_validate_seeds() {
        assert!(validate_seeds(&["https://example.com/".to_string()]).is_ok());
        assert!(validate_seeds(&["file:///data/docs/".to_string()]).is_ok());
        assert!(validate_seeds(&["ftp://example.com/".to_string()]).is_err());
        assert!(matches!(
            validate_seeds(&["not a url".to_string()]),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_validate_filter_patterns() {
        let config = FilterConfig {
            include: vec!["https://example\\.com/.*".to_string()],
            exclude: vec!["[broken".to_string()],
            scope_to_seeds: false,
        };
        assert!(matches!(
            validate_filter_config(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_validate_rules() {
        assert!(validate_rules(&[rule("html", Some(".*"))]).is_ok());
        assert!(validate_rules(&[rule("html", Some(".*")), rule("html", Some(".*"))]).is_err());
        assert!(validate_rules(&[rule("empty", None)]).is_err());
        assert!(validate_rules(&[rule("bad", Some("(unclosed"))]).is_err());

        let mut fallback = rule("fallback", None);
        fallback.default_rule = true;
        assert!(validate_rules(&[fallback]).is_ok());
    }

    #[test]
    fn test_non_positive_threads_are_accepted() {
        let config = CrawlerConfig {
            num_of_thread: 0,
            ..CrawlerConfig::default()
        };
        assert!(validate_crawler_config(&config).is_ok());
    }
}
