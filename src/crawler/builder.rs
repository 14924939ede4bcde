//! Wiring a [`Crawler`] from a loaded [`Config`]

use super::Crawler;
use crate::client::{CrawlerClientFactory, HttpClient};
use crate::config::{Config, ProcessorKind, RuleConfig, TransformerKind};
use crate::container::CrawlerContainer;
use crate::filter::{RegexUrlFilter, UrlFilter};
use crate::interval::DefaultIntervalController;
use crate::processor::{DefaultResponseProcessor, ResponseProcessor, SitemapsResponseProcessor};
use crate::rule::{DefaultRuleManager, RegexRule, RuleField, SitemapsRule};
use crate::service::{DataService, UrlQueueService};
use crate::transformer::{HtmlTransformer, RawTransformer, Transformer};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Rule ids used when the configuration declares no rules
pub const DEFAULT_SITEMAPS_RULE_ID: &str = "sitemapsRule";
pub const DEFAULT_HTML_RULE_ID: &str = "defaultRule";

fn processor_for(
    processor: ProcessorKind,
    transformer: TransformerKind,
    data_service: &Arc<dyn DataService>,
) -> Arc<dyn ResponseProcessor> {
    match processor {
        ProcessorKind::Sitemaps => Arc::new(SitemapsResponseProcessor::new()),
        ProcessorKind::Default => {
            let transformer: Arc<dyn Transformer> = match transformer {
                TransformerKind::Html => Arc::new(HtmlTransformer::new()),
                TransformerKind::Raw => Arc::new(RawTransformer::new()),
            };
            Arc::new(DefaultResponseProcessor::new(
                transformer,
                Arc::clone(data_service),
            ))
        }
    }
}

fn build_rule(rule: &RuleConfig, data_service: &Arc<dyn DataService>) -> Result<RegexRule> {
    let mut built = RegexRule::new(rule.rule_id.clone())
        .all_required(rule.all_required)
        .default_rule(rule.default_rule)
        .with_processor(processor_for(rule.processor, rule.transformer, data_service));

    let patterns = [
        (RuleField::Url, &rule.url_pattern),
        (RuleField::MimeType, &rule.mime_type_pattern),
        (RuleField::Method, &rule.method_pattern),
    ];
    for (field, pattern) in patterns {
        if let Some(pattern) = pattern {
            built = built.with_pattern(field, pattern)?;
        }
    }
    Ok(built)
}

/// Builds the rule manager for `rules`
///
/// Without configured rules, sitemap documents go to the sitemaps processor
/// and everything else to the HTML processor.
pub fn build_rule_manager(
    rules: &[RuleConfig],
    data_service: &Arc<dyn DataService>,
) -> Result<DefaultRuleManager> {
    let manager = DefaultRuleManager::new();

    if rules.is_empty() {
        manager.add_rule(Arc::new(
            SitemapsRule::new(DEFAULT_SITEMAPS_RULE_ID)
                .with_processor(Arc::new(SitemapsResponseProcessor::new())),
        ));
        manager.add_rule(Arc::new(
            RegexRule::new(DEFAULT_HTML_RULE_ID)
                .default_rule(true)
                .with_processor(processor_for(
                    ProcessorKind::Default,
                    TransformerKind::Html,
                    data_service,
                )),
        ));
        return Ok(manager);
    }

    for rule in rules {
        manager.add_rule(Arc::new(build_rule(rule, data_service)?));
    }
    Ok(manager)
}

impl Crawler {
    /// Builds a crawler for `config` over the given stores and registers
    /// the configured seeds
    pub async fn from_config(
        config: &Config,
        url_queue: Arc<dyn UrlQueueService>,
        data_service: Arc<dyn DataService>,
        container: Arc<dyn CrawlerContainer>,
    ) -> Result<Self> {
        let http = HttpClient::with_timeout(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout_secs),
        )?
        .with_robots_txt(config.crawler.robots_txt_enabled);
        let client_factory = Arc::new(CrawlerClientFactory::with_defaults(Arc::new(http)));

        let url_filter: Arc<dyn UrlFilter> = if config.filter.scope_to_seeds {
            Arc::new(RegexUrlFilter::scoped_to_seeds())
        } else {
            Arc::new(RegexUrlFilter::new())
        };

        let rule_manager = build_rule_manager(&config.rules, &data_service)?;

        let mut crawler = Crawler::new(url_queue, data_service, client_factory)
            .with_container(container)
            .with_url_filter(url_filter);
        crawler.set_background(config.crawler.background);
        crawler.set_rule_manager(Arc::new(rule_manager));
        crawler.set_interval_controller(Arc::new(DefaultIntervalController::from_config(
            &config.interval,
        )));
        crawler.set_num_of_thread(config.crawler.num_of_thread);
        crawler.set_max_thread_check_count(config.crawler.max_thread_check_count);
        crawler.set_max_depth(config.crawler.max_depth);
        crawler.set_max_access_count(config.crawler.max_access_count);

        for pattern in &config.filter.include {
            crawler.add_include_filter(pattern);
        }
        for pattern in &config.filter.exclude {
            crawler.add_exclude_filter(pattern);
        }
        for seed in &config.seeds {
            crawler.add_url(seed);
        }

        Ok(crawler)
    }
}
