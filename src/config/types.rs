use crate::context::{DEFAULT_MAX_THREAD_CHECK_COUNT, DEFAULT_NUM_OF_THREAD};
use crate::interval::IntervalConfig;
use serde::Deserialize;

/// Main configuration structure for Sumi-Trawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seed URLs registered at depth 0
    #[serde(default)]
    pub seeds: Vec<String>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub interval: IntervalConfig,

    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    pub output: OutputConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    /// Response routing rules, tried in order
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleConfig>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent workers
    pub num_of_thread: i32,

    /// Consecutive empty polls a worker tolerates before it may stop
    pub max_thread_check_count: i32,

    /// Maximum depth to crawl from seed URLs; negative is unlimited
    pub max_depth: i32,

    /// Maximum number of accesses per session; zero is unlimited
    pub max_access_count: i64,

    /// Return from execute immediately and crawl in the background
    pub background: bool,

    /// Fetch robots.txt once per origin and honour its rules
    pub robots_txt_enabled: bool,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            num_of_thread: DEFAULT_NUM_OF_THREAD,
            max_thread_check_count: DEFAULT_MAX_THREAD_CHECK_COUNT,
            max_depth: -1,
            max_access_count: 0,
            background: false,
            robots_txt_enabled: true,
            request_timeout_secs: 30,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the robots.txt agent token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// URL filter configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FilterConfig {
    /// Regexes a URL must match one of, when any are given
    pub include: Vec<String>,

    /// Regexes that reject a URL
    pub exclude: Vec<String>,

    /// Derive an include pattern from each seed's directory
    pub scope_to_seeds: bool,
}

/// Processor a rule dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessorKind {
    #[default]
    Default,
    Sitemaps,
}

/// Transformer used by the default processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformerKind {
    #[default]
    Html,
    Raw,
}

/// One `[[rule]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuleConfig {
    pub rule_id: String,

    #[serde(default)]
    pub url_pattern: Option<String>,

    #[serde(default)]
    pub mime_type_pattern: Option<String>,

    #[serde(default)]
    pub method_pattern: Option<String>,

    /// Require every pattern to match instead of any one
    #[serde(default = "default_true")]
    pub all_required: bool,

    /// Match every response; meant for the last rule
    #[serde(default, rename = "default")]
    pub default_rule: bool,

    #[serde(default)]
    pub processor: ProcessorKind,

    #[serde(default)]
    pub transformer: TransformerKind,
}

fn default_true() -> bool {
    true
}
