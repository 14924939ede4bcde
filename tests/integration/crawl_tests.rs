//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and temporary
//! directories to run full crawl sessions end-to-end against SQLite.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use sumi_trawl::config::{load_config, Config};
use sumi_trawl::container::ContainerSignal;
use sumi_trawl::crawler::Crawler;
use sumi_trawl::interval::IntervalConfig;
use sumi_trawl::service::{DataService, SqliteStorage, UrlQueueService};
use sumi_trawl::CrawlerStatus;
use tempfile::{NamedTempFile, TempDir};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Loads a test configuration with the given extra TOML, using no delays
fn create_test_config(db_path: &str, extra: &str) -> Config {
    let content = format!(
        r#"
{extra}

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{db_path}"
"#
    );

    let mut file = NamedTempFile::new().expect("Failed to create temp config");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp config");
    let mut config = load_config(file.path()).expect("Failed to load test config");
    config.interval = IntervalConfig::no_wait();
    config
}

struct TestEnv {
    _dir: TempDir,
    db_path: String,
    storage: Arc<SqliteStorage>,
}

impl TestEnv {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = dir.path().join("trawl.db").to_string_lossy().into_owned();
        let storage = Arc::new(
            SqliteStorage::new(std::path::Path::new(&db_path)).expect("Failed to open database"),
        );
        Self {
            _dir: dir,
            db_path,
            storage,
        }
    }

    fn config(&self, extra: &str) -> Config {
        create_test_config(&self.db_path, extra)
    }

    async fn crawler(&self, config: &Config, signal: Arc<ContainerSignal>) -> Crawler {
        let url_queue: Arc<dyn UrlQueueService> = self.storage.clone();
        let data_service: Arc<dyn DataService> = self.storage.clone();
        Crawler::from_config(config, url_queue, data_service, signal)
            .await
            .expect("Failed to build crawler")
    }

    async fn stored_urls(&self, session_id: &str) -> Vec<String> {
        let mut urls = DataService::urls(self.storage.as_ref(), session_id)
            .await
            .expect("Failed to list results");
        urls.sort();
        urls
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

fn links(prefix: &str, count: usize) -> String {
    (0..count)
        .map(|n| format!("<a href=\"{}/{}\">page {}</a>", prefix, n, n))
        .collect()
}

#[tokio::test]
async fn test_access_budget_is_exact() {
    let mock_server = MockServer::start().await;
    let hub = links("/p", 80);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&hub))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/p/\d+$"))
        .respond_with(html(&hub))
        .mount(&mock_server)
        .await;

    let env = TestEnv::new();
    let config = env.config(&format!(
        r#"
seeds = ["{}/"]

[crawler]
num-of-thread = 10
max-access-count = 50
"#,
        mock_server.uri()
    ));

    let crawler = env.crawler(&config, Arc::new(ContainerSignal::new())).await;
    let session_id = crawler.execute().await.expect("Crawl failed");

    assert_eq!(crawler.crawler_context().access_count(), 50);
    assert_eq!(crawler.crawler_context().status(), CrawlerStatus::Done);
    assert_eq!(env.stored_urls(&session_id).await.len(), 50);
}

#[tokio::test]
async fn test_file_tree_respects_max_depth() {
    let tree = TempDir::new().expect("Failed to create file tree");
    std::fs::write(tree.path().join("a.txt"), "alpha").unwrap();
    std::fs::create_dir(tree.path().join("sub")).unwrap();
    std::fs::write(tree.path().join("sub").join("b.txt"), "beta").unwrap();

    let root = url::Url::from_directory_path(tree.path())
        .expect("Failed to build directory URL")
        .to_string();

    let env = TestEnv::new();
    let config = env.config(&format!(
        r#"
seeds = ["{root}"]

[crawler]
num-of-thread = 2
max-depth = 1

[[rule]]
rule-id = "files"
default = true
transformer = "raw"
"#
    ));

    let crawler = env.crawler(&config, Arc::new(ContainerSignal::new())).await;
    let session_id = crawler.execute().await.expect("Crawl failed");

    // sub/b.txt sits at depth 2
    let urls = env.stored_urls(&session_id).await;
    assert_eq!(urls, vec![format!("{}a.txt", root)]);

    let stored = DataService::get(env.storage.as_ref(), &session_id, &urls[0])
        .await
        .unwrap()
        .expect("Result should be stored");
    assert_eq!(stored.data, b"alpha");
    assert_eq!(stored.rule_id.as_deref(), Some("files"));
}

#[tokio::test]
async fn test_container_shutdown_stops_workers() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(&links("/p", 5)))
        .mount(&mock_server)
        .await;

    let env = TestEnv::new();
    let config = env.config(&format!(r#"seeds = ["{}/"]"#, mock_server.uri()));

    let signal = Arc::new(ContainerSignal::new());
    let crawler = env.crawler(&config, signal.clone()).await;
    signal.shutdown();

    let session_id = crawler.execute().await.expect("Crawl failed");

    assert_eq!(crawler.crawler_context().access_count(), 0);
    assert!(env.stored_urls(&session_id).await.is_empty());
    // The seed is still waiting for a later run
    let pending = UrlQueueService::len(env.storage.as_ref(), &session_id)
        .await
        .unwrap();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn test_background_session_can_be_stopped() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(&links("/p", 200)).set_delay(Duration::from_millis(50)))
        .mount(&mock_server)
        .await;

    let env = TestEnv::new();
    let mut config = env.config(&format!(
        r#"
seeds = ["{}/"]

[crawler]
num-of-thread = 2
background = true
"#,
        mock_server.uri()
    ));
    config.crawler.robots_txt_enabled = false;

    let crawler = env.crawler(&config, Arc::new(ContainerSignal::new())).await;
    crawler.execute().await.expect("Crawl failed");
    assert_eq!(crawler.crawler_context().status(), CrawlerStatus::Running);

    tokio::time::sleep(Duration::from_millis(200)).await;
    crawler.stop();
    let accessed_at_stop = crawler.crawler_context().access_count();

    assert!(crawler.await_termination(Some(Duration::from_secs(5))).await);
    // Only fetches already in flight may still finish, one per worker
    let accessed = crawler.crawler_context().access_count();
    assert!(accessed >= accessed_at_stop);
    assert!(accessed <= accessed_at_stop + 2);
    assert!(accessed < 201);
}

#[tokio::test]
async fn test_concurrent_sessions_share_storage() {
    let server_a = MockServer::start().await;
    let server_b = MockServer::start().await;
    for server in [&server_a, &server_b] {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(&links("/p", 3)))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/p/\d+$"))
            .respond_with(html(""))
            .mount(server)
            .await;
    }

    let env = TestEnv::new();
    let config_a = env.config(&format!(r#"seeds = ["{}/"]"#, server_a.uri()));
    let config_b = env.config(&format!(r#"seeds = ["{}/"]"#, server_b.uri()));

    let crawler_a = env.crawler(&config_a, Arc::new(ContainerSignal::new())).await;
    crawler_a.set_session_id("alpha");
    let crawler_b = env.crawler(&config_b, Arc::new(ContainerSignal::new())).await;
    crawler_b.set_session_id("beta");

    let (a, b) = tokio::join!(crawler_a.execute(), crawler_b.execute());
    assert_eq!(a.unwrap(), "alpha");
    assert_eq!(b.unwrap(), "beta");

    let alpha = env.stored_urls("alpha").await;
    let beta = env.stored_urls("beta").await;
    assert_eq!(alpha.len(), 4);
    assert_eq!(beta.len(), 4);
    assert!(alpha.iter().all(|url| url.starts_with(&server_a.uri())));
    assert!(beta.iter().all(|url| url.starts_with(&server_b.uri())));

    crawler_a.cleanup("alpha").await.unwrap();
    assert!(env.stored_urls("alpha").await.is_empty());
    assert_eq!(env.stored_urls("beta").await.len(), 4);
}

#[tokio::test]
async fn test_unmatched_responses_are_not_stored() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&links("/p", 2)))
        .mount(&mock_server)
        .await;

    let env = TestEnv::new();
    let config = env.config(&format!(
        r#"
seeds = ["{}/"]

[[rule]]
rule-id = "pdf"
url-pattern = ".*\\.pdf"
"#,
        mock_server.uri()
    ));

    let crawler = env.crawler(&config, Arc::new(ContainerSignal::new())).await;
    let session_id = crawler.execute().await.expect("Crawl failed");

    assert_eq!(crawler.crawler_context().access_count(), 1);
    assert!(env.stored_urls(&session_id).await.is_empty());
}

#[tokio::test]
async fn test_robots_txt_disallow_is_honoured() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            "<a href=\"/public/page\">public</a><a href=\"/private/page\">private</a>",
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public/page"))
        .respond_with(html(""))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(html(""))
        .expect(0)
        .mount(&mock_server)
        .await;

    let env = TestEnv::new();
    let config = env.config(&format!(r#"seeds = ["{}/"]"#, base));

    let crawler = env.crawler(&config, Arc::new(ContainerSignal::new())).await;
    let session_id = crawler.execute().await.expect("Crawl failed");

    assert_eq!(
        env.stored_urls(&session_id).await,
        vec![format!("{}/", base), format!("{}/public/page", base)]
    );
}

#[tokio::test]
async fn test_redirect_location_is_followed() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html("moved here"))
        .mount(&mock_server)
        .await;

    let env = TestEnv::new();
    let config = env.config(&format!(r#"seeds = ["{}/old"]"#, base));

    let crawler = env.crawler(&config, Arc::new(ContainerSignal::new())).await;
    let session_id = crawler.execute().await.expect("Crawl failed");

    assert_eq!(
        env.stored_urls(&session_id).await,
        vec![format!("{}/new", base)]
    );
    assert_eq!(crawler.crawler_context().access_count(), 2);
}
