//! Crawl session orchestration
//!
//! A [`Crawler`] owns the [`CrawlerContext`] of one session, registers seed
//! URLs, spawns the worker pool and reports completion through a watch
//! channel that both foreground execution and [`Crawler::await_termination`]
//! wait on.

use super::worker::CrawlerThread;
use crate::client::CrawlerClientFactory;
use crate::container::{ContainerSignal, CrawlerContainer};
use crate::context::{CrawlerContext, CrawlerStatus, WorkerId};
use crate::filter::{RegexUrlFilter, UrlFilter};
use crate::interval::{DefaultIntervalController, IntervalController};
use crate::rule::RuleManager;
use crate::service::{DataService, UrlQueueService};
use crate::{Result, TrawlError};
use chrono::Local;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Format of generated session ids, e.g. `20240131235959123`
const SESSION_ID_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Last id handed out by [`generate_session_id`]
static LAST_SESSION_ID: AtomicU64 = AtomicU64::new(0);

/// Generates a session id from the current local time
///
/// Ids are unique within the process: a call landing in the same
/// millisecond as the previous one is bumped past it.
pub fn generate_session_id() -> String {
    let stamp: u64 = Local::now()
        .format(SESSION_ID_FORMAT)
        .to_string()
        .parse()
        .unwrap_or(0);

    let mut last = LAST_SESSION_ID.load(Ordering::SeqCst);
    loop {
        let next = stamp.max(last + 1);
        match LAST_SESSION_ID.compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return next.to_string(),
            Err(current) => last = current,
        }
    }
}

/// Runs one crawl session over a pool of [`CrawlerThread`] workers
pub struct Crawler {
    context: Arc<CrawlerContext>,
    url_queue: Arc<dyn UrlQueueService>,
    data_service: Arc<dyn DataService>,
    client_factory: Arc<CrawlerClientFactory>,
    container: Arc<dyn CrawlerContainer>,
    url_filter: Arc<dyn UrlFilter>,
    background: bool,
    /// Session id requested through [`Crawler::set_session_id`]
    requested_session_id: Mutex<Option<String>>,
    /// Seeds registered since the last execute
    seeds: Mutex<Vec<String>>,
    done: Mutex<Option<watch::Receiver<bool>>>,
}

impl Crawler {
    /// Creates a crawler with a [`RegexUrlFilter`] and the default interval
    /// controller
    ///
    /// The session id is assigned by [`Crawler::execute`].
    pub fn new(
        url_queue: Arc<dyn UrlQueueService>,
        data_service: Arc<dyn DataService>,
        client_factory: Arc<CrawlerClientFactory>,
    ) -> Self {
        let context = Arc::new(CrawlerContext::new());

        let url_filter: Arc<dyn UrlFilter> = Arc::new(RegexUrlFilter::new());
        context.set_url_filter(Some(url_filter.clone()));
        context.set_interval_controller(Some(Arc::new(DefaultIntervalController::new())));

        Self {
            context,
            url_queue,
            data_service,
            client_factory,
            container: Arc::new(ContainerSignal::new()),
            url_filter,
            background: false,
            requested_session_id: Mutex::new(None),
            seeds: Mutex::new(Vec::new()),
            done: Mutex::new(None),
        }
    }

    pub fn with_container(mut self, container: Arc<dyn CrawlerContainer>) -> Self {
        self.container = container;
        self
    }

    /// Replaces the URL filter; call before registering seeds
    pub fn with_url_filter(mut self, url_filter: Arc<dyn UrlFilter>) -> Self {
        self.context.set_url_filter(Some(url_filter.clone()));
        self.url_filter = url_filter;
        self
    }

    pub fn crawler_context(&self) -> &Arc<CrawlerContext> {
        &self.context
    }

    pub fn session_id(&self) -> String {
        self.context.session_id()
    }

    pub fn url_filter(&self) -> &Arc<dyn UrlFilter> {
        &self.url_filter
    }

    pub fn data_service(&self) -> &Arc<dyn DataService> {
        &self.data_service
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    pub fn set_background(&mut self, background: bool) {
        self.background = background;
    }

    pub fn set_rule_manager(&self, rule_manager: Arc<dyn RuleManager>) {
        self.context.set_rule_manager(Some(rule_manager));
    }

    pub fn set_interval_controller(&self, controller: Arc<dyn IntervalController>) {
        self.context.set_interval_controller(Some(controller));
    }

    pub fn set_num_of_thread(&self, num_of_thread: i32) {
        self.context.set_num_of_thread(num_of_thread);
    }

    pub fn set_max_depth(&self, max_depth: i32) {
        self.context.set_max_depth(max_depth);
    }

    pub fn set_max_access_count(&self, max_access_count: i64) {
        self.context.set_max_access_count(max_access_count);
    }

    pub fn set_max_thread_check_count(&self, count: i32) {
        self.context.set_max_thread_check_count(count);
    }

    pub fn add_include_filter(&self, pattern: &str) {
        self.url_filter.add_include(pattern);
    }

    pub fn add_exclude_filter(&self, pattern: &str) {
        self.url_filter.add_exclude(pattern);
    }

    /// Uses `session_id` for every following execute instead of a
    /// generated id
    pub fn set_session_id(&self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        self.context.set_session_id(session_id.clone());
        *self
            .requested_session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(session_id);
    }

    /// Registers a seed URL at depth 0
    ///
    /// Seeds are queued under the session id when [`Crawler::execute`] runs.
    pub fn add_url(&self, url: &str) {
        let url = url.trim();
        if url.is_empty() {
            return;
        }

        self.url_filter.process_url(url);
        self.seeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        tracing::debug!("Added seed {}", url);
    }

    /// Starts the session and returns its id
    ///
    /// In foreground mode this returns once every worker exited and the
    /// status is DONE. In background mode it returns right away.
    pub async fn execute(&self) -> Result<String> {
        if self.context.status() == CrawlerStatus::Running {
            return Err(TrawlError::AlreadyRunning {
                session_id: self.context.session_id(),
            });
        }

        let requested = self
            .requested_session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let session_id = requested.unwrap_or_else(generate_session_id);
        self.context.set_session_id(session_id.clone());
        self.url_filter.init(&session_id);

        let seeds = std::mem::take(&mut *self.seeds.lock().unwrap_or_else(PoisonError::into_inner));
        for seed in &seeds {
            self.url_queue.add(&session_id, seed).await?;
        }

        let num_of_thread = self.context.num_of_thread().max(0);
        let (done_tx, done_rx) = watch::channel(false);
        *self.done.lock().unwrap_or_else(PoisonError::into_inner) = Some(done_rx);

        self.context.set_status(CrawlerStatus::Running);
        tracing::info!(
            "Starting session {} with {} workers",
            session_id,
            num_of_thread
        );

        let workers: Vec<JoinHandle<()>> = (0..num_of_thread as usize)
            .map(|slot| {
                let worker = CrawlerThread::new(
                    WorkerId(slot),
                    Arc::clone(&self.context),
                    Arc::clone(&self.url_queue),
                    Arc::clone(&self.client_factory),
                    Arc::clone(&self.container),
                );
                tokio::spawn(worker.run())
            })
            .collect();

        let context = Arc::clone(&self.context);
        tokio::spawn(async move {
            for handle in workers {
                if let Err(e) = handle.await {
                    tracing::error!("Worker terminated abnormally: {}", e);
                }
            }
            context.set_status(CrawlerStatus::Done);
            tracing::info!(
                "Session {} finished after {} accesses",
                context.session_id(),
                context.access_count()
            );
            let _ = done_tx.send(true);
        });

        if !self.background {
            self.await_termination(None).await;
        }

        Ok(session_id)
    }

    /// Waits until every worker of the running session has exited
    ///
    /// Returns false if `timeout` elapsed first. Returns true immediately if
    /// the session was never started.
    pub async fn await_termination(&self, timeout: Option<Duration>) -> bool {
        let receiver = self
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(mut receiver) = receiver else {
            return true;
        };

        let wait = async move {
            // A dropped sender means the monitor is gone, which only happens
            // after it finished
            let _ = receiver.wait_for(|done| *done).await;
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.is_ok(),
            None => {
                wait.await;
                true
            }
        }
    }

    /// Asks all workers to stop at their next loop iteration
    pub fn stop(&self) {
        tracing::info!("Stopping session {}", self.context.session_id());
        self.context.set_status(CrawlerStatus::Done);
    }

    /// Deletes the queue partition and stored results of `session_id` and
    /// clears the URL filter
    pub async fn cleanup(&self, session_id: &str) -> Result<()> {
        self.url_filter.clear();
        self.url_queue.delete(session_id).await?;
        self.data_service.delete(session_id).await?;
        tracing::info!("Cleaned up session {}", session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientResponse, CrawlerClient};
    use crate::context::CrawlScope;
    use crate::entity::{RequestData, ResponseData};
    use crate::interval::IntervalConfig;
    use crate::processor::DefaultResponseProcessor;
    use crate::rule::{DefaultRuleManager, RegexRule};
    use crate::service::{MemoryDataService, MemoryUrlQueueService};
    use crate::transformer::HtmlTransformer;
    use async_trait::async_trait;

    /// Serves a chain of pages `/0 -> /1 -> ... -> /n`
    struct ChainClient {
        len: usize,
    }

    #[async_trait]
    impl CrawlerClient for ChainClient {
        async fn execute(
            &self,
            scope: &CrawlScope<'_>,
            request: &RequestData,
        ) -> Result<ClientResponse> {
            tokio::time::sleep(Duration::from_millis(2)).await;
            let index: usize = request
                .url
                .rsplit('/')
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            let body = if index + 1 < self.len {
                format!(r#"<a href="/{}">next</a>"#, index + 1)
            } else {
                String::new()
            };
            let mut response = ResponseData::new(request.url.clone(), 200);
            response.session_id = scope.context.session_id();
            response.mime_type = Some("text/html".to_string());
            response.content = body.into_bytes();
            Ok(ClientResponse::Fetched(response))
        }
    }

    fn crawler(pages: usize) -> (Crawler, Arc<MemoryDataService>) {
        let data = Arc::new(MemoryDataService::new());
        let factory = CrawlerClientFactory::new();
        factory
            .add_client("https?://", Arc::new(ChainClient { len: pages }))
            .unwrap();

        let crawler = Crawler::new(
            Arc::new(MemoryUrlQueueService::new()),
            data.clone(),
            Arc::new(factory),
        );
        crawler.set_interval_controller(Arc::new(DefaultIntervalController::from_config(
            &IntervalConfig::no_wait(),
        )));
        crawler.set_max_thread_check_count(3);

        let manager = DefaultRuleManager::new();
        manager.add_rule(Arc::new(RegexRule::new("html").default_rule(true).with_processor(
            Arc::new(DefaultResponseProcessor::new(
                Arc::new(HtmlTransformer::new()),
                data.clone(),
            )),
        )));
        crawler.set_rule_manager(Arc::new(manager));
        (crawler, data)
    }

    #[test]
    fn test_session_id_format() {
        let id = generate_session_id();
        assert_eq!(id.len(), 17);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_session_ids_are_unique_within_a_millisecond() {
        let ids: Vec<String> = (0..100).map(|_| generate_session_id()).collect();
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[tokio::test]
    async fn test_foreground_execute_crawls_until_done() {
        let (crawler, data) = crawler(5);
        crawler.set_num_of_thread(3);
        crawler.add_url("https://example.com/0");

        let session_id = crawler.execute().await.unwrap();

        assert_eq!(session_id, crawler.session_id());
        assert_eq!(crawler.crawler_context().status(), CrawlerStatus::Done);
        assert_eq!(crawler.crawler_context().active_thread_count(), 0);
        assert_eq!(data.count(&session_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_background_execute_returns_before_done() {
        let (mut crawler, data) = crawler(3);
        crawler.set_background(true);
        crawler.set_num_of_thread(2);
        crawler.add_url("https://example.com/0");

        let session_id = crawler.execute().await.unwrap();
        assert!(crawler.await_termination(Some(Duration::from_secs(10))).await);
        assert_eq!(crawler.crawler_context().status(), CrawlerStatus::Done);
        assert_eq!(data.count(&session_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_zero_threads_finish_immediately() {
        let (crawler, data) = crawler(3);
        crawler.set_num_of_thread(0);
        crawler.add_url("https://example.com/0");

        let session_id = crawler.execute().await.unwrap();

        assert_eq!(crawler.crawler_context().status(), CrawlerStatus::Done);
        assert_eq!(data.count(&session_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_access_budget_is_exact_across_workers() {
        let (crawler, data) = crawler(40);
        crawler.set_num_of_thread(8);
        crawler.set_max_access_count(10);
        for i in 0..20 {
            crawler.add_url(&format!("https://example.com/{}", i));
        }

        let session_id = crawler.execute().await.unwrap();

        assert_eq!(crawler.crawler_context().access_count(), 10);
        assert_eq!(data.count(&session_id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_set_session_id_overrides_generated_id() {
        let (crawler, data) = crawler(2);
        crawler.add_url("https://example.com/0");
        crawler.set_session_id("custom");

        let session_id = crawler.execute().await.unwrap();

        assert_eq!(session_id, "custom");
        assert_eq!(data.count("custom").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_session_id_is_assigned_by_execute() {
        let queue = Arc::new(MemoryUrlQueueService::new());
        let first = Crawler::new(
            queue.clone(),
            Arc::new(MemoryDataService::new()),
            Arc::new(CrawlerClientFactory::new()),
        );
        let second = Crawler::new(
            queue.clone(),
            Arc::new(MemoryDataService::new()),
            Arc::new(CrawlerClientFactory::new()),
        );
        for crawler in [&first, &second] {
            crawler.set_num_of_thread(0);
            crawler.add_url("https://example.com/");
        }
        assert_eq!(first.session_id(), "");

        let first_id = first.execute().await.unwrap();
        let second_id = second.execute().await.unwrap();

        assert_ne!(first_id, second_id);
        assert_eq!(queue.len(&first_id).await.unwrap(), 1);
        assert_eq!(queue.len(&second_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_await_termination_before_execute() {
        let (crawler, _) = crawler(1);
        assert!(crawler.await_termination(Some(Duration::from_millis(1))).await);
    }

    #[tokio::test]
    async fn test_stop_ends_background_session() {
        let (mut crawler, _) = crawler(1_000);
        crawler.set_background(true);
        crawler.set_num_of_thread(2);
        crawler.add_url("https://example.com/0");

        crawler.execute().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        crawler.stop();
        let accessed_at_stop = crawler.crawler_context().access_count();

        assert!(crawler.await_termination(Some(Duration::from_secs(10))).await);
        let accessed = crawler.crawler_context().access_count();
        assert!(accessed <= accessed_at_stop + 2);
        assert!(accessed < 1_000);
    }

    #[tokio::test]
    async fn test_cleanup_removes_session_data() {
        let (crawler, data) = crawler(2);
        crawler.add_include_filter("https://example\\.com/.*");
        crawler.add_url("https://example.com/0");
        let session_id = crawler.execute().await.unwrap();
        assert_eq!(data.count(&session_id).await.unwrap(), 2);

        crawler.cleanup(&session_id).await.unwrap();

        assert_eq!(data.count(&session_id).await.unwrap(), 0);
        assert!(crawler.url_filter().matches("https://other.com/"));
    }
}
