//! The per-worker crawl loop
//!
//! Each [`CrawlerThread`] repeatedly polls the session's URL queue,
//! validates the entry, fetches it through the client registered for its
//! URL, hands the response to the matching rule's processor and enqueues the
//! discovered children one level deeper. A worker stops when the session is
//! done, the container goes away, the access budget runs out, or it keeps
//! finding the queue empty while no sibling is mid-fetch.

use super::log::{failure_event, log_event, LogEvent};
use crate::client::{ClientResponse, CrawlerClient, CrawlerClientFactory};
use crate::container::CrawlerContainer;
use crate::context::{CrawlScope, CrawlerContext, CrawlerStatus, WorkerId};
use crate::entity::{
    RequestData, ResponseData, ResponseStatus, UrlQueueEntry, NOT_MODIFIED_STATUS_CODE,
};
use crate::interval::IntervalReason;
use crate::service::UrlQueueService;
use crate::{Result, TrawlError};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Keeps `active_thread_count` raised for the lifetime of one crawl cycle
///
/// The count is lowered on drop, so a panicking processor cannot leave the
/// session looking busy forever.
struct ActiveGuard<'a> {
    context: &'a CrawlerContext,
}

impl<'a> ActiveGuard<'a> {
    fn start(context: &'a CrawlerContext) -> Self {
        context.increment_and_get_active_thread_count();
        Self { context }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.context.decrement_and_get_active_thread_count();
    }
}

/// One concurrency slot of a crawl session
pub struct CrawlerThread {
    id: WorkerId,
    context: Arc<CrawlerContext>,
    url_queue: Arc<dyn UrlQueueService>,
    client_factory: Arc<CrawlerClientFactory>,
    container: Arc<dyn CrawlerContainer>,
}

impl CrawlerThread {
    pub fn new(
        id: WorkerId,
        context: Arc<CrawlerContext>,
        url_queue: Arc<dyn UrlQueueService>,
        client_factory: Arc<CrawlerClientFactory>,
        container: Arc<dyn CrawlerContainer>,
    ) -> Self {
        Self {
            id,
            context,
            url_queue,
            client_factory,
            container,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Decides whether the worker should keep polling
    ///
    /// An empty-poll streak alone never stops the worker while a sibling is
    /// mid-fetch, since that sibling may still enqueue children.
    pub fn is_continue(&self, empty_polls: i32) -> bool {
        if !self.container.available() {
            return false;
        }

        if self.context.is_access_budget_exhausted() {
            return false;
        }

        !(empty_polls > self.context.max_thread_check_count()
            && self.context.active_thread_count() <= 0)
    }

    /// Returns true if `entry` may be fetched
    pub fn is_valid(&self, entry: &UrlQueueEntry) -> bool {
        if entry.url.trim().is_empty() {
            return false;
        }

        if self.context.is_over_depth(entry.depth) {
            return false;
        }

        self.context.matches_url(&entry.url)
    }

    async fn delay(&self, reason: IntervalReason) {
        if let Some(controller) = self.context.interval_controller() {
            controller.delay(reason).await;
        }
    }

    /// Runs the crawl loop until a stop condition holds
    pub async fn run(self) {
        let session_id = self.context.session_id();
        log_event(LogEvent::StartThread {
            worker: self.id,
            session_id: &session_id,
        });

        let mut empty_polls = 0;
        while self.context.status() != CrawlerStatus::Done && self.is_continue(empty_polls) {
            match self.url_queue.poll(&session_id).await {
                Ok(Some(entry)) => {
                    empty_polls = 0;
                    if self.is_valid(&entry) && !self.fetch(entry).await {
                        break;
                    }
                }
                Ok(None) => self.on_empty_poll(&mut empty_polls).await,
                Err(e) => {
                    log_event(LogEvent::QueueFailed {
                        worker: self.id,
                        error: &e.into(),
                    });
                    self.on_empty_poll(&mut empty_polls).await;
                }
            }

            self.delay(IntervalReason::WaitingNewUrl).await;
        }

        log_event(LogEvent::FinishedThread {
            worker: self.id,
            session_id: &session_id,
        });
    }

    async fn on_empty_poll(&self, empty_polls: &mut i32) {
        log_event(LogEvent::NoUrlInQueue {
            worker: self.id,
            empty_polls: *empty_polls,
        });
        self.delay(IntervalReason::NoUrlInQueue).await;
        // A zero delay must still let siblings run on a single-threaded runtime
        tokio::task::yield_now().await;
        *empty_polls += 1;
    }

    /// Crawls a validated entry with the client registered for its URL
    ///
    /// An access slot is reserved only once a client is known. Returns false
    /// when the budget is spent; the entry then goes back to the queue.
    async fn fetch(&self, entry: UrlQueueEntry) -> bool {
        let Some(client) = self.client_factory.get_client(&entry.url) else {
            log_event(LogEvent::UnsupportedUrl { url: &entry.url });
            return true;
        };

        if !self.context.try_acquire_access() {
            log_event(LogEvent::AccessBudgetExhausted {
                worker: self.id,
                url: &entry.url,
            });
            if let Err(e) = self.url_queue.requeue(entry).await {
                log_event(LogEvent::QueueFailed {
                    worker: self.id,
                    error: &e.into(),
                });
            }
            return false;
        }

        self.crawl(&entry, client.as_ref()).await;
        true
    }

    /// Runs one fetch/process cycle for a validated entry
    ///
    /// Failures and panics are logged here and never escape; the access slot
    /// reserved by the caller stays counted.
    async fn crawl(&self, entry: &UrlQueueEntry, client: &dyn CrawlerClient) {
        log_event(LogEvent::StartCrawling {
            worker: self.id,
            url: &entry.url,
            depth: entry.depth,
        });

        let scope = CrawlScope {
            context: &self.context,
            worker: self.id,
            entry,
        };

        {
            let _active = ActiveGuard::start(&self.context);

            let cycle = AssertUnwindSafe(self.crawl_entry(&scope, client))
                .catch_unwind()
                .await;
            match cycle {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log_event(failure_event(&entry.url, &e)),
                Err(payload) => log_event(LogEvent::CrawlingPanicked {
                    url: &entry.url,
                    message: &panic_message(payload.as_ref()),
                }),
            }
            self.add_sitemaps_from_robots_txt(entry).await;

            log_event(LogEvent::FinishedCrawling {
                worker: self.id,
                url: &entry.url,
            });
        }

        self.delay(IntervalReason::AfterProcessing).await;
    }

    async fn crawl_entry(&self, scope: &CrawlScope<'_>, client: &dyn CrawlerClient) -> Result<()> {
        let entry = scope.entry;
        self.delay(IntervalReason::BeforeProcessing).await;

        if !self.is_content_updated(scope, client).await? {
            return Ok(());
        }

        let request = RequestData {
            method: entry.method,
            url: entry.url.clone(),
        };
        let started = Instant::now();
        match client.execute(scope, &request).await? {
            ClientResponse::Fetched(mut response) => {
                response.execution_time_ms = started.elapsed().as_millis() as u64;
                response.parent_url = entry.parent_url.clone();
                response.session_id = self.context.session_id();

                match response.redirect_location.take() {
                    Some(location) => {
                        log_event(LogEvent::RedirectLocation {
                            url: &entry.url,
                            location: &location,
                        });
                        self.store_child_urls(entry, vec![location]).await?;
                    }
                    None => self.process_response(scope, response).await?,
                }
            }
            ClientResponse::Children(children) => {
                self.store_child_urls(entry, children).await?;
            }
        }

        Ok(())
    }

    /// Checks an entry with a known modification time using HEAD
    ///
    /// Returns false, after dispatching a not-modified response, when the
    /// server reports the resource unchanged. A GET is needed otherwise.
    async fn is_content_updated(
        &self,
        scope: &CrawlScope<'_>,
        client: &dyn CrawlerClient,
    ) -> Result<bool> {
        let entry = scope.entry;
        let Some(known) = entry.last_modified else {
            return Ok(true);
        };

        log_event(LogEvent::CheckLastModified { url: &entry.url });
        let started = Instant::now();
        let response = client
            .execute(scope, &RequestData::head(entry.url.clone()))
            .await?;

        if let ClientResponse::Fetched(mut response) = response {
            let unchanged = response.http_status_code == 200
                && response.last_modified.is_some_and(|lm| lm <= known);
            if unchanged {
                log_event(LogEvent::NotModified { url: &entry.url });
                response.execution_time_ms = started.elapsed().as_millis() as u64;
                response.parent_url = entry.parent_url.clone();
                response.session_id = self.context.session_id();
                response.status = ResponseStatus::NotModified;
                response.http_status_code = NOT_MODIFIED_STATUS_CODE;
                self.process_response(scope, response).await?;
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Routes a response to the processor of the first matching rule
    async fn process_response(
        &self,
        scope: &CrawlScope<'_>,
        mut response: ResponseData,
    ) -> Result<()> {
        let rule = self
            .context
            .rule_manager()
            .and_then(|manager| manager.get_rule(&response));
        let Some(rule) = rule else {
            log_event(LogEvent::NoRule { url: &response.url });
            return Ok(());
        };

        response.rule_id = Some(rule.rule_id().to_string());
        let Some(processor) = rule.processor() else {
            log_event(LogEvent::NoResponseProcessor {
                url: &response.url,
                rule_id: rule.rule_id(),
            });
            return Ok(());
        };

        let outcome = processor.process(scope, &response).await?;
        if !outcome.child_urls.is_empty() {
            self.store_child_urls(scope.entry, outcome.child_urls).await?;
        }
        Ok(())
    }

    /// Enqueues `urls` one level below `parent` in a single batch
    ///
    /// Blank, duplicate and filtered-out URLs are dropped, and nothing is
    /// enqueued when the child depth exceeds the session's maximum.
    async fn store_child_urls(&self, parent: &UrlQueueEntry, urls: Vec<String>) -> Result<usize> {
        let depth = parent.child_depth();
        if self.context.is_over_depth(depth) {
            return Ok(0);
        }

        let session_id = self.context.session_id();
        let mut seen = HashSet::new();
        let children: Vec<UrlQueueEntry> = urls
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .filter(|url| seen.insert(*url))
            .filter(|url| self.context.matches_url(url))
            .map(|url| UrlQueueEntry::child(&session_id, url, &parent.url, depth))
            .collect();

        if children.is_empty() {
            return Ok(0);
        }

        let offered = children.len();
        let queued = self
            .url_queue
            .offer_all(&session_id, children)
            .await
            .map_err(TrawlError::from)?;
        log_event(LogEvent::ChildUrls {
            url: &parent.url,
            offered,
            queued,
        });
        Ok(queued)
    }

    /// Enqueues sitemaps that robots.txt handling buffered for this worker
    async fn add_sitemaps_from_robots_txt(&self, entry: &UrlQueueEntry) {
        let Some(sitemaps) = self.context.remove_sitemaps(self.id) else {
            return;
        };
        if let Err(e) = self.store_child_urls(entry, sitemaps).await {
            log_event(failure_event(&entry.url, &e));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerSignal;
    use crate::entity::RequestMethod;
    use crate::filter::{RegexUrlFilter, UrlFilter};
    use crate::interval::{DefaultIntervalController, IntervalConfig};
    use crate::processor::{ProcessOutcome, ResponseProcessor};
    use crate::rule::{DefaultRuleManager, RegexRule};
    use crate::service::MemoryUrlQueueService;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned responses and records every request
    #[derive(Default)]
    struct StaticClient {
        pages: HashMap<String, ClientResponse>,
        sitemaps: HashMap<String, Vec<String>>,
        requests: Mutex<Vec<RequestData>>,
    }

    impl StaticClient {
        fn page(mut self, url: &str) -> Self {
            let mut response = ResponseData::new(url, 200);
            response.mime_type = Some("text/html".to_string());
            self.pages
                .insert(url.to_string(), ClientResponse::Fetched(response));
            self
        }

        fn response(mut self, url: &str, response: ClientResponse) -> Self {
            self.pages.insert(url.to_string(), response);
            self
        }

        fn requests(&self) -> Vec<RequestData> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CrawlerClient for StaticClient {
        async fn execute(
            &self,
            scope: &CrawlScope<'_>,
            request: &RequestData,
        ) -> Result<ClientResponse> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(sitemaps) = self.sitemaps.get(&request.url) {
                scope.context.add_sitemaps(scope.worker, sitemaps.clone());
            }
            Ok(self
                .pages
                .get(&request.url)
                .cloned()
                .unwrap_or_else(|| {
                    ClientResponse::Fetched(ResponseData::new(request.url.clone(), 404))
                }))
        }
    }

    /// Records dispatched responses and returns canned children
    #[derive(Default)]
    struct RecordingProcessor {
        children: HashMap<String, Vec<String>>,
        panics_on: HashSet<String>,
        seen: Mutex<Vec<ResponseData>>,
    }

    impl RecordingProcessor {
        fn seen(&self) -> Vec<ResponseData> {
            self.seen.lock().unwrap().clone()
        }

        fn seen_urls(&self) -> Vec<String> {
            self.seen().into_iter().map(|r| r.url).collect()
        }
    }

    #[async_trait]
    impl ResponseProcessor for RecordingProcessor {
        async fn process(
            &self,
            _scope: &CrawlScope<'_>,
            response: &ResponseData,
        ) -> Result<ProcessOutcome> {
            if self.panics_on.contains(&response.url) {
                panic!("processor failed on {}", response.url);
            }
            self.seen.lock().unwrap().push(response.clone());
            Ok(ProcessOutcome::with_children(
                self.children.get(&response.url).cloned().unwrap_or_default(),
            ))
        }
    }

    struct Harness {
        context: Arc<CrawlerContext>,
        queue: Arc<MemoryUrlQueueService>,
        client: Arc<StaticClient>,
        processor: Arc<RecordingProcessor>,
        container: Arc<ContainerSignal>,
    }

    impl Harness {
        fn new(client: StaticClient, processor: RecordingProcessor) -> Self {
            let context = Arc::new(CrawlerContext::new());
            context.set_session_id("s1");
            context.set_max_thread_check_count(0);
            context.set_interval_controller(Some(Arc::new(
                DefaultIntervalController::from_config(&IntervalConfig::no_wait()),
            )));
            context.set_url_filter(Some(Arc::new(RegexUrlFilter::new())));

            let processor = Arc::new(processor);
            let manager = DefaultRuleManager::new();
            manager.add_rule(Arc::new(
                RegexRule::new("all")
                    .default_rule(true)
                    .with_processor(processor.clone()),
            ));
            context.set_rule_manager(Some(Arc::new(manager)));
            context.set_status(CrawlerStatus::Running);

            Self {
                context,
                queue: Arc::new(MemoryUrlQueueService::new()),
                client: Arc::new(client),
                processor,
                container: Arc::new(ContainerSignal::new()),
            }
        }

        fn worker(&self) -> CrawlerThread {
            let factory = CrawlerClientFactory::new();
            factory.add_client("https?://", self.client.clone()).unwrap();
            CrawlerThread::new(
                WorkerId(0),
                self.context.clone(),
                self.queue.clone(),
                Arc::new(factory),
                self.container.clone(),
            )
        }

        async fn seed(&self, url: &str) {
            self.queue.add("s1", url).await.unwrap();
        }

        async fn pending(&self) -> usize {
            self.queue.len("s1").await.unwrap()
        }
    }

    fn children(pairs: &[(&str, &[&str])]) -> RecordingProcessor {
        RecordingProcessor {
            children: pairs
                .iter()
                .map(|(url, kids)| {
                    (
                        url.to_string(),
                        kids.iter().map(|k| k.to_string()).collect(),
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_streak_alone_does_not_stop_while_siblings_are_active() {
        let harness = Harness::new(StaticClient::default(), RecordingProcessor::default());
        harness.context.set_max_thread_check_count(2);
        let worker = harness.worker();

        assert!(worker.is_continue(2));
        assert!(!worker.is_continue(3));

        harness.context.increment_and_get_active_thread_count();
        assert!(worker.is_continue(100));

        harness.context.decrement_and_get_active_thread_count();
        assert!(!worker.is_continue(3));
    }

    #[test]
    fn test_is_continue_stops_on_budget_and_shutdown() {
        let harness = Harness::new(StaticClient::default(), RecordingProcessor::default());
        let worker = harness.worker();
        harness.context.set_max_access_count(2);

        assert!(worker.is_continue(0));
        harness.context.increment_and_get_access_count();
        harness.context.increment_and_get_access_count();
        assert!(!worker.is_continue(0));

        harness.context.set_max_access_count(0);
        assert!(worker.is_continue(0));
        harness.container.shutdown();
        assert!(!worker.is_continue(0));
    }

    #[test]
    fn test_is_valid() {
        let harness = Harness::new(StaticClient::default(), RecordingProcessor::default());
        let worker = harness.worker();
        harness.context.set_max_depth(1);
        if let Some(filter) = harness.context.url_filter() {
            filter.add_exclude("https://example\\.com/private/.*");
        }

        assert!(worker.is_valid(&UrlQueueEntry::seed("s1", "https://example.com/")));
        assert!(!worker.is_valid(&UrlQueueEntry::seed("s1", "  ")));
        assert!(!worker.is_valid(&UrlQueueEntry::child(
            "s1",
            "https://example.com/deep",
            "https://example.com/",
            2
        )));
        assert!(!worker.is_valid(&UrlQueueEntry::seed(
            "s1",
            "https://example.com/private/x"
        )));
    }

    #[tokio::test]
    async fn test_crawls_children_one_level_deeper() {
        let client = StaticClient::default()
            .page("https://example.com/")
            .page("https://example.com/a")
            .page("https://example.com/b");
        let processor = children(&[(
            "https://example.com/",
            &["https://example.com/a", "https://example.com/b", "https://example.com/a", " "],
        )]);
        let harness = Harness::new(client, processor);
        harness.seed("https://example.com/").await;

        harness.worker().run().await;

        let seen = harness.processor.seen();
        assert_eq!(
            seen.iter().map(|r| r.url.as_str()).collect::<Vec<_>>(),
            vec!["https://example.com/", "https://example.com/a", "https://example.com/b"]
        );
        assert!(seen.iter().all(|r| r.rule_id.as_deref() == Some("all")));
        assert_eq!(seen[1].parent_url.as_deref(), Some("https://example.com/"));
        assert_eq!(seen[0].session_id, "s1");
        assert_eq!(harness.context.access_count(), 3);
        assert_eq!(harness.context.active_thread_count(), 0);
    }

    #[tokio::test]
    async fn test_children_beyond_max_depth_are_not_enqueued() {
        let client = StaticClient::default()
            .page("https://example.com/")
            .page("https://example.com/a");
        let processor = children(&[
            ("https://example.com/", &["https://example.com/a"]),
            ("https://example.com/a", &["https://example.com/b"]),
        ]);
        let harness = Harness::new(client, processor);
        harness.context.set_max_depth(1);
        harness.seed("https://example.com/").await;

        harness.worker().run().await;

        assert_eq!(
            harness.processor.seen_urls(),
            vec!["https://example.com/", "https://example.com/a"]
        );
        assert_eq!(harness.pending().await, 0);
    }

    #[tokio::test]
    async fn test_filtered_children_are_dropped() {
        let client = StaticClient::default().page("https://example.com/");
        let processor = children(&[(
            "https://example.com/",
            &["https://other.com/", "https://example.com/skip.pdf"],
        )]);
        let harness = Harness::new(client, processor);
        if let Some(filter) = harness.context.url_filter() {
            filter.add_include("https://example\\.com/.*");
            filter.add_exclude(".*\\.pdf");
        }
        harness.seed("https://example.com/").await;

        harness.worker().run().await;

        assert_eq!(harness.processor.seen_urls(), vec!["https://example.com/"]);
        assert_eq!(harness.client.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_redirect_location_is_enqueued_instead_of_dispatched() {
        let mut moved = ResponseData::new("https://example.com/old", 301);
        moved.redirect_location = Some("https://example.com/new".to_string());
        let client = StaticClient::default()
            .response("https://example.com/old", ClientResponse::Fetched(moved))
            .page("https://example.com/new");
        let harness = Harness::new(client, RecordingProcessor::default());
        harness.seed("https://example.com/old").await;

        harness.worker().run().await;

        assert_eq!(harness.processor.seen_urls(), vec!["https://example.com/new"]);
        assert_eq!(harness.context.access_count(), 2);
    }

    #[tokio::test]
    async fn test_directory_children_are_enqueued() {
        let client = StaticClient::default()
            .response(
                "https://example.com/dir/",
                ClientResponse::Children(vec![
                    "https://example.com/dir/a.txt".to_string(),
                    "https://example.com/dir/b.txt".to_string(),
                ]),
            )
            .page("https://example.com/dir/a.txt")
            .page("https://example.com/dir/b.txt");
        let harness = Harness::new(client, RecordingProcessor::default());
        harness.seed("https://example.com/dir/").await;

        harness.worker().run().await;

        assert_eq!(
            harness.processor.seen_urls(),
            vec!["https://example.com/dir/a.txt", "https://example.com/dir/b.txt"]
        );
    }

    #[tokio::test]
    async fn test_unchanged_content_is_dispatched_as_not_modified() {
        let known = Utc::now();
        let mut head = ResponseData::new("https://example.com/", 200);
        head.last_modified = Some(known - Duration::days(1));
        let client =
            StaticClient::default().response("https://example.com/", ClientResponse::Fetched(head));
        let harness = Harness::new(client, RecordingProcessor::default());
        harness
            .queue
            .offer_all(
                "s1",
                vec![UrlQueueEntry::seed("s1", "https://example.com/").with_last_modified(known)],
            )
            .await
            .unwrap();

        harness.worker().run().await;

        let requests = harness.client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, RequestMethod::Head);

        let seen = harness.processor.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].status, ResponseStatus::NotModified);
        assert_eq!(seen[0].http_status_code, NOT_MODIFIED_STATUS_CODE);
    }

    #[tokio::test]
    async fn test_changed_content_is_fetched() {
        let known = Utc::now() - Duration::days(2);
        let mut page = ResponseData::new("https://example.com/", 200);
        page.last_modified = Some(Utc::now());
        let client =
            StaticClient::default().response("https://example.com/", ClientResponse::Fetched(page));
        let harness = Harness::new(client, RecordingProcessor::default());
        harness
            .queue
            .offer_all(
                "s1",
                vec![UrlQueueEntry::seed("s1", "https://example.com/").with_last_modified(known)],
            )
            .await
            .unwrap();

        harness.worker().run().await;

        let methods: Vec<_> = harness
            .client
            .requests()
            .into_iter()
            .map(|r| r.method)
            .collect();
        assert_eq!(methods, vec![RequestMethod::Head, RequestMethod::Get]);
        assert_eq!(harness.processor.seen()[0].status, ResponseStatus::Ok);
    }

    #[tokio::test]
    async fn test_exhausted_budget_requeues_entry_and_stops() {
        let client = StaticClient::default()
            .page("https://example.com/a")
            .page("https://example.com/b");
        let harness = Harness::new(client, RecordingProcessor::default());
        harness.context.set_max_access_count(1);
        harness.context.set_max_thread_check_count(10);
        harness.seed("https://example.com/a").await;
        harness.seed("https://example.com/b").await;

        harness.worker().run().await;

        assert_eq!(harness.processor.seen_urls(), vec!["https://example.com/a"]);
        assert_eq!(harness.context.access_count(), 1);
        assert_eq!(harness.pending().await, 1);
    }

    #[tokio::test]
    async fn test_done_status_exits_without_polling() {
        let client = StaticClient::default().page("https://example.com/");
        let harness = Harness::new(client, RecordingProcessor::default());
        harness.seed("https://example.com/").await;
        harness.context.set_status(CrawlerStatus::Done);

        harness.worker().run().await;

        assert!(harness.client.requests().is_empty());
        assert_eq!(harness.pending().await, 1);
    }

    #[tokio::test]
    async fn test_no_rule_still_counts_access() {
        let client = StaticClient::default().page("https://example.com/");
        let harness = Harness::new(client, RecordingProcessor::default());
        harness.context.set_rule_manager(None);
        harness.seed("https://example.com/").await;

        harness.worker().run().await;

        assert_eq!(harness.client.requests().len(), 1);
        assert!(harness.processor.seen().is_empty());
        assert_eq!(harness.context.access_count(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_url_does_not_stop_worker() {
        let client = StaticClient::default().page("https://example.com/");
        let harness = Harness::new(client, RecordingProcessor::default());
        harness.seed("ftp://example.com/file").await;
        harness.seed("https://example.com/").await;

        harness.worker().run().await;

        assert_eq!(harness.processor.seen_urls(), vec!["https://example.com/"]);
        assert_eq!(harness.context.active_thread_count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_url_does_not_use_access_budget() {
        let client = StaticClient::default().page("https://example.com/");
        let harness = Harness::new(client, RecordingProcessor::default());
        harness.context.set_max_access_count(1);
        harness.seed("ftp://example.com/file").await;
        harness.seed("https://example.com/").await;

        harness.worker().run().await;

        assert_eq!(harness.processor.seen_urls(), vec!["https://example.com/"]);
        assert_eq!(harness.context.access_count(), 1);
        assert_eq!(harness.pending().await, 0);
    }

    #[tokio::test]
    async fn test_panicking_processor_does_not_kill_worker() {
        let client = StaticClient::default()
            .page("https://example.com/bad")
            .page("https://example.com/good");
        let processor = RecordingProcessor {
            panics_on: HashSet::from(["https://example.com/bad".to_string()]),
            ..Default::default()
        };
        let harness = Harness::new(client, processor);
        harness.seed("https://example.com/bad").await;
        harness.seed("https://example.com/good").await;

        let worker = harness.worker();
        let handle = tokio::spawn(worker.run());

        assert!(handle.await.is_ok());
        assert_eq!(harness.client.requests().len(), 2);
        assert_eq!(harness.processor.seen_urls(), vec!["https://example.com/good"]);
        assert_eq!(harness.context.access_count(), 2);
        assert_eq!(harness.context.active_thread_count(), 0);
        assert_eq!(harness.pending().await, 0);
    }

    #[tokio::test]
    async fn test_buffered_sitemaps_are_enqueued_after_cycle() {
        let mut client = StaticClient::default()
            .page("https://example.com/")
            .page("https://example.com/sitemap.xml");
        client.sitemaps.insert(
            "https://example.com/".to_string(),
            vec!["https://example.com/sitemap.xml".to_string()],
        );
        let harness = Harness::new(client, RecordingProcessor::default());
        harness.seed("https://example.com/").await;

        harness.worker().run().await;

        let seen = harness.processor.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].url, "https://example.com/sitemap.xml");
        assert_eq!(seen[1].parent_url.as_deref(), Some("https://example.com/"));
        assert!(harness.context.remove_sitemaps(WorkerId(0)).is_none());
    }
}
