use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;
use sn_core::{Candidate, ContentUpdateReport, Error, NewsStorage, Result, SourceProfile, SyncReport};
use tokio::sync::Mutex as TokioMutex;

use crate::logging::Logger;
use crate::reconciler::{needs_content, Reconciler};
use crate::scrapers::{ArticleEnricher, HttpFetcher, ListingExtractor, PageFetcher};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPhase {
    Idle,
    FetchingListing,
    Extracting,
    Enriching,
    Reconciling,
}

/// How the most recent run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum RunOutcome {
    Synced {
        report: SyncReport,
        finished_at: DateTime<Utc>,
    },
    ContentUpdated {
        report: ContentUpdateReport,
        finished_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        finished_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub running: bool,
    pub last_run: Option<RunOutcome>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            running: false,
            last_run: None,
        }
    }
}

/// Answer to a fire-and-forget trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Started,
    AlreadyRunning,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::Started => "processing",
            SyncTrigger::AlreadyRunning => "already-running",
        }
    }
}

/// The news pipeline: listing fetch, extraction, enrichment and
/// reconciliation, guarded by a single-flight run lock.
pub struct NewsSync {
    storage: Arc<dyn NewsStorage>,
    fetcher: Arc<dyn PageFetcher>,
    profile: SourceProfile,
    extractor: ListingExtractor,
    enricher: ArticleEnricher,
    reconciler: Reconciler,
    run_lock: Arc<TokioMutex<()>>,
    status: StdMutex<SyncStatus>,
    runs: AtomicU64,
    fixed_today: Option<NaiveDate>,
}

impl NewsSync {
    pub fn new(
        storage: Arc<dyn NewsStorage>,
        fetcher: Arc<dyn PageFetcher>,
        profile: SourceProfile,
    ) -> Self {
        Self {
            extractor: ListingExtractor::new(profile.clone()),
            enricher: ArticleEnricher::new(profile.clone()),
            reconciler: Reconciler::new(storage.clone(), profile.name.clone()),
            storage,
            fetcher,
            profile,
            run_lock: Arc::new(TokioMutex::new(())),
            status: StdMutex::new(SyncStatus::default()),
            runs: AtomicU64::new(0),
            fixed_today: None,
        }
    }

    pub fn with_http(storage: Arc<dyn NewsStorage>, profile: SourceProfile) -> Result<Self> {
        let fetcher = HttpFetcher::for_profile(&profile)?;
        Ok(Self::new(storage, Arc::new(fetcher), profile))
    }

    /// Pin the run date used by the staleness filter.
    pub fn with_fixed_date(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    pub fn storage(&self) -> Arc<dyn NewsStorage> {
        self.storage.clone()
    }

    pub fn status(&self) -> SyncStatus {
        let mut status = self.lock_status().clone();
        status.running = self.is_running();
        status
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Start a sync in the background unless one is already running.
    pub fn spawn_sync(self: &Arc<Self>) -> SyncTrigger {
        let guard = match self.run_lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::info!("⏳ Sync requested while another run is active");
                return SyncTrigger::AlreadyRunning;
            }
        };

        let sync = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            // Failures are recorded in the status and logged by the run.
            let _ = sync.run_sync().await;
        });
        SyncTrigger::Started
    }

    /// Run a full sync and wait for its report.
    pub async fn sync_now(&self) -> Result<SyncReport> {
        let _guard = self.run_lock.try_lock().map_err(|_| Error::SyncInProgress)?;
        self.run_sync().await
    }

    /// Re-enrich stored items that still carry thin content. Never inserts.
    pub async fn update_content(&self) -> Result<ContentUpdateReport> {
        let _guard = self.run_lock.try_lock().map_err(|_| Error::SyncInProgress)?;
        let logger = self.run_logger("update");

        let result = self.refresh_stored(&logger).await;
        match &result {
            Ok(report) => {
                logger.info(&format!(
                    "✅ Content update finished: {} checked, {} updated",
                    report.checked, report.updated
                ));
                self.end_run(RunOutcome::ContentUpdated {
                    report: *report,
                    finished_at: Utc::now(),
                });
            }
            Err(e) => self.fail_run(&logger, e),
        }
        result
    }

    async fn run_sync(&self) -> Result<SyncReport> {
        let logger = self.run_logger("sync");

        let result = self.sync_pipeline(&logger).await;
        match &result {
            Ok(report) => {
                logger.info(&format!(
                    "✅ Sync finished: {} saved, {} updated, {} skipped of {}",
                    report.saved, report.updated, report.skipped, report.total
                ));
                self.end_run(RunOutcome::Synced {
                    report: *report,
                    finished_at: Utc::now(),
                });
            }
            Err(e) => self.fail_run(&logger, e),
        }
        result
    }

    async fn sync_pipeline(&self, logger: &Logger) -> Result<SyncReport> {
        self.set_phase(SyncPhase::FetchingListing);
        let url = self.profile.listing_url()?;
        logger.info(&format!("📥 Fetching listing {}", url));
        let html = self
            .fetcher
            .fetch(url.as_str(), self.profile.listing_timeout())
            .await?;

        self.set_phase(SyncPhase::Extracting);
        let mut candidates = self.extractor.extract(&html, self.today())?;
        logger.info(&format!("🔎 Extracted {} candidates", candidates.len()));

        self.set_phase(SyncPhase::Enriching);
        let mut enriched = 0;
        for candidate in candidates.iter_mut() {
            if self.enrich_candidate(logger, candidate).await {
                enriched += 1;
            }
        }
        logger.info(&format!("📰 Enriched {} of {} candidates", enriched, candidates.len()));

        self.set_phase(SyncPhase::Reconciling);
        self.reconciler.reconcile(candidates).await
    }

    async fn refresh_stored(&self, logger: &Logger) -> Result<ContentUpdateReport> {
        self.set_phase(SyncPhase::Enriching);
        let mut report = ContentUpdateReport::default();

        for item in self.storage.list_news().await? {
            let Some(link) = item.external_link.clone() else { continue };
            if !needs_content(&item) || !self.profile.is_same_origin(&link) {
                continue;
            }
            report.checked += 1;

            let Some(body) = self.fetch_body(logger, &link, &item.title).await else { continue };
            if self.reconciler.upgrade(&item, &body, None).await? {
                logger.debug(&format!("📝 Updated content of {}", item.title));
                report.updated += 1;
            }
        }
        Ok(report)
    }

    /// Replace the candidate's snippet with the article body when one can be
    /// found. Any failure leaves the candidate as it was.
    async fn enrich_candidate(&self, logger: &Logger, candidate: &mut Candidate) -> bool {
        let Some(link) = candidate.link.clone() else { return false };
        if !self.profile.is_same_origin(&link) {
            logger.debug(&format!("Skipping off-site link {}", link));
            return false;
        }
        match self.fetch_body(logger, &link, &candidate.title).await {
            Some(body) if body.chars().count() > candidate.content.chars().count() => {
                candidate.content = body;
                true
            }
            _ => false,
        }
    }

    async fn fetch_body(&self, logger: &Logger, link: &str, title: &str) -> Option<String> {
        match self.fetcher.fetch(link, self.profile.article_timeout()).await {
            Ok(html) => {
                let body = self.enricher.enrich(&html, title);
                if body.is_none() {
                    logger.debug(&format!("No usable body at {}", link));
                }
                body
            }
            Err(e) => {
                logger.warn(&format!("⚠️ Could not fetch article {}: {}", link, e));
                None
            }
        }
    }

    fn today(&self) -> NaiveDate {
        self.fixed_today
            .unwrap_or_else(|| Local::now().date_naive())
    }

    fn run_logger(&self, kind: &str) -> Logger {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        Logger::new().with_prefix(format!("[{} #{}]", kind, run))
    }

    fn lock_status(&self) -> MutexGuard<'_, SyncStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.lock_status().phase = phase;
    }

    fn end_run(&self, outcome: RunOutcome) {
        let mut status = self.lock_status();
        status.phase = SyncPhase::Idle;
        status.last_run = Some(outcome);
    }

    fn fail_run(&self, logger: &Logger, error: &Error) {
        logger.error(&format!("❌ Run failed: {}", error));
        self.end_run(RunOutcome::Failed {
            error: error.to_string(),
            finished_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sn_core::{placeholder_content, NewNewsItem};
    use sn_storage::MemoryStorage;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    const LISTING_URL: &str = "https://vet.example.org/news";
    const RABIES: &str = "Обязательная вакцинация от бешенства";
    const CLINIC: &str = "Новая ветеринарная клиника открылась в центре";

    #[derive(Default)]
    struct MockFetcher {
        pages: StdMutex<HashMap<String, std::result::Result<String, String>>>,
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn page(self, url: &str, html: &str) -> Self {
            self.pages
                .lock()
                .unwrap()
                .insert(url.to_string(), Ok(html.to_string()));
            self
        }

        fn failing(self, url: &str, message: &str) -> Self {
            self.pages
                .lock()
                .unwrap()
                .insert(url.to_string(), Err(message.to_string()));
            self
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let page = self.pages.lock().unwrap().get(url).cloned();
            match page {
                Some(Ok(html)) => Ok(html),
                Some(Err(message)) => Err(Error::Scraping(message)),
                None => Err(Error::Scraping(format!("no page at {}", url))),
            }
        }
    }

    fn profile() -> SourceProfile {
        SourceProfile {
            name: "Госветслужба".to_string(),
            base_url: "https://vet.example.org".to_string(),
            ..SourceProfile::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn pipeline(storage: &Arc<MemoryStorage>, fetcher: MockFetcher) -> NewsSync {
        NewsSync::new(storage.clone(), Arc::new(fetcher), profile()).with_fixed_date(today())
    }

    fn article_body() -> (String, String) {
        let first = "Вакцинация домашних животных против бешенства проводится бесплатно. ".repeat(3);
        let second = "Владельцам необходимо предъявить ветеринарный паспорт животного. ".repeat(3);
        (first.trim().to_string(), second.trim().to_string())
    }

    fn article_page() -> String {
        let (first, second) = article_body();
        format!(
            r#"<html><body><nav>Меню</nav><article>
                <h1>{RABIES}</h1>
                <p>{first}</p>
                <p>{second}</p>
            </article></body></html>"#
        )
    }

    #[tokio::test]
    async fn test_keyword_importance_and_placeholder() {
        let listing = format!(r#"<div class="news"><span>25.02.2024 {RABIES}</span></div>"#);
        let storage = Arc::new(MemoryStorage::new());
        let sync = pipeline(&storage, MockFetcher::default().page(LISTING_URL, &listing));

        let report = sync.sync_now().await.unwrap();
        assert_eq!(report, SyncReport { saved: 1, updated: 0, skipped: 0, total: 1 });

        let items = storage.list_news().await.unwrap();
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.title, RABIES);
        assert_eq!(item.date.to_string(), "2024-02-25");
        assert!(item.important);
        assert_eq!(item.content, placeholder_content(RABIES));
        assert_eq!(item.source, "Госветслужба");
    }

    #[tokio::test]
    async fn test_placeholder_upgraded_by_article_body() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .insert_news(&NewNewsItem {
                title: RABIES.to_string(),
                content: placeholder_content(RABIES),
                source: "Госветслужба".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 2, 25).unwrap(),
                important: true,
                external_link: None,
            })
            .await
            .unwrap();

        let listing = format!(r#"<div><a href="/news/rabies">25.02.2024 {RABIES}</a></div>"#);
        let fetcher = MockFetcher::default()
            .page(LISTING_URL, &listing)
            .page("https://vet.example.org/news/rabies", &article_page());
        let sync = pipeline(&storage, fetcher);

        let report = sync.sync_now().await.unwrap();
        assert_eq!(report, SyncReport { saved: 0, updated: 1, skipped: 0, total: 1 });

        let (first, second) = article_body();
        let item = &storage.list_news().await.unwrap()[0];
        assert_eq!(item.content, format!("{first}\n\n{second}"));
        assert_eq!(item.external_link.as_deref(), Some("https://vet.example.org/news/rabies"));
    }

    #[tokio::test]
    async fn test_article_failure_keeps_listing_snippet() {
        let snippet = "Клиника принимает владельцев животных ежедневно, запись по телефону горячей линии.";
        let listing = format!(
            r#"<div class="item"><a href="/news/clinic">18.02.2024 {CLINIC}</a><p>{snippet}</p></div>"#
        );
        let fetcher = MockFetcher::default()
            .page(LISTING_URL, &listing)
            .failing("https://vet.example.org/news/clinic", "operation timed out");
        let storage = Arc::new(MemoryStorage::new());
        let sync = pipeline(&storage, fetcher);

        let report = sync.sync_now().await.unwrap();
        assert_eq!(report.saved, 1);

        let item = &storage.list_news().await.unwrap()[0];
        assert_eq!(item.content, snippet);
        assert!(!item.important);
        assert!(matches!(sync.status().last_run, Some(RunOutcome::Synced { .. })));
    }

    #[tokio::test]
    async fn test_off_site_links_are_not_fetched() {
        let listing = format!(
            r#"<div><a href="https://elsewhere.example.org/rabies">25.02.2024 {RABIES}</a></div>"#
        );
        let fetcher = Arc::new(
            MockFetcher::default()
                .page(LISTING_URL, &listing)
                .page("https://elsewhere.example.org/rabies", &article_page()),
        );
        let storage = Arc::new(MemoryStorage::new());
        let sync = NewsSync::new(storage.clone(), fetcher.clone(), profile()).with_fixed_date(today());

        sync.sync_now().await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        let item = &storage.list_news().await.unwrap()[0];
        assert_eq!(item.content, placeholder_content(RABIES));
        assert_eq!(item.external_link.as_deref(), Some("https://elsewhere.example.org/rabies"));
    }

    #[tokio::test]
    async fn test_second_run_changes_nothing() {
        let listing = format!(
            r#"<ul>
                <li><a href="/news/rabies">25.02.2024 {RABIES}</a></li>
                <li><span>18.02.2024 {CLINIC}</span></li>
            </ul>"#
        );
        let fetcher = MockFetcher::default()
            .page(LISTING_URL, &listing)
            .page("https://vet.example.org/news/rabies", &article_page());
        let storage = Arc::new(MemoryStorage::new());
        let sync = pipeline(&storage, fetcher);

        let first = sync.sync_now().await.unwrap();
        assert_eq!(first.saved, 2);
        let before = storage.list_news().await.unwrap();

        let second = sync.sync_now().await.unwrap();
        assert_eq!(second, SyncReport { saved: 0, updated: 0, skipped: 2, total: 2 });
        assert_eq!(storage.list_news().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_listing_failure_fails_run() {
        let storage = Arc::new(MemoryStorage::new());
        let sync = pipeline(&storage, MockFetcher::default().failing(LISTING_URL, "connection refused"));

        let result = sync.sync_now().await;
        assert!(matches!(result, Err(Error::Scraping(_))));
        assert!(storage.list_news().await.unwrap().is_empty());

        let status = sync.status();
        assert_eq!(status.phase, SyncPhase::Idle);
        assert!(!status.running);
        assert!(matches!(status.last_run, Some(RunOutcome::Failed { .. })));
    }

    /// Memory store whose inserts start failing after `healthy_inserts`.
    struct FlakyStorage {
        inner: MemoryStorage,
        healthy_inserts: usize,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl NewsStorage for FlakyStorage {
        async fn list_news(&self) -> Result<Vec<sn_core::NewsItem>> {
            self.inner.list_news().await
        }

        async fn get_news(&self, id: i64) -> Result<Option<sn_core::NewsItem>> {
            self.inner.get_news(id).await
        }

        async fn find_by_key(&self, title: &str, date: NaiveDate) -> Result<Option<sn_core::NewsItem>> {
            self.inner.find_by_key(title, date).await
        }

        async fn insert_news(&self, item: &NewNewsItem) -> Result<sn_core::NewsItem> {
            if self.inserts.fetch_add(1, Ordering::SeqCst) >= self.healthy_inserts {
                return Err(Error::Database("disk I/O error".to_string()));
            }
            self.inner.insert_news(item).await
        }

        async fn update_news(&self, id: i64, item: &NewNewsItem) -> Result<Option<sn_core::NewsItem>> {
            self.inner.update_news(id, item).await
        }

        async fn update_content(&self, id: i64, content: &str, external_link: Option<&str>) -> Result<()> {
            self.inner.update_content(id, content, external_link).await
        }

        async fn delete_news(&self, id: i64) -> Result<bool> {
            self.inner.delete_news(id).await
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_run_and_keeps_earlier_writes() {
        let listing = format!(
            r#"<ul>
                <li><span>25.02.2024 {RABIES}</span></li>
                <li><span>18.02.2024 {CLINIC}</span></li>
            </ul>"#
        );
        let storage = Arc::new(FlakyStorage {
            inner: MemoryStorage::new(),
            healthy_inserts: 1,
            inserts: AtomicUsize::new(0),
        });
        let fetcher = MockFetcher::default().page(LISTING_URL, &listing);
        let sync = NewsSync::new(storage.clone(), Arc::new(fetcher), profile()).with_fixed_date(today());

        let result = sync.sync_now().await;
        assert!(matches!(result, Err(Error::Database(_))));

        let items = storage.list_news().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, RABIES);

        let status = sync.status();
        assert_eq!(status.phase, SyncPhase::Idle);
        assert!(!status.running);
        match status.last_run {
            Some(RunOutcome::Failed { error, .. }) => assert!(error.contains("disk I/O error")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_lock_is_single_flight() {
        let gate = Arc::new(Notify::new());
        let listing = format!(r#"<div><span>25.02.2024 {RABIES}</span></div>"#);
        let fetcher = MockFetcher::default()
            .page(LISTING_URL, &listing)
            .gated(gate.clone());
        let storage = Arc::new(MemoryStorage::new());
        let sync = Arc::new(pipeline(&storage, fetcher));

        assert_eq!(sync.spawn_sync(), SyncTrigger::Started);
        assert!(sync.is_running());
        assert_eq!(sync.spawn_sync(), SyncTrigger::AlreadyRunning);
        assert!(matches!(sync.sync_now().await, Err(Error::SyncInProgress)));
        assert!(matches!(sync.update_content().await, Err(Error::SyncInProgress)));

        gate.notify_one();
        tokio::time::timeout(Duration::from_secs(5), async {
            while sync.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(storage.list_news().await.unwrap().len(), 1);
        assert!(matches!(sync.status().last_run, Some(RunOutcome::Synced { .. })));
    }

    #[tokio::test]
    async fn test_update_content_upgrades_stored_items() {
        let storage = Arc::new(MemoryStorage::new());
        let date = NaiveDate::from_ymd_opt(2024, 2, 25).unwrap();
        storage
            .insert_news(&NewNewsItem {
                title: RABIES.to_string(),
                content: placeholder_content(RABIES),
                source: "Госветслужба".to_string(),
                date,
                important: true,
                external_link: Some("https://vet.example.org/news/rabies".to_string()),
            })
            .await
            .unwrap();
        storage
            .insert_news(&NewNewsItem {
                title: CLINIC.to_string(),
                content: placeholder_content(CLINIC),
                source: "Госветслужба".to_string(),
                date,
                important: false,
                external_link: None,
            })
            .await
            .unwrap();

        let fetcher = MockFetcher::default().page("https://vet.example.org/news/rabies", &article_page());
        let sync = pipeline(&storage, fetcher);

        let report = sync.update_content().await.unwrap();
        assert_eq!(report, ContentUpdateReport { checked: 1, updated: 1 });

        let rabies = storage.find_by_key(RABIES, date).await.unwrap().unwrap();
        assert!(rabies.content.starts_with("Вакцинация домашних животных"));
        assert_eq!(storage.list_news().await.unwrap().len(), 2);

        // Nothing left to improve on a second pass.
        let report = sync.update_content().await.unwrap();
        assert_eq!(report, ContentUpdateReport { checked: 0, updated: 0 });
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let status = SyncStatus {
            phase: SyncPhase::FetchingListing,
            running: true,
            last_run: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["phase"], "fetching-listing");
        assert_eq!(json["running"], true);
        assert_eq!(SyncTrigger::AlreadyRunning.as_str(), "already-running");
    }
}
