use crate::config::AggregatorConfig;
use crate::db::Database;
use crate::fetcher::Fetcher;
use crate::lock::PassLock;
use crate::pipeline::{FetchOrchestrator, PassSettings, PassState};
use crate::registry::SourceRegistry;
use crate::sources::SourceAdapters;
use crate::store::ArticleStore;
use crate::summarizer::build_summarizer;
use crate::types::{
    AggregatorError, Article, FetchAdapter, FetchOutcome, PassError, PassReport, Result, Source,
    SourceType, Summarizer,
};
use crate::utils::url::is_http_url;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Entry point tying the source registry, article store and orchestrator
/// together over one database.
pub struct NewsAggregator<A: FetchAdapter = SourceAdapters> {
    db: Database,
    registry: Arc<SourceRegistry>,
    store: Arc<ArticleStore>,
    orchestrator: Arc<FetchOrchestrator<A>>,
}

impl NewsAggregator<SourceAdapters> {
    /// Build the production stack from configuration: HTTP fetcher, feed and
    /// page adapters, and the configured summarizer.
    pub async fn new(config: &AggregatorConfig) -> Result<Self> {
        let db = Database::connect(&config.database_url).await?;
        let fetcher = Arc::new(Fetcher::new(config.fetch.clone())?);
        let adapter = Arc::new(SourceAdapters::new(fetcher));
        let summarizer = build_summarizer(config)?;
        Ok(Self::with_components(db, adapter, summarizer, pass_settings(config)))
    }
}

impl<A: FetchAdapter> NewsAggregator<A> {
    pub fn with_components(
        db: Database,
        adapter: Arc<A>,
        summarizer: Arc<dyn Summarizer>,
        settings: PassSettings,
    ) -> Self {
        let registry = Arc::new(SourceRegistry::new(&db));
        let store = Arc::new(ArticleStore::new(&db));
        let lock = PassLock::new(&db, settings.lease_ttl);
        let orchestrator = Arc::new(FetchOrchestrator::new(
            registry.clone(),
            store.clone(),
            lock,
            adapter,
            summarizer,
            settings,
        ));
        Self {
            db,
            registry,
            store,
            orchestrator,
        }
    }

    pub async fn add_source(&self, name: String, url: String, source_type: SourceType) -> Result<Source> {
        let url = url.trim().to_string();
        if !is_http_url(&url) {
            return Err(AggregatorError::General(format!("Not an http(s) URL: {}", url)));
        }
        let source = self.registry.add(name, url, source_type).await?;
        info!("Added source '{}' ({})", source.name, source.id);
        Ok(source)
    }

    /// Removing an unknown id is a no-op. Articles from the source stay.
    pub async fn remove_source(&self, id: Uuid) -> Result<bool> {
        self.registry.remove(id).await
    }

    pub async fn set_source_enabled(&self, id: Uuid, enabled: bool) -> Result<Source> {
        self.registry
            .set_enabled(id, enabled)
            .await?
            .ok_or(AggregatorError::SourceNotFound { id })
    }

    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        self.registry.list().await
    }

    pub async fn run_pass(&self) -> std::result::Result<PassReport, PassError> {
        self.orchestrator.run_pass().await
    }

    /// Run a pass and flatten the result into the shape handed to callers.
    pub async fn fetch_all(&self) -> FetchOutcome {
        FetchOutcome::from(self.run_pass().await)
    }

    pub async fn feed(&self) -> Vec<Article> {
        self.store.feed().await
    }

    pub async fn feed_limited(&self, limit: usize) -> Vec<Article> {
        self.store.feed_limited(limit).await
    }

    pub fn orchestrator(&self) -> Arc<FetchOrchestrator<A>> {
        self.orchestrator.clone()
    }

    pub fn is_fetching(&self) -> bool {
        self.orchestrator.state() == PassState::Running
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

pub fn pass_settings(config: &AggregatorConfig) -> PassSettings {
    PassSettings {
        max_articles: config.max_articles,
        source_timeout: config.source_timeout(),
        fetch_concurrency: config.fetch_concurrency,
        summary_concurrency: config.summary_concurrency,
        summary_chars: config.summary_chars,
        lease_ttl: config.pass_lease(),
    }
}
