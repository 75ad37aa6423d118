#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use news_aggregator::{
    Article, Database, FetchAdapter, FetchErrorKind, NewsAggregator, PassSettings, RawItem, Source,
    SourceFetchError, Summarizer,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use uuid::Uuid;

/// What a scripted source does when fetched.
#[derive(Clone)]
pub enum Script {
    Items(Vec<RawItem>),
    Fail,
    Hang,
    /// Wait for the notify, then return the items.
    Gated(Arc<Notify>, Vec<RawItem>),
    Panic,
}

/// Adapter that answers from a per-URL script instead of the network.
#[derive(Default)]
pub struct ScriptedAdapter {
    scripts: Mutex<HashMap<String, Script>>,
    calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: &str, script: Script) {
        self.scripts.lock().unwrap().insert(url.to_string(), script);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchAdapter for ScriptedAdapter {
    async fn fetch(&self, source: &Source) -> Result<Vec<RawItem>, SourceFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().get(&source.url).cloned();
        match script {
            Some(Script::Items(items)) => Ok(items),
            Some(Script::Fail) | None => Err(SourceFetchError::new(source, FetchErrorKind::Status(503))),
            Some(Script::Hang) => std::future::pending().await,
            Some(Script::Gated(gate, items)) => {
                gate.notified().await;
                Ok(items)
            }
            Some(Script::Panic) => panic!("adapter blew up on {}", source.url),
        }
    }
}

/// Summarizer that echoes the first few characters, for deterministic output.
pub struct EchoSummarizer;

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, body: &str) -> String {
        body.chars().take(20).collect()
    }
}

/// Summarizer that always panics.
pub struct PanickingSummarizer;

#[async_trait]
impl Summarizer for PanickingSummarizer {
    async fn summarize(&self, _body: &str) -> String {
        panic!("summarizer exploded")
    }
}

pub struct TestEnv {
    pub dir: TempDir,
    pub adapter: Arc<ScriptedAdapter>,
    pub aggregator: Arc<NewsAggregator<ScriptedAdapter>>,
}

pub fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("news.db").display())
}

pub async fn temp_database() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::connect(&database_url(&dir)).await.unwrap();
    (dir, db)
}

pub fn settings(max_articles: usize) -> PassSettings {
    PassSettings {
        max_articles,
        source_timeout: Duration::from_secs(5),
        fetch_concurrency: 4,
        summary_concurrency: 4,
        summary_chars: 280,
        lease_ttl: Duration::from_secs(60),
    }
}

pub async fn env_with(settings: PassSettings, summarizer: Arc<dyn Summarizer>) -> TestEnv {
    let (dir, db) = temp_database().await;
    let adapter = Arc::new(ScriptedAdapter::new());
    let aggregator = Arc::new(NewsAggregator::with_components(db, adapter.clone(), summarizer, settings));
    TestEnv { dir, adapter, aggregator }
}

impl TestEnv {
    /// A second aggregator on the same database file, as another process would
    /// open it.
    pub async fn sibling(&self) -> (Arc<ScriptedAdapter>, Arc<NewsAggregator<ScriptedAdapter>>) {
        let db = Database::connect(&database_url(&self.dir)).await.unwrap();
        let adapter = Arc::new(ScriptedAdapter::new());
        let aggregator = Arc::new(NewsAggregator::with_components(
            db,
            adapter.clone(),
            Arc::new(EchoSummarizer),
            settings(500),
        ));
        (adapter, aggregator)
    }
}

pub async fn env(max_articles: usize) -> TestEnv {
    env_with(settings(max_articles), Arc::new(EchoSummarizer)).await
}

pub fn raw(link: &str) -> RawItem {
    RawItem {
        title: format!("Title for {}", link),
        link: link.to_string(),
        published_at: None,
        body: format!("<p>Body of {}</p>", link),
    }
}

pub fn raw_published(link: &str, published_at: DateTime<Utc>) -> RawItem {
    RawItem {
        published_at: Some(published_at),
        ..raw(link)
    }
}

pub fn article(link: &str, fetched_at_secs: i64) -> Article {
    Article {
        source_id: Uuid::new_v4(),
        source_name: "seed".to_string(),
        title: link.to_string(),
        link: link.to_string(),
        published_at: None,
        summary: String::new(),
        fetched_at: DateTime::from_timestamp(fetched_at_secs, 0).unwrap(),
    }
}

pub fn links(articles: &[Article]) -> Vec<String> {
    articles.iter().map(|a| a.link.clone()).collect()
}

/// Poll until a pass is running, giving up after about a second.
pub async fn wait_until_fetching(aggregator: &NewsAggregator<ScriptedAdapter>) {
    for _ in 0..200 {
        if aggregator.is_fetching() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("pass never started");
}

/// Poll until the adapter has been called `n` times, giving up after about a second.
pub async fn wait_for_calls(adapter: &ScriptedAdapter, n: usize) {
    for _ in 0..200 {
        if adapter.calls() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("adapter was not called {} times", n);
}
