use crate::lock::PassLock;
use crate::registry::SourceRegistry;
use crate::store::{enforce_capacity, merge, ArticleStore};
use crate::types::{
    Article, BaselineSummarizer, FetchAdapter, FetchErrorKind, PassError, PassReport, RawItem, Source,
    SourceFetchError, SourceReport, Summarizer,
};
use crate::utils::text::plain_text;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy)]
pub struct PassSettings {
    pub max_articles: usize,
    pub source_timeout: Duration,
    pub fetch_concurrency: usize,
    pub summary_concurrency: usize,
    /// Length of the truncated summary used when the summarizer panics.
    pub summary_chars: usize,
    /// How long a pass lease stays valid before another process may take it.
    pub lease_ttl: Duration,
}

impl Default for PassSettings {
    fn default() -> Self {
        Self {
            max_articles: 500,
            source_timeout: Duration::from_secs(60),
            fetch_concurrency: 4,
            summary_concurrency: 4,
            summary_chars: interfaces::baseline::DEFAULT_SUMMARY_CHARS,
            lease_ttl: Duration::from_secs(900),
        }
    }
}

/// Holds the running flag for the lifetime of a pass and clears it on drop,
/// whichever way the pass ends.
struct PassGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives ingestion passes: fetch every enabled source, summarize unseen items,
/// merge them into the store and persist.
///
/// At most one pass runs at a time: the in-process flag rejects overlapping
/// calls, and the [`PassLock`] lease rejects passes from other processes
/// sharing the database.
pub struct FetchOrchestrator<A: FetchAdapter> {
    registry: Arc<SourceRegistry>,
    store: Arc<ArticleStore>,
    lock: PassLock,
    adapter: Arc<A>,
    summarizer: Arc<dyn Summarizer>,
    fallback: BaselineSummarizer,
    settings: PassSettings,
    running: AtomicBool,
}

impl<A: FetchAdapter> FetchOrchestrator<A> {
    pub fn new(
        registry: Arc<SourceRegistry>,
        store: Arc<ArticleStore>,
        lock: PassLock,
        adapter: Arc<A>,
        summarizer: Arc<dyn Summarizer>,
        settings: PassSettings,
    ) -> Self {
        Self {
            registry,
            store,
            lock,
            adapter,
            summarizer,
            fallback: BaselineSummarizer::new(settings.summary_chars),
            settings,
            running: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> PassState {
        if self.running.load(Ordering::Acquire) {
            PassState::Running
        } else {
            PassState::Idle
        }
    }

    pub fn settings(&self) -> &PassSettings {
        &self.settings
    }

    /// Run one ingestion pass.
    ///
    /// Returns [`PassError::AlreadyRunning`] immediately if another pass holds
    /// the guard or the database lease. Individual source failures, including
    /// panicking adapters, are recorded in the report and never fail the pass.
    pub async fn run_pass(&self) -> Result<PassReport, PassError> {
        let _guard = PassGuard::acquire(&self.running).ok_or_else(|| {
            debug!("Fetch requested while a pass is running, rejecting");
            PassError::AlreadyRunning
        })?;

        if !self.lock.try_acquire().await.map_err(PassError::Setup)? {
            info!("Another process is running a fetch pass, rejecting");
            return Err(PassError::AlreadyRunning);
        }

        let result = self.run_locked().await;
        if let Err(e) = self.lock.release().await {
            warn!("Failed to release pass lease: {}", e);
        }
        result
    }

    async fn run_locked(&self) -> Result<PassReport, PassError> {
        let started = Instant::now();
        let sources = self.registry.list().await.map_err(PassError::Setup)?;
        let existing = self.store.try_load_all().await.map_err(PassError::Setup)?;
        let started_at = next_fetch_timestamp(&existing, Utc::now());

        let enabled: Vec<Source> = sources.into_iter().filter(|s| s.enabled).collect();
        info!(
            "Starting fetch pass over {} enabled sources ({} articles stored)",
            enabled.len(),
            existing.len()
        );

        let fetched: Vec<(Source, Result<Vec<RawItem>, SourceFetchError>)> = stream::iter(enabled)
            .map(|source| async move {
                let result = self.fetch_source(&source).await;
                (source, result)
            })
            .buffered(self.settings.fetch_concurrency.max(1))
            .collect()
            .await;

        // Admission runs serially in source order, so one link is admitted at
        // most once per pass and the outcome does not depend on fetch timing.
        let mut seen: HashSet<String> = existing.iter().map(|a| a.link.clone()).collect();
        let mut reports = Vec::with_capacity(fetched.len());
        let mut admitted: Vec<(Arc<Source>, RawItem)> = Vec::new();

        for (source, result) in fetched {
            let source = Arc::new(source);
            match result {
                Ok(items) => {
                    let items_found = items.len();
                    let mut new_items = 0;
                    for mut item in items {
                        item.link = item.link.trim().to_string();
                        if item.link.is_empty() {
                            continue;
                        }
                        if seen.insert(item.link.clone()) {
                            admitted.push((source.clone(), item));
                            new_items += 1;
                        }
                    }
                    debug!("Source '{}': {} items, {} new", source.name, items_found, new_items);
                    reports.push(SourceReport {
                        source_id: source.id,
                        source_name: source.name.clone(),
                        items_found,
                        new_items,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!("{}", e);
                    reports.push(SourceReport {
                        source_id: source.id,
                        source_name: source.name.clone(),
                        items_found: 0,
                        new_items: 0,
                        error: Some(e.kind.to_string()),
                    });
                }
            }
        }

        let incoming: Vec<Article> = stream::iter(admitted)
            .map(|(source, item)| async move {
                let text = plain_text(&item.body);
                let summary = match AssertUnwindSafe(self.summarizer.summarize(&text)).catch_unwind().await {
                    Ok(summary) => summary,
                    Err(payload) => {
                        warn!(
                            "Summarizer panicked on {} ({}), using truncated body",
                            item.link,
                            panic_message(&*payload)
                        );
                        self.fallback.summarize_text(&text)
                    }
                };
                Article::from_raw(&source, item, summary, started_at)
            })
            .buffered(self.settings.summary_concurrency.max(1))
            .collect()
            .await;

        let (merged, new_count) = merge(existing, incoming);
        let merged_len = merged.len();
        let kept = enforce_capacity(merged, self.settings.max_articles);
        let evicted_count = merged_len - kept.len();

        self.store.persist(&kept).await.map_err(PassError::Persistence)?;

        let report = PassReport {
            started_at,
            new_count,
            total_count: kept.len(),
            evicted_count,
            duration_ms: started.elapsed().as_millis() as u64,
            sources: reports,
        };
        info!(
            "Fetch pass finished: {} new, {} total, {} evicted, {}/{} sources failed in {}ms",
            report.new_count,
            report.total_count,
            report.evicted_count,
            report.failed_sources(),
            report.sources.len(),
            report.duration_ms
        );
        Ok(report)
    }

    async fn fetch_source(&self, source: &Source) -> Result<Vec<RawItem>, SourceFetchError> {
        let fetch = tokio::time::timeout(self.settings.source_timeout, self.adapter.fetch(source));
        match AssertUnwindSafe(fetch).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SourceFetchError::new(
                source,
                FetchErrorKind::Timeout(self.settings.source_timeout),
            )),
            Err(payload) => Err(SourceFetchError::new(
                source,
                FetchErrorKind::Panicked(panic_message(&*payload)),
            )),
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

/// Timestamp for the articles of a pass: now, truncated to the stored
/// precision, and strictly after everything already stored.
pub fn next_fetch_timestamp(existing: &[Article], now: DateTime<Utc>) -> DateTime<Utc> {
    let now = DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now);
    match existing.iter().map(|a| a.fetched_at).max() {
        Some(newest) if newest >= now => newest + ChronoDuration::microseconds(1),
        _ => now,
    }
}
