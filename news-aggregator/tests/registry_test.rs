mod common;

use common::*;
use news_aggregator::{AggregatorError, ArticleStore, SourceRegistry, SourceType};
use uuid::Uuid;

#[tokio::test]
async fn sources_are_listed_in_insertion_order() -> news_aggregator::Result<()> {
    let (_dir, db) = temp_database().await;
    let registry = SourceRegistry::new(&db);

    let feed = registry
        .add("Feed".into(), "https://a.example/rss".into(), SourceType::Feed)
        .await?;
    let page = registry
        .add("Page".into(), "https://b.example/news".into(), SourceType::HtmlPage)
        .await?;

    let listed = registry.list().await?;
    assert_eq!(listed, vec![feed.clone(), page.clone()]);
    assert!(listed.iter().all(|s| s.enabled));
    assert_eq!(registry.get(page.id).await?, Some(page));
    assert_eq!(registry.get(Uuid::new_v4()).await?, None);
    Ok(())
}

#[tokio::test]
async fn removing_a_source_keeps_its_articles() {
    let env = env(500).await;
    let source = env
        .aggregator
        .add_source("X".into(), "https://x/feed".into(), SourceType::Feed)
        .await
        .unwrap();
    env.adapter.script(&source.url, Script::Items(vec![raw("https://x/1")]));
    env.aggregator.run_pass().await.unwrap();

    assert!(env.aggregator.remove_source(source.id).await.unwrap());
    assert!(!env.aggregator.remove_source(source.id).await.unwrap());
    assert!(env.aggregator.list_sources().await.unwrap().is_empty());

    let stored = ArticleStore::new(env.aggregator.database()).load_all().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].source_id, source.id);

    // The next pass sees the removal immediately.
    let report = env.aggregator.run_pass().await.unwrap();
    assert!(report.sources.is_empty());
    assert_eq!(report.total_count, 1);
}

#[tokio::test]
async fn toggling_an_unknown_source_is_an_error() {
    let env = env(500).await;
    let id = Uuid::new_v4();
    let err = env.aggregator.set_source_enabled(id, false).await.unwrap_err();
    assert!(matches!(err, AggregatorError::SourceNotFound { id: missing } if missing == id));
}

#[tokio::test]
async fn enable_and_disable_round_trip() {
    let env = env(500).await;
    let source = env
        .aggregator
        .add_source("X".into(), "https://x/feed".into(), SourceType::Feed)
        .await
        .unwrap();

    let disabled = env.aggregator.set_source_enabled(source.id, false).await.unwrap();
    assert!(!disabled.enabled);
    let enabled = env.aggregator.set_source_enabled(source.id, true).await.unwrap();
    assert!(enabled.enabled);
}

#[tokio::test]
async fn non_http_urls_are_rejected() {
    let env = env(500).await;
    let result = env
        .aggregator
        .add_source("Local".into(), "file:///etc/passwd".into(), SourceType::Feed)
        .await;
    assert!(result.is_err());
    assert!(env.aggregator.list_sources().await.unwrap().is_empty());
}
