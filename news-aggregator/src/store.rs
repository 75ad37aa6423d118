use crate::db::Database;
use crate::types::{Article, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Merge a batch into the existing articles.
///
/// Incoming articles whose link is already present (in `existing` or earlier in
/// `incoming`) are dropped; the rest are appended in order. Returns the merged
/// list and how many incoming articles were actually added.
pub fn merge(existing: Vec<Article>, incoming: Vec<Article>) -> (Vec<Article>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(existing.len() + incoming.len());
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());

    for article in existing {
        if seen.insert(article.link.clone()) {
            merged.push(article);
        }
    }

    let mut new_count = 0;
    for article in incoming {
        if seen.insert(article.link.clone()) {
            merged.push(article);
            new_count += 1;
        } else {
            debug!("Dropping duplicate article: {}", article.link);
        }
    }

    (merged, new_count)
}

/// Keep at most `max` articles, evicting the oldest by `fetched_at`.
///
/// Among equal timestamps the article that comes first in the input wins.
/// Kept articles retain their relative order.
pub fn enforce_capacity(articles: Vec<Article>, max: usize) -> Vec<Article> {
    if articles.len() <= max {
        return articles;
    }

    let mut ranked: Vec<usize> = (0..articles.len()).collect();
    // Stable sort: ties stay in input order.
    ranked.sort_by(|&a, &b| articles[b].fetched_at.cmp(&articles[a].fetched_at));

    let mut keep = vec![false; articles.len()];
    for &idx in ranked.iter().take(max) {
        keep[idx] = true;
    }

    articles
        .into_iter()
        .zip(keep)
        .filter_map(|(article, kept)| kept.then_some(article))
        .collect()
}

/// Presentation order: newest published first, undated articles last.
pub fn sort_for_feed(articles: &mut [Article]) {
    articles.sort_by(|a, b| match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| b.fetched_at.cmp(&a.fetched_at)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.fetched_at.cmp(&a.fetched_at),
    });
}

/// Lenient timestamp parsing for stored and upstream dates.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Article store persisted in the `articles` table.
///
/// Storage order is ingestion order (`position`); reads for display go through
/// [`ArticleStore::feed`].
pub struct ArticleStore {
    db: SqlitePool,
}

impl ArticleStore {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.pool().clone(),
        }
    }

    /// Load every stored article in storage order.
    ///
    /// Rows that cannot be decoded are skipped; only a failing query is an error.
    pub async fn try_load_all(&self) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT source_id, source_name, title, link, published_at, summary, fetched_at
            FROM articles
            ORDER BY position
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let total = rows.len();
        let articles: Vec<Article> = rows.iter().filter_map(article_from_row).collect();
        if articles.len() < total {
            warn!("Skipped {} unreadable article rows", total - articles.len());
        }
        Ok(articles)
    }

    /// Like [`try_load_all`](Self::try_load_all), but an unreadable store is
    /// treated as empty.
    pub async fn load_all(&self) -> Vec<Article> {
        match self.try_load_all().await {
            Ok(articles) => articles,
            Err(e) => {
                warn!("Failed to load article store, treating it as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Replace the stored articles with `articles` in one transaction.
    ///
    /// On error the transaction is rolled back and the previous contents stay.
    pub async fn persist(&self, articles: &[Article]) -> Result<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM articles").execute(&mut *tx).await?;

        for (position, article) in articles.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO articles (position, source_id, source_name, title, link, published_at, summary, fetched_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(position as i64)
            .bind(article.source_id.to_string())
            .bind(&article.source_name)
            .bind(&article.title)
            .bind(&article.link)
            .bind(article.published_at.map(|dt| dt.to_rfc3339()))
            .bind(&article.summary)
            .bind(article.fetched_at.timestamp_micros())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!("Persisted {} articles", articles.len());
        Ok(())
    }

    /// Stored articles, newest published first. Never fails.
    pub async fn feed(&self) -> Vec<Article> {
        let mut articles = self.load_all().await;
        sort_for_feed(&mut articles);
        articles
    }

    pub async fn feed_limited(&self, limit: usize) -> Vec<Article> {
        let mut articles = self.feed().await;
        articles.truncate(limit);
        articles
    }

    pub async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.db)
            .await?;
        Ok(count.max(0) as usize)
    }
}

fn article_from_row(row: &SqliteRow) -> Option<Article> {
    match decode_article(row) {
        Ok(article) => Some(article),
        Err(e) => {
            warn!("Skipping unreadable article row: {}", e);
            None
        }
    }
}

fn decode_article(row: &SqliteRow) -> std::result::Result<Article, String> {
    let source_id: String = row.try_get("source_id").map_err(|e| e.to_string())?;
    let fetched_micros: i64 = row.try_get("fetched_at").map_err(|e| e.to_string())?;
    let published: Option<String> = row.try_get("published_at").map_err(|e| e.to_string())?;

    Ok(Article {
        source_id: Uuid::parse_str(&source_id).map_err(|e| format!("bad source id '{}': {}", source_id, e))?,
        source_name: row.try_get("source_name").map_err(|e| e.to_string())?,
        title: row.try_get("title").map_err(|e| e.to_string())?,
        link: row.try_get("link").map_err(|e| e.to_string())?,
        // An unparseable date is kept as "unknown" rather than dropping the article.
        published_at: published.as_deref().and_then(parse_timestamp),
        summary: row.try_get("summary").map_err(|e| e.to_string())?,
        fetched_at: DateTime::from_timestamp_micros(fetched_micros)
            .ok_or_else(|| format!("bad fetched_at {}", fetched_micros))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(link: &str, fetched_secs: i64) -> Article {
        Article {
            source_id: Uuid::nil(),
            source_name: "test".into(),
            title: link.into(),
            link: link.into(),
            published_at: None,
            summary: String::new(),
            fetched_at: DateTime::from_timestamp(fetched_secs, 0).unwrap(),
        }
    }

    fn links(articles: &[Article]) -> Vec<&str> {
        articles.iter().map(|a| a.link.as_str()).collect()
    }

    #[test]
    fn merge_drops_links_already_stored() {
        let existing = vec![article("https://x/1", 0)];
        let incoming = vec![article("https://x/1", 5), article("https://x/2", 5)];
        let (merged, new_count) = merge(existing, incoming);
        assert_eq!(new_count, 1);
        assert_eq!(links(&merged), vec!["https://x/1", "https://x/2"]);
        assert_eq!(merged[0].fetched_at.timestamp(), 0);
    }

    #[test]
    fn merge_drops_duplicates_within_batch() {
        let incoming = vec![article("a", 1), article("b", 1), article("a", 1)];
        let (merged, new_count) = merge(vec![], incoming);
        assert_eq!(new_count, 2);
        assert_eq!(links(&merged), vec!["a", "b"]);
    }

    #[test]
    fn capacity_evicts_oldest_fetched() {
        let articles = vec![article("ten", 10), article("twenty", 20), article("thirty", 30)];
        let kept = enforce_capacity(articles, 2);
        assert_eq!(links(&kept), vec!["twenty", "thirty"]);
    }

    #[test]
    fn capacity_noop_when_within_bounds() {
        let articles = vec![article("a", 3), article("b", 1)];
        let kept = enforce_capacity(articles.clone(), 2);
        assert_eq!(kept, articles);
    }

    #[test]
    fn capacity_ties_keep_earlier_entries() {
        let articles = vec![article("a", 5), article("b", 5), article("c", 5), article("old", 1)];
        let kept = enforce_capacity(articles, 2);
        assert_eq!(links(&kept), vec!["a", "b"]);
    }

    #[test]
    fn capacity_dropped_never_newer_than_kept() {
        let stamps = [7, 3, 9, 1, 9, 4, 6, 2, 8, 5];
        let articles: Vec<Article> = stamps
            .iter()
            .enumerate()
            .map(|(i, s)| article(&format!("l{}", i), *s))
            .collect();
        let kept = enforce_capacity(articles.clone(), 4);
        assert_eq!(kept.len(), 4);

        let kept_links: HashSet<&str> = kept.iter().map(|a| a.link.as_str()).collect();
        let oldest_kept = kept.iter().map(|a| a.fetched_at).min().unwrap();
        for dropped in articles.iter().filter(|a| !kept_links.contains(a.link.as_str())) {
            assert!(dropped.fetched_at <= oldest_kept);
        }
    }

    #[test]
    fn feed_sorts_by_published_with_undated_last() {
        let mut a = article("undated", 50);
        let mut b = article("old", 10);
        b.published_at = DateTime::from_timestamp(1_000, 0);
        let mut c = article("new", 20);
        c.published_at = DateTime::from_timestamp(2_000, 0);
        a.published_at = None;

        let mut articles = vec![a, b, c];
        sort_for_feed(&mut articles);
        assert_eq!(links(&articles), vec!["new", "old", "undated"]);
    }

    #[test]
    fn parses_rfc3339_and_rfc2822() {
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("Wed, 01 May 2024 10:00:00 +0000").is_some());
        assert!(parse_timestamp("yesterday-ish").is_none());
    }
}
