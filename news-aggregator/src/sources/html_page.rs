use crate::fetcher::Fetcher;
use crate::store::parse_timestamp;
use crate::types::{FetchAdapter, FetchErrorKind, RawItem, Source, SourceFetchError};
use crate::utils::text::collapse_whitespace;
use crate::utils::url::resolve_link;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Markup page whose `<article>` elements are treated as items.
pub struct HtmlPageAdapter {
    fetcher: Arc<Fetcher>,
}

impl HtmlPageAdapter {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl FetchAdapter for HtmlPageAdapter {
    async fn fetch(&self, source: &Source) -> Result<Vec<RawItem>, SourceFetchError> {
        info!("Scraping page: {}", source.url);

        let url = Url::parse(&source.url)
            .map_err(|e| SourceFetchError::new(source, FetchErrorKind::InvalidUrl(e.to_string())))?;

        let content = self
            .fetcher
            .fetch_text(&url)
            .await
            .map_err(|kind| SourceFetchError::new(source, kind))?;

        let items = extract_articles(&content, &url).map_err(|kind| SourceFetchError::new(source, kind))?;

        info!("Scraped {} items from {}", items.len(), source.url);
        Ok(items)
    }
}

fn selector(css: &str) -> Result<Selector, FetchErrorKind> {
    Selector::parse(css).map_err(|e| FetchErrorKind::Parse(format!("invalid selector '{}': {}", css, e)))
}

/// Extract one item per `<article>` block that has a resolvable link.
pub fn extract_articles(html: &str, base: &Url) -> Result<Vec<RawItem>, FetchErrorKind> {
    let document = Html::parse_document(html);

    let article_sel = selector("article")?;
    let heading_sel = selector("h1, h2, h3, h4")?;
    let link_sel = selector("a[href]")?;
    let paragraph_sel = selector("p")?;
    let time_sel = selector("time[datetime]")?;

    let mut items = Vec::new();
    for block in document.select(&article_sel) {
        let heading = block.select(&heading_sel).next();

        let href = heading
            .and_then(|h| h.select(&link_sel).next())
            .or_else(|| block.select(&link_sel).next())
            .and_then(|a| a.value().attr("href"));
        let Some(link) = href.and_then(|href| resolve_link(base, href)) else {
            debug!("Skipping <article> without a link");
            continue;
        };

        let title = heading
            .map(element_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        let paragraphs: Vec<String> = block
            .select(&paragraph_sel)
            .map(element_text)
            .filter(|p| !p.is_empty())
            .collect();
        let body = if paragraphs.is_empty() {
            element_text(block)
        } else {
            paragraphs.join("\n\n")
        };

        let published_at = block
            .select(&time_sel)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .and_then(parse_timestamp);

        items.push(RawItem {
            title,
            link,
            published_at,
            body,
        });
    }

    Ok(items)
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html><body>
  <header><a href="/">Home</a></header>
  <main>
    <article>
      <h2><a href="/posts/alpha">Alpha   launch</a></h2>
      <time datetime="2024-06-01T08:00:00Z">June 1</time>
      <p>First paragraph.</p>
      <p>Second   paragraph.</p>
    </article>
    <article>
      <h3>Beta</h3>
      <div>No paragraphs here <a href="https://elsewhere.example/beta">read</a></div>
    </article>
    <article>
      <h2>Orphan without link</h2>
      <p>Nothing to point at.</p>
    </article>
  </main>
</body></html>"#;

    #[test]
    fn extracts_article_blocks() {
        let base = Url::parse("https://blog.example/news/").unwrap();
        let items = extract_articles(PAGE, &base).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "Alpha launch");
        assert_eq!(items[0].link, "https://blog.example/posts/alpha");
        assert_eq!(items[0].body, "First paragraph.\n\nSecond paragraph.");
        assert_eq!(items[0].published_at.map(|d| d.to_rfc3339()).as_deref(), Some("2024-06-01T08:00:00+00:00"));

        assert_eq!(items[1].title, "Beta");
        assert_eq!(items[1].link, "https://elsewhere.example/beta");
        assert!(items[1].body.contains("No paragraphs here"));
        assert!(items[1].published_at.is_none());
    }

    #[test]
    fn page_without_articles_yields_nothing() {
        let base = Url::parse("https://blog.example/").unwrap();
        let items = extract_articles("<html><body><p>hi</p></body></html>", &base).unwrap();
        assert!(items.is_empty());
    }
}
