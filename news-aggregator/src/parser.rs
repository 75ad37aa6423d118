use crate::types::{FetchErrorKind, RawItem};
use crate::utils::url::resolve_link;
use feed_rs::model::{Entry, Link};
use feed_rs::parser;
use tracing::debug;
use url::Url;

/// Turns RSS 2.0 / Atom / JSON Feed documents into raw items.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a feed document. Entries without a usable link are skipped.
    pub fn parse_feed(&self, content: &[u8], base: &Url) -> Result<Vec<RawItem>, FetchErrorKind> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content)
            .map_err(|e| FetchErrorKind::Parse(format!("Failed to parse feed: {}", e)))?;

        let total = feed.entries.len();
        let items: Vec<RawItem> = feed
            .entries
            .into_iter()
            .filter_map(|entry| self.parse_entry(entry, base))
            .collect();

        if items.len() < total {
            debug!("Skipped {} entries without a link", total - items.len());
        }
        debug!("Parsed feed with {} entries", items.len());
        Ok(items)
    }

    fn parse_entry(&self, entry: Entry, base: &Url) -> Option<RawItem> {
        let link = primary_link(&entry.links)
            .and_then(|href| resolve_link(base, href))
            // Some feeds only carry the permalink in the id/guid.
            .or_else(|| resolve_link(base, &entry.id).filter(|_| entry.id.starts_with("http")))?;

        let title = entry
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        // Prefer full content over the summary.
        let body = entry
            .content
            .and_then(|c| c.body)
            .or_else(|| entry.summary.map(|s| s.content))
            .unwrap_or_default();

        Some(RawItem {
            title,
            link,
            published_at: entry.published.or(entry.updated),
            body,
        })
    }
}

fn primary_link(links: &[Link]) -> Option<&str> {
    links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| links.first())
        .map(|l| l.href.as_str())
}
