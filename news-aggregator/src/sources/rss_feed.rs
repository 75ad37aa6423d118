use crate::fetcher::Fetcher;
use crate::parser::FeedParser;
use crate::types::{FetchAdapter, FetchErrorKind, RawItem, Source, SourceFetchError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Syndication feed source (RSS, Atom, JSON Feed).
pub struct FeedAdapter {
    fetcher: Arc<Fetcher>,
    parser: FeedParser,
}

impl FeedAdapter {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self {
            fetcher,
            parser: FeedParser::new(),
        }
    }
}

#[async_trait]
impl FetchAdapter for FeedAdapter {
    async fn fetch(&self, source: &Source) -> Result<Vec<RawItem>, SourceFetchError> {
        info!("Pulling feed: {}", source.url);

        let url = Url::parse(&source.url)
            .map_err(|e| SourceFetchError::new(source, FetchErrorKind::InvalidUrl(e.to_string())))?;

        let content = self
            .fetcher
            .fetch_text(&url)
            .await
            .map_err(|kind| SourceFetchError::new(source, kind))?;

        let items = self
            .parser
            .parse_feed(content.as_bytes(), &url)
            .map_err(|kind| SourceFetchError::new(source, kind))?;

        info!("Pulled {} items from feed {}", items.len(), source.url);
        Ok(items)
    }
}
