pub mod html_page;
pub mod rss_feed;

pub use html_page::HtmlPageAdapter;
pub use rss_feed::FeedAdapter;

use crate::fetcher::Fetcher;
use crate::types::{FetchAdapter, RawItem, Source, SourceFetchError, SourceType};
use async_trait::async_trait;
use std::sync::Arc;

/// One adapter per [`SourceType`], chosen by matching on the source's type.
pub struct SourceAdapters {
    feed: FeedAdapter,
    html_page: HtmlPageAdapter,
}

impl SourceAdapters {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self {
            feed: FeedAdapter::new(fetcher.clone()),
            html_page: HtmlPageAdapter::new(fetcher),
        }
    }
}

#[async_trait]
impl FetchAdapter for SourceAdapters {
    async fn fetch(&self, source: &Source) -> Result<Vec<RawItem>, SourceFetchError> {
        match source.source_type {
            SourceType::Feed => self.feed.fetch(source).await,
            SourceType::HtmlPage => self.html_page.fetch(source).await,
        }
    }
}
