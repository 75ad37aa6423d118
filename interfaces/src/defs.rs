use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{SourceFetchError, UnknownSourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// RSS 2.0, Atom or JSON Feed.
    Feed,
    /// A markup page whose `<article>` blocks are the items.
    HtmlPage,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::HtmlPage => "html_page",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = UnknownSourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feed" | "rss" | "atom" => Ok(Self::Feed),
            "html_page" | "html" | "page" => Ok(Self::HtmlPage),
            other => Err(UnknownSourceType(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub source_type: SourceType,
    pub enabled: bool,
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            source_type,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub source_id: Uuid,
    pub source_name: String,
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub fetched_at: DateTime<Utc>,
}

impl Article {
    pub fn from_raw(source: &Source, item: RawItem, summary: String, fetched_at: DateTime<Utc>) -> Self {
        Self {
            source_id: source.id,
            source_name: source.name.clone(),
            title: item.title,
            link: item.link,
            published_at: item.published_at,
            summary,
            fetched_at,
        }
    }
}

// Contract notes:
// A FetchAdapter reports every failure as a SourceFetchError for the source it
// was given; zero items is a normal result. A Summarizer is total: it returns
// a string for any input (the empty string for empty input) and swallows the
// failures of whatever it delegates to.

#[async_trait]
pub trait FetchAdapter: Send + Sync {
    async fn fetch(&self, source: &Source) -> Result<Vec<RawItem>, SourceFetchError>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, body: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_parses_aliases() {
        assert_eq!("rss".parse::<SourceType>(), Ok(SourceType::Feed));
        assert_eq!(" Feed ".parse::<SourceType>(), Ok(SourceType::Feed));
        assert_eq!("html".parse::<SourceType>(), Ok(SourceType::HtmlPage));
        assert!("gopher".parse::<SourceType>().is_err());
    }

    #[test]
    fn new_source_is_enabled_with_fresh_id() {
        let a = Source::new("A", "https://a.example/rss", SourceType::Feed);
        let b = Source::new("A", "https://a.example/rss", SourceType::Feed);
        assert!(a.enabled);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn article_serializes_camel_case() {
        let source = Source::new("Example", "https://x/feed", SourceType::Feed);
        let item = RawItem {
            title: "t".into(),
            link: "https://x/1".into(),
            published_at: None,
            body: "b".into(),
        };
        let article = Article::from_raw(&source, item, "s".into(), Utc::now());
        let json = serde_json::to_value(&article).unwrap();
        assert_eq!(json["sourceName"], "Example");
        assert!(json.get("fetchedAt").is_some());
        assert!(json["publishedAt"].is_null());
    }
}
