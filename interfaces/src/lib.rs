pub mod baseline;
pub mod defs;
pub mod error;

pub use baseline::BaselineSummarizer;
pub use defs::{Article, FetchAdapter, RawItem, Source, SourceType, Summarizer};
pub use error::{FetchErrorKind, SourceFetchError, UnknownSourceType};
