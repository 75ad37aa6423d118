use async_trait::async_trait;

use crate::defs::Summarizer;

pub const DEFAULT_SUMMARY_CHARS: usize = 280;

/// Summarizer that keeps the leading text of the body.
///
/// Whitespace is collapsed and the result is cut at a word boundary no longer
/// than `max_chars` characters, with an ellipsis appended when anything was
/// dropped. Empty input yields the empty string.
#[derive(Debug, Clone, Copy)]
pub struct BaselineSummarizer {
    pub max_chars: usize,
}

impl BaselineSummarizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn summarize_text(&self, body: &str) -> String {
        let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= self.max_chars {
            return collapsed;
        }

        let cut: String = collapsed.chars().take(self.max_chars).collect();
        let head = match cut.rfind(' ') {
            // Avoid throwing away most of the budget for one long word.
            Some(idx) if idx >= cut.len() / 2 => &cut[..idx],
            _ => cut.as_str(),
        };
        format!("{}…", head.trim_end_matches(|c: char| c.is_whitespace() || ",;:".contains(c)))
    }
}

impl Default for BaselineSummarizer {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_CHARS)
    }
}

#[async_trait]
impl Summarizer for BaselineSummarizer {
    async fn summarize(&self, body: &str) -> String {
        self.summarize_text(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_gives_empty_summary() {
        assert_eq!(BaselineSummarizer::default().summarize_text(""), "");
        assert_eq!(BaselineSummarizer::default().summarize_text("   \n\t"), "");
    }

    #[test]
    fn short_body_is_passed_through_collapsed() {
        let s = BaselineSummarizer::new(50);
        assert_eq!(s.summarize_text("  Hello \n  world  "), "Hello world");
    }

    #[test]
    fn long_body_is_cut_at_word_boundary() {
        let s = BaselineSummarizer::new(20);
        let out = s.summarize_text("The quick brown fox jumps over the lazy dog");
        assert_eq!(out, "The quick brown fox…");
        assert!(out.chars().count() <= 21);
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let s = BaselineSummarizer::new(4);
        assert_eq!(s.summarize_text("żółćżółć"), "żółć…");
    }

    #[tokio::test]
    async fn trait_impl_matches_inherent_fn() {
        let s = BaselineSummarizer::new(10);
        let body = "one two three four five";
        assert_eq!(s.summarize(body).await, s.summarize_text(body));
    }
}
