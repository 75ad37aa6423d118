/// Text processing utilities
pub mod text {
    use scraper::Html;

    /// Turn an HTML fragment (or plain text) into whitespace-collapsed text.
    /// Tags are dropped and entities decoded.
    pub fn plain_text(input: &str) -> String {
        if !input.contains('<') && !input.contains('&') {
            return collapse_whitespace(input);
        }
        let fragment = Html::parse_fragment(input);
        let text: String = fragment.root_element().text().collect::<Vec<_>>().join(" ");
        collapse_whitespace(&text)
    }

    pub fn collapse_whitespace(input: &str) -> String {
        input.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Truncate to at most `max_chars` characters without splitting a char.
    pub fn truncate_chars(input: &str, max_chars: usize) -> &str {
        match input.char_indices().nth(max_chars) {
            Some((idx, _)) => &input[..idx],
            None => input,
        }
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Resolve `link` against `base`, returning an absolute http(s) URL.
    pub fn resolve_link(base: &Url, link: &str) -> Option<String> {
        let link = link.trim();
        if link.is_empty() {
            return None;
        }
        let resolved = base.join(link).ok()?;
        matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
    }

    pub fn is_http_url(url_str: &str) -> bool {
        Url::parse(url_str)
            .map(|url| url.scheme() == "http" || url.scheme() == "https")
            .unwrap_or(false)
    }
}
