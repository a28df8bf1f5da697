//! The page-fetcher contract (C2) and the `browse_web` text-extraction
//! heuristic.
//!
//! [`PageFetcher`] is a thin `async_trait` seam, grounded the same way as
//! [`crate::chat::ChatService`]: callers bring their own HTTP/headless-browser
//! backed implementation; the core never does network I/O itself. What the
//! core *does* own is turning whatever raw HTML a fetcher returns into the
//! bounded plain-text extract the `browse_web` tool hands back to an agent
//! (§4.4). That extraction is done by manual string scanning rather than a
//! dedicated HTML parser crate, matching the teacher's preference for
//! hand-rolled parsing over a heavier dependency (see `agent.rs`'s
//! brace-counting `parse_tool_call`).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe",
];
const MEDIA_TAGS: &[&str] = &["img", "video", "audio", "picture", "source", "svg", "canvas"];
const CANDIDATE_TAGS: &[(&str, f64)] = &[("article", 1.5), ("main", 1.2), ("div", 1.0)];
const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Failure returned by a [`PageFetcher`] implementation.
#[derive(Debug, Clone)]
pub struct FetchError {
    pub message: String,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch error: {}", self.message)
    }
}

impl std::error::Error for FetchError {}

/// The page-fetching seam (C2). Returns raw HTML; extraction is the core's job.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` on behalf of `agent_id`, returning the raw response body.
    async fn fetch(&self, agent_id: &str, url: &str) -> Result<String, FetchError>;
}

/// Per-agent browsing state: a bound fetcher plus the owning agent's identity.
#[derive(Clone)]
pub struct BrowserSession {
    fetcher: Arc<dyn PageFetcher>,
    agent_id: String,
}

impl BrowserSession {
    pub fn new(fetcher: Arc<dyn PageFetcher>, agent_id: impl Into<String>) -> Self {
        BrowserSession {
            fetcher,
            agent_id: agent_id.into(),
        }
    }

    /// Fetches `url` and returns its cleaned, ceiling-truncated main-text extract.
    pub async fn browse(&self, url: &str, ceiling_chars: usize) -> Result<String, FetchError> {
        let html = self.fetcher.fetch(&self.agent_id, url).await?;
        Ok(extract_main_text(&html, ceiling_chars))
    }
}

/// Strips navigational/script/media noise from `html`, selects the candidate
/// subtree with the highest weighted text length, and truncates it to
/// `ceiling_chars`, marking truncation explicitly when it occurs (P10).
pub fn extract_main_text(html: &str, ceiling_chars: usize) -> String {
    let mut stripped = html.to_string();
    for tag in EXCLUDED_TAGS.iter().chain(MEDIA_TAGS.iter()) {
        stripped = strip_tag_blocks(&stripped, tag);
    }

    let mut best: Option<(f64, String)> = None;
    for (tag, weight) in CANDIDATE_TAGS {
        for block in extract_tag_blocks(&stripped, tag) {
            let text = strip_all_tags(&block);
            let weighted_len = text.chars().count() as f64 * weight;
            if best.as_ref().map(|(len, _)| weighted_len > *len).unwrap_or(true) {
                best = Some((weighted_len, text));
            }
        }
    }

    let text = best
        .map(|(_, text)| text)
        .unwrap_or_else(|| strip_all_tags(&stripped));
    let text = collapse_whitespace(&text);
    truncate_with_marker(&text, ceiling_chars)
}

/// Removes every `<tag ...> ... </tag>` block (including self-closing and
/// nested occurrences of the same tag) from `html`.
fn strip_tag_blocks(html: &str, tag: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let lower = html.to_ascii_lowercase();
    let mut cursor = 0usize;

    while let Some(rel_start) = find_tag_open(&lower[cursor..], tag) {
        let start = cursor + rel_start;
        result.push_str(&html[cursor..start]);
        match find_matching_close(&lower, &html[start..], start, tag) {
            Some(end) => cursor = end,
            None => {
                cursor = html.len();
                break;
            }
        }
    }
    result.push_str(&html[cursor..]);
    result
}

/// Returns the text of every `<tag ...> ... </tag>` block found in `html`,
/// including the tags themselves (callers strip inner markup separately).
fn extract_tag_blocks(html: &str, tag: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let lower = html.to_ascii_lowercase();
    let mut cursor = 0usize;

    while let Some(rel_start) = find_tag_open(&lower[cursor..], tag) {
        let start = cursor + rel_start;
        match find_matching_close(&lower, &html[start..], start, tag) {
            Some(end) => {
                blocks.push(html[start..end].to_string());
                cursor = end;
            }
            None => break,
        }
    }
    blocks
}

/// Finds the byte offset of the next `<tag` opening occurrence (word-boundary
/// checked so `<divider>` does not match tag `div`).
fn find_tag_open(haystack: &str, tag: &str) -> Option<usize> {
    let needle = format!("<{tag}");
    let mut search_from = 0usize;
    while let Some(idx) = haystack[search_from..].find(&needle) {
        let abs = search_from + idx;
        let after = haystack.as_bytes().get(abs + needle.len()).copied();
        if matches!(after, Some(b' ') | Some(b'>') | Some(b'/') | Some(b'\t') | Some(b'\n') | None) {
            return Some(abs);
        }
        search_from = abs + needle.len();
    }
    None
}

/// Given the lowercase full document and the slice of `html` starting at a
/// `<tag` open, walks forward counting nested opens/closes of the same tag
/// and returns the absolute end offset (just past `</tag>`) of the matching
/// close. Returns `None` if the tag is unclosed or self-closing.
fn find_matching_close(lower_full: &str, from_open: &str, abs_start: usize, tag: &str) -> Option<usize> {
    let open_needle = format!("<{tag}");
    let close_needle = format!("</{tag}>");

    let first_gt = from_open.find('>')?;
    if from_open.as_bytes()[first_gt - 1] == b'/' {
        // Self-closing, e.g. <div/>.
        return Some(abs_start + first_gt + 1);
    }

    let mut depth = 1i32;
    let mut cursor = abs_start + first_gt + 1;
    loop {
        let remainder = &lower_full[cursor..];
        let next_open = find_tag_open(remainder, tag).map(|i| cursor + i);
        let next_close = remainder.find(&close_needle).map(|i| cursor + i);
        match (next_open, next_close) {
            (Some(o), Some(c)) if o < c => {
                depth += 1;
                cursor = o + open_needle.len();
            }
            (_, Some(c)) => {
                depth -= 1;
                cursor = c + close_needle.len();
                if depth == 0 {
                    return Some(cursor);
                }
            }
            (Some(o), None) => {
                depth += 1;
                cursor = o + open_needle.len();
            }
            (None, None) => return None,
        }
    }
}

/// Strips all remaining `<...>` markup and decodes a handful of common HTML
/// entities, leaving plain text.
fn strip_all_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_with_marker(text: &str, ceiling_chars: usize) -> String {
    if text.chars().count() <= ceiling_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(ceiling_chars).collect();
    format!("{truncated}{TRUNCATION_MARKER}")
}
