// Short plain-text forms of message content for titles and the navigator

use once_cell::sync::Lazy;
use regex::Regex;

const SUMMARY_CHARS: usize = 50;
const TITLE_CHARS: usize = 30;
const ELLIPSIS: &str = "...";

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(```|~~~)[^\n]*$").unwrap());
static IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s+").unwrap());
static BLOCKQUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*>+\s?").unwrap());
static LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*+]|\d+\.)\s+").unwrap());
static EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\*\*|__|\*|_|~~)([^*_~]+?)(\*\*|__|\*|_|~~)").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]*)`").unwrap());
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z][^>]*>").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Remove markdown syntax and collapse all whitespace runs to one space
pub fn strip_markdown(content: &str) -> String {
    let text = CODE_FENCE.replace_all(content, "");
    let text = IMAGE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = BLOCKQUOTE.replace_all(&text, "");
    let text = LIST_MARKER.replace_all(&text, "");
    let text = EMPHASIS.replace_all(&text, "$2");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = HTML_TAG.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", text[..cut].trim_end(), ELLIPSIS),
        None => text.to_string(),
    }
}

/// Navigator entry for a message: stripped text, 50 chars plus `...` when longer
pub fn summarize(content: &str) -> String {
    truncate_chars(&strip_markdown(content), SUMMARY_CHARS)
}

/// Thread title from the first user message: 30 chars plus `...` when longer
///
/// The prompt is cut as typed, so a trailing space inside the cut is kept.
pub fn derive_title(content: &str) -> String {
    match content.char_indices().nth(TITLE_CHARS) {
        Some((cut, _)) => format!("{}{}", &content[..cut], ELLIPSIS),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_unchanged() {
        assert_eq!(summarize("Hello"), "Hello");
        assert_eq!(derive_title("Hello"), "Hello");
    }

    #[test]
    fn test_summary_truncates_at_fifty_chars() {
        let long = "a".repeat(80);
        let summary = summarize(&long);
        assert_eq!(summary, format!("{}...", "a".repeat(50)));
        assert_eq!(summary.chars().count(), 53);

        let exact = "b".repeat(50);
        assert_eq!(summarize(&exact), exact);
    }

    #[test]
    fn test_title_truncates_at_thirty_chars() {
        let title = derive_title("What is the weather like in Lisbon this weekend?");
        assert_eq!(title, "What is the weather like in Li...");
    }

    #[test]
    fn test_title_keeps_the_cut_as_typed() {
        assert_eq!(
            derive_title("What is the weather like in a place far away"),
            "What is the weather like in a ..."
        );
        assert_eq!(derive_title(&"x".repeat(30)), "x".repeat(30));
        assert_eq!(derive_title(&"ü".repeat(31)), format!("{}...", "ü".repeat(30)));
    }

    #[test]
    fn test_truncation_counts_chars_not_bytes() {
        let text = "é".repeat(60);
        assert_eq!(summarize(&text).chars().count(), 53);
    }

    #[test]
    fn test_strip_markdown() {
        let md = "# Title\n\n**Bold** and _italic_ with `code` and [a link](https://x.y).\n\n- item one\n- item two\n> quoted";
        assert_eq!(
            strip_markdown(md),
            "Title Bold and italic with code and a link. item one item two quoted"
        );
    }

    #[test]
    fn test_strip_markdown_keeps_code_block_body() {
        let md = "```rust\nfn main() {}\n```";
        assert_eq!(strip_markdown(md), "fn main() {}");
    }

    #[test]
    fn test_summarize_is_deterministic() {
        let md = "Here is **a lot** of text that keeps going well past the fifty character limit";
        assert_eq!(summarize(md), summarize(md));
        assert!(summarize(md).chars().count() <= 53);
    }
}
