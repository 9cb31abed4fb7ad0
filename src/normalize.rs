use once_cell::sync::Lazy;
use regex::Regex;

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"http\S+|www\S+").expect("valid regex"));
static MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").expect("valid regex"));
static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\w+").expect("valid regex"));
static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s,.:;!?-]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Clean a raw report before it is handed to the model.
///
/// Strips URLs, mentions, hashtags and any character outside word characters,
/// whitespace and `,.:;!?-`, collapses whitespace and lowercases. The cleaning
/// pass is repeated until it reaches a fixed point, so the result is always
/// stable under another call.
pub fn normalize<S: AsRef<str>>(text: S) -> String {
    let mut current = clean_once(text.as_ref());
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(text: &str) -> String {
    let text = text.trim();
    let text = URL.replace_all(text, "");
    let text = MENTION.replace_all(&text, "");
    let text = HASHTAG.replace_all(&text, "");
    let text = DISALLOWED.replace_all(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    // Removed tokens at either end leave a single space behind.
    text.trim().to_lowercase()
}
