//! Speech sanitization for segment text.

use regex::Regex;
use std::sync::LazyLock;

static MARKDOWN_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));
static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("valid regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[\w]+[^>]*>").expect("valid regex"));
static LATEX_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[a-zA-Z]+\{").expect("valid regex"));
static LITERAL_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[ntr]").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Punctuation that reads naturally when spoken.
const SPEAKABLE_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '\'', '"', '-', '(', ')', '%', '&', '$', '/', '+',
];

/// Make segment text safe to hand to a TTS engine.
///
/// Returns an empty string when nothing speakable remains.
pub fn sanitize_for_speech(text: &str) -> String {
    let mut result = MARKDOWN_IMAGE.replace_all(text, " ").into_owned();
    result = MARKDOWN_LINK.replace_all(&result, "$1").into_owned();
    result = URL.replace_all(&result, " ").into_owned();
    result = TAG.replace_all(&result, "").into_owned();
    // Commands first so `\textbf{` is not read as a tab escape.
    result = LATEX_COMMAND.replace_all(&result, " ").into_owned();
    result = LITERAL_ESCAPE.replace_all(&result, " ").into_owned();

    let result: String = result
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            _ => c,
        })
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || SPEAKABLE_PUNCTUATION.contains(c))
        .collect();

    WHITESPACE.replace_all(&result, " ").trim().to_string()
}
