//! Script parsing.
//!
//! A podcast script is line oriented. Each `Headline:` or `Text:` marker at the
//! start of a line opens a new segment that runs until the next marker.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PodcastError;

/// Kind of a script segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Short, spoken section title.
    Headline,
    /// Narrative body text.
    Text,
}

impl SegmentKind {
    /// Marker as it appears in script text (without the colon).
    pub fn marker(&self) -> &'static str {
        match self {
            SegmentKind::Headline => "Headline",
            SegmentKind::Text => "Text",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// One unit of the script, in reading order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptSegment {
    pub kind: SegmentKind,
    pub content: String,
    /// Zero-based position among the non-empty segments.
    pub order: usize,
}

/// Parse script text into densely numbered segments.
pub fn parse_script(text: &str) -> Result<Vec<ScriptSegment>, PodcastError> {
    let mut raw: Vec<(SegmentKind, String)> = Vec::new();

    for line in text.lines() {
        match split_marker(line) {
            Some((kind, rest)) => raw.push((kind, rest.to_string())),
            None => {
                // Lines before the first marker are preamble.
                if let Some((_, content)) = raw.last_mut() {
                    content.push('\n');
                    content.push_str(line);
                }
            }
        }
    }

    if raw.is_empty() {
        return Err(PodcastError::Parse(
            "script contains no 'Headline:' or 'Text:' markers".to_string(),
        ));
    }

    let segments: Vec<ScriptSegment> = raw
        .into_iter()
        .filter_map(|(kind, content)| {
            let content = content.trim();
            if content.is_empty() {
                None
            } else {
                Some((kind, content.to_string()))
            }
        })
        .enumerate()
        .map(|(order, (kind, content))| ScriptSegment {
            kind,
            content,
            order,
        })
        .collect();

    if segments.is_empty() {
        return Err(PodcastError::Parse(
            "every segment in the script is empty".to_string(),
        ));
    }

    Ok(segments)
}

/// Render segments back into script text using the backslash-prefixed form.
pub fn render_script(segments: &[ScriptSegment]) -> String {
    segments
        .iter()
        .map(|s| format!("\\{}: {}", s.kind.marker(), s.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Recognize `Headline:` / `Text:` at the start of a line, tolerating leading
/// whitespace and a single leading backslash.
fn split_marker(line: &str) -> Option<(SegmentKind, &str)> {
    let line = line.trim_start();
    let line = line.strip_prefix('\\').unwrap_or(line);

    [SegmentKind::Headline, SegmentKind::Text]
        .into_iter()
        .find_map(|kind| {
            line.strip_prefix(kind.marker())
                .and_then(|rest| rest.strip_prefix(':'))
                .map(|rest| (kind, rest))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alternating_markers() {
        let script = "Headline: Welcome\nText: Hello world.\nHeadline: Results\nText: They are good.";
        let segments = parse_script(script).unwrap();

        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0].kind, SegmentKind::Headline);
        assert_eq!(segments[0].content, "Welcome");
        assert_eq!(segments[1].kind, SegmentKind::Text);
        assert_eq!(segments[1].content, "Hello world.");
        let orders: Vec<usize> = segments.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_parse_multiline_text() {
        let script = "Text: first line\nsecond line\n\n  third line  \nHeadline: next";
        let segments = parse_script(script).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].content, "first line\nsecond line\n\n  third line");
    }

    #[test]
    fn test_parse_discards_preamble() {
        let script = "Here is your script:\n\nHeadline: Intro\nText: Body";
        let segments = parse_script(script).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].content, "Intro");
    }

    #[test]
    fn test_parse_backslash_markers() {
        let script = "\\Headline: Let's explore\n\\Text: Welcome back.";
        let segments = parse_script(script).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].kind, SegmentKind::Headline);
        assert_eq!(segments[1].content, "Welcome back.");
    }

    #[test]
    fn test_empty_segments_do_not_leave_gaps() {
        let script = "Headline: One\nText:   \nText: Two\nHeadline:\nText: Three";
        let segments = parse_script(script).unwrap();
        assert_eq!(segments.len(), 3);
        let orders: Vec<usize> = segments.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(segments[2].content, "Three");
    }

    #[test]
    fn test_no_markers_is_parse_error() {
        let err = parse_script("just some prose\nwithout markers").unwrap_err();
        assert!(matches!(err, PodcastError::Parse(_)));
    }

    #[test]
    fn test_all_empty_is_parse_error() {
        let err = parse_script("Headline:\nText:  \n").unwrap_err();
        assert!(matches!(err, PodcastError::Parse(_)));
    }

    #[test]
    fn test_marker_must_start_line() {
        let segments = parse_script("Text: the word Headline: appears mid-line").unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].content, "the word Headline: appears mid-line");
    }

    #[test]
    fn test_render_round_trips_through_parser() {
        let segments = parse_script("Headline: A\nText: B").unwrap();
        let rendered = render_script(&segments);
        assert_eq!(rendered, "\\Headline: A\n\\Text: B");
        assert_eq!(parse_script(&rendered).unwrap(), segments);
    }
}
