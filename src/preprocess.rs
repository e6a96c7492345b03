//! Markdown cleanup applied before extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IMAGE_REGEX: Regex = Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap();
    static ref EMPTY_TABLE_ROW_REGEX: Regex = Regex::new(r"\|(?:[ \t]*\|){5,}").unwrap();
    static ref BLANK_RUN_REGEX: Regex = Regex::new(r"\n\n\n+").unwrap();
}

/// Glyphs that are dropped outright.
const STRIPPED_GLYPHS: [char; 5] = ['■', '\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

const EMPTY_TABLE_ROW: &str = "| | | | | |";

/// Normalize raw markdown. Images never survive, decorative glyphs are removed,
/// runs of empty table cells collapse to a minimal separator and blank-line
/// runs shrink to a single blank line.
pub fn preprocess(markdown: &str) -> String {
    let mut text: String = markdown
        .chars()
        .filter(|c| !STRIPPED_GLYPHS.contains(c))
        .collect();
    text = text.replace('©', "(c)");

    // Removing one image can splice its neighbours into a new one.
    while IMAGE_REGEX.is_match(&text) {
        text = IMAGE_REGEX.replace_all(&text, "").into_owned();
    }

    let text = EMPTY_TABLE_ROW_REGEX.replace_all(&text, EMPTY_TABLE_ROW);
    let text = BLANK_RUN_REGEX.replace_all(&text, "\n\n");

    text.trim().to_string()
}
