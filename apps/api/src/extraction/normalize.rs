//! Text cleanup applied to every decoded document before it reaches callers.
//!
//! The pipeline is format-independent: the PDF and Word decoders both hand
//! over whatever raw text they recovered, and this module turns it into the
//! canonical form the rest of the system (analysis prompts, word counts)
//! operates on.

use once_cell::sync::Lazy;
use regex::Regex;

static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static NEWLINE_PADDING: Lazy<Regex> = Lazy::new(|| Regex::new(r" ?\n ?").unwrap());
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalizes raw decoder output into clean, stable text.
///
/// Steps, in order: CRLF/CR to LF, strip control characters (keeping newline
/// and tab), collapse space/tab runs to a single space, collapse 3+ blank
/// lines to one paragraph break, trim the ends.
pub fn clean_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

    let printable: String = unified
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    let collapsed = SPACE_RUNS.replace_all(&printable, " ");
    let trimmed_lines = NEWLINE_PADDING.replace_all(&collapsed, "\n");
    let paragraphs = EXCESS_NEWLINES.replace_all(&trimmed_lines, "\n\n");

    paragraphs.trim().to_string()
}

/// Whitespace-delimited token count of already-cleaned text.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_space_and_tab_runs() {
        assert_eq!(clean_text("a  \t b\t\tc"), "a b c");
    }

    #[test]
    fn test_normalizes_line_endings_to_lf() {
        assert_eq!(clean_text("one\r\ntwo\rthree"), "one\ntwo\nthree");
    }

    #[test]
    fn test_strips_control_characters_keeps_newline_and_tab() {
        assert_eq!(clean_text("a\u{0}b\u{8}c\nd\te"), "abc\nd e");
    }

    #[test]
    fn test_collapses_excess_newlines_to_paragraph_break() {
        assert_eq!(clean_text("one\n\n\n\ntwo"), "one\n\ntwo");
    }

    #[test]
    fn test_preserves_single_paragraph_break() {
        assert_eq!(clean_text("one\n\ntwo"), "one\n\ntwo");
    }

    #[test]
    fn test_trims_leading_and_trailing_whitespace() {
        assert_eq!(clean_text("  \n hello \n  "), "hello");
    }

    #[test]
    fn test_spaces_around_newlines_do_not_defeat_collapsing() {
        assert_eq!(clean_text("one \n \n \n two"), "one\n\ntwo");
    }

    #[test]
    fn test_word_count_ignores_extra_whitespace() {
        assert_eq!(word_count("Hello World"), 2);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("one\ntwo three"), 3);
    }
}
