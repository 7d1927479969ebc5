//! Markdown post-processing and derived counts.
//!
//! Everything here is fence aware: lines inside fenced code blocks are left
//! exactly as they are and do not contribute prose words or image references.

use std::sync::LazyLock;

use regex::Regex;

static IMAGE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[(?:\\.|[^\]\\])*\]\(").expect("BUG: hardcoded regex is invalid")
});

/// Code fence state to track fence type and character count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CodeFence {
    char: char,
    count: usize,
}

/// Detect code fence marker at the start of a line
/// Returns Some((char, count)) if the line starts with 3+ backticks or tildes
fn detect_code_fence(line: &str) -> Option<(char, usize)> {
    let trimmed = line.trim_start();
    for fence_char in ['`', '~'] {
        if trimmed.starts_with(fence_char) {
            let count = trimmed.chars().take_while(|&c| c == fence_char).count();
            if count >= 3 {
                return Some((fence_char, count));
            }
        }
    }
    None
}

/// Position of a line relative to fenced code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Prose,
    FenceOpen,
    FenceClose,
    Code,
}

/// Classify each line, tracking open fences. An unclosed fence runs to the end.
fn classify_lines(markdown: &str) -> Vec<(LineKind, &str)> {
    let mut fence: Option<CodeFence> = None;
    let mut lines = Vec::new();
    for line in markdown.lines() {
        let kind = match (fence, detect_code_fence(line)) {
            (Some(open), Some((ch, count))) if ch == open.char && count >= open.count
                && line.trim().chars().all(|c| c == ch) =>
            {
                fence = None;
                LineKind::FenceClose
            }
            (Some(_), _) => LineKind::Code,
            (None, Some((ch, count))) => {
                fence = Some(CodeFence { char: ch, count });
                LineKind::FenceOpen
            }
            (None, None) => LineKind::Prose,
        };
        lines.push((kind, line));
    }
    lines
}

/// Normalize whitespace in markdown content
///
/// * trailing whitespace removed from every line outside fenced code
/// * runs of blank lines collapsed to a single blank line
/// * leading and trailing blank lines of the document removed
///
/// Code block contents are preserved exactly, including blank lines.
///
/// ```
/// use kodegen_tools_clipmark::markdown_converter::markdown_postprocessing::normalize_whitespace;
///
/// let input = "# Heading\n\n\n\nParagraph   \n\n\nAnother";
/// assert_eq!(normalize_whitespace(input), "# Heading\n\nParagraph\n\nAnother");
/// ```
#[must_use]
pub fn normalize_whitespace(markdown: &str) -> String {
    let mut result: Vec<&str> = Vec::new();
    let mut consecutive_blanks = 0usize;

    for (kind, line) in classify_lines(markdown) {
        if kind == LineKind::Code {
            result.push(line);
            consecutive_blanks = 0;
            continue;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            consecutive_blanks += 1;
            if consecutive_blanks == 1 && !result.is_empty() {
                result.push("");
            }
            continue;
        }
        consecutive_blanks = 0;
        result.push(trimmed);
    }

    while result.last().is_some_and(|line| line.trim().is_empty()) {
        result.pop();
    }
    result.join("\n")
}

/// Words of prose outside fenced code. Tokens made only of markup are skipped.
#[must_use]
pub fn count_words(markdown: &str) -> usize {
    classify_lines(markdown)
        .into_iter()
        .filter(|(kind, _)| *kind == LineKind::Prose)
        .map(|(_, line)| {
            line.split_whitespace()
                .filter(|token| token.chars().any(char::is_alphanumeric))
                .count()
        })
        .sum()
}

/// Image references (`![alt](...)`) outside fenced code.
#[must_use]
pub fn count_images(markdown: &str) -> usize {
    classify_lines(markdown)
        .into_iter()
        .filter(|(kind, _)| *kind == LineKind::Prose)
        .map(|(_, line)| IMAGE_REF_RE.find_iter(line).count())
        .sum()
}

/// Fenced code blocks in the document.
#[must_use]
pub fn count_code_blocks(markdown: &str) -> usize {
    classify_lines(markdown)
        .into_iter()
        .filter(|(kind, _)| *kind == LineKind::FenceOpen)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_blank_lines_and_trims() {
        let input = "\n\n# Heading\n\n\n\nParagraph   \n\n\nAnother\n\n\n";
        assert_eq!(normalize_whitespace(input), "# Heading\n\nParagraph\n\nAnother");
    }

    #[test]
    fn test_code_block_preserved() {
        let input = "Intro\n\n```python\ndef f():  \n\n\n\n    pass\n```\n\n\n\nOutro";
        assert_eq!(
            normalize_whitespace(input),
            "Intro\n\n```python\ndef f():  \n\n\n\n    pass\n```\n\nOutro"
        );
    }

    #[test]
    fn test_inner_backticks_do_not_close_longer_fence() {
        let input = "````md\n```\ninner\n```\n````\n\n\n\nafter";
        assert_eq!(count_code_blocks(input), 1);
        assert_eq!(normalize_whitespace(input), "````md\n```\ninner\n```\n````\n\nafter");
    }

    #[test]
    fn test_counts() {
        let md = "# Title\n\nHello **world**, two images ![a](a.png) and ![b](b.png)\n\n```\n![not](counted.png) code words\n```\n\n- item";
        assert_eq!(count_images(md), 2);
        assert_eq!(count_code_blocks(md), 1);
        // Title, Hello, **world**,, two, images, ![a](a.png), and, ![b](b.png), item
        assert_eq!(count_words(md), 9);
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(normalize_whitespace(""), "");
        assert_eq!(count_words(""), 0);
        assert_eq!(count_images(""), 0);
        assert_eq!(count_code_blocks(""), 0);
    }
}
