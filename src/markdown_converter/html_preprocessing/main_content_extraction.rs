//! Main content extraction from document trees.
//!
//! Finds the subtree holding the primary content:
//! 1. Gathers candidates from semantic containers in priority order
//!    (`<article>`, `<main>`, `[role=main]`, common content classes and ids)
//! 2. Scores every candidate by text mass, punctuation and structure,
//!    penalizing link-heavy blocks
//! 3. Falls back to every block container when no semantic candidate is long
//!    enough, and to `<body>` (or the root) when nothing scores well
//! 4. Strips navigation, sidebars, comment threads and share widgets from the
//!    winner

use crate::dom::{BLOCK_CONTAINERS, Element, Node, SourceDocument};

/// Candidates with less visible text than this are ignored in the first round
pub const MIN_CANDIDATE_TEXT_LEN: usize = 140;

/// Winners scoring below this lose to the document body
pub const MIN_CONTENT_SCORE: f64 = 20.0;

/// Link density above which a candidate's score is halved
const LINK_HEAVY_THRESHOLD: f64 = 0.5;

const PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

// ============================================================================
// Candidate matchers
// ============================================================================

/// A single-condition element matcher. The owned tree has no CSS engine, and
/// the content selectors only ever test one tag, class, id or attribute.
#[derive(Debug, Clone, Copy)]
enum Matcher {
    Tag(&'static str),
    Class(&'static str),
    Id(&'static str),
    Attr(&'static str, &'static str),
}

impl Matcher {
    fn matches(self, el: &Element) -> bool {
        match self {
            Self::Tag(tag) => el.is(tag),
            Self::Class(class) => el.has_class(class),
            Self::Id(id) => el.attr("id").is_some_and(|v| v.eq_ignore_ascii_case(id)),
            Self::Attr(name, value) => el.attr(name).is_some_and(|v| v.eq_ignore_ascii_case(value)),
        }
    }
}

/// Content containers in priority order
const CONTENT_MATCHERS: &[Matcher] = &[
    Matcher::Tag("article"),
    Matcher::Tag("main"),
    Matcher::Attr("role", "main"),
    Matcher::Attr("itemprop", "articleBody"),
    Matcher::Id("main-content"),
    Matcher::Class("main-content"),
    Matcher::Id("content"),
    Matcher::Class("content"),
    Matcher::Class("post-content"),
    Matcher::Class("entry-content"),
    Matcher::Class("article-body"),
    Matcher::Class("story-body"),
    Matcher::Class("post"),
];

/// Boilerplate removed from inside the winning subtree
const BOILERPLATE_MATCHERS: &[Matcher] = &[
    Matcher::Tag("nav"),
    Matcher::Tag("aside"),
    Matcher::Tag("footer"),
    Matcher::Tag("form"),
    Matcher::Attr("role", "navigation"),
    Matcher::Attr("role", "complementary"),
    Matcher::Class("sidebar"),
    Matcher::Id("sidebar"),
    Matcher::Class("navigation"),
    Matcher::Class("menu"),
    Matcher::Class("breadcrumbs"),
    Matcher::Class("ads"),
    Matcher::Class("advertisement"),
    Matcher::Class("social-share"),
    Matcher::Class("share"),
    Matcher::Class("comments"),
    Matcher::Id("comments"),
    Matcher::Class("related-posts"),
    Matcher::Class("cookie-notice"),
    Matcher::Class("popup"),
    Matcher::Class("modal"),
];

// ============================================================================
// Scoring
// ============================================================================

/// A candidate subtree and its content score. Lives for one extraction.
#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate<'a> {
    pub element: &'a Element,
    pub score: f64,
}

/// Length of text with runs of whitespace counted as one character
fn visible_len(text: &str) -> usize {
    let mut len = 0usize;
    let mut words = 0usize;
    for word in text.split_whitespace() {
        len += word.chars().count();
        words += 1;
    }
    len + words.saturating_sub(1)
}

fn anchor_text_len(el: &Element) -> usize {
    el.child_elements()
        .map(|child| {
            if child.is("a") {
                visible_len(&child.text_content())
            } else {
                anchor_text_len(child)
            }
        })
        .sum()
}

/// Anchor text length over total text length, clamped to `[0, 1]`.
#[must_use]
pub fn link_density(el: &Element) -> f64 {
    let total = visible_len(&el.text_content());
    if total == 0 {
        return 0.0;
    }
    (anchor_text_len(el) as f64 / total as f64).clamp(0.0, 1.0)
}

/// `text_len * (1 - link_density) + 10*punctuation + 5*paragraphs + 3*images + 10*headings`,
/// halved when more than half the text is link text.
#[must_use]
pub fn score_element(el: &Element) -> f64 {
    let text = el.text_content();
    let text_len = visible_len(&text) as f64;
    let density = link_density(el);
    let punctuation = text.chars().filter(|c| PUNCTUATION.contains(c)).count() as f64;
    let paragraphs = el.count_tags(&["p"]) as f64;
    let images = el.count_tags(&["img"]) as f64;
    let headings = el.count_tags(HEADINGS) as f64;

    let score = text_len * (1.0 - density)
        + 10.0 * punctuation
        + 5.0 * paragraphs
        + 3.0 * images
        + 10.0 * headings;

    if density > LINK_HEAVY_THRESHOLD {
        score / 2.0
    } else {
        score
    }
}

// ============================================================================
// Main Content Extraction
// ============================================================================

/// Namespace for main content extraction
pub struct ContentExtractor;

impl ContentExtractor {
    /// Score candidates in discovery order: selector priority, then document order.
    #[must_use]
    pub fn score_candidates(root: &Element) -> Vec<ScoredCandidate<'_>> {
        let mut candidates: Vec<&Element> = Vec::new();
        for matcher in CONTENT_MATCHERS {
            let mut matched = Vec::new();
            if matcher.matches(root) {
                matched.push(root);
            }
            matched.extend(root.find_all(&|el| matcher.matches(el)));
            for el in matched {
                if !candidates.iter().any(|seen| std::ptr::eq(*seen, el)) {
                    candidates.push(el);
                }
            }
        }

        candidates.retain(|el| visible_len(&el.text_content()) >= MIN_CANDIDATE_TEXT_LEN);

        if candidates.is_empty() {
            tracing::debug!("No semantic content container is long enough, scoring block containers");
            candidates = root.find_all(&|el| BLOCK_CONTAINERS.contains(&el.tag.as_str()));
        }

        candidates
            .into_iter()
            .map(|element| ScoredCandidate {
                element,
                score: score_element(element),
            })
            .collect()
    }

    /// Select the primary content subtree of `document`.
    ///
    /// Never returns nothing: the worst case is the body, or the root when
    /// the document has no body.
    #[must_use]
    pub fn extract_main_content(document: &SourceDocument) -> Element {
        let root = document.root();
        let mut best: Option<ScoredCandidate<'_>> = None;
        for candidate in Self::score_candidates(root) {
            // Strict comparison keeps the earliest candidate on ties.
            if best.is_none_or(|b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }

        let winner = match best {
            Some(candidate) if candidate.score >= MIN_CONTENT_SCORE => {
                tracing::debug!(
                    element = %candidate.element.signature(),
                    score = candidate.score,
                    "Selected main content container"
                );
                candidate.element
            }
            _ => {
                tracing::debug!("No candidate reached the minimum score, using document body");
                document.body()
            }
        };

        let mut content = winner.clone();
        strip_boilerplate(&mut content);
        content
    }
}

fn is_boilerplate(el: &Element) -> bool {
    BOILERPLATE_MATCHERS.iter().any(|m| m.matches(el))
}

fn strip_boilerplate(el: &mut Element) {
    el.children.retain(|child| match child {
        Node::Element(child) => !is_boilerplate(child),
        _ => true,
    });
    for child in &mut el.children {
        if let Node::Element(child) = child {
            strip_boilerplate(child);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: &str = "Rust gives you control over memory layout, and the borrow checker \
        makes sure references never outlive their data. This paragraph is long enough, \
        with punctuation, to count as real content.";

    fn doc(html: &str) -> SourceDocument {
        SourceDocument::parse_html(html, None)
    }

    #[test]
    fn test_prefers_article_over_link_list() {
        let html = format!(
            "<html><body><div class=\"links\"><a href=\"/1\">{LONG}</a></div>\
             <article><h1>Post</h1><p>{LONG}</p></article></body></html>"
        );
        let content = ContentExtractor::extract_main_content(&doc(&html));
        assert!(content.is("article"));
    }

    #[test]
    fn test_removes_navigation_inside_winner() {
        let html = format!(
            "<html><body><article><nav>Menu</nav><p>{LONG}</p>\
             <div class=\"comments\">Nice post!</div></article></body></html>"
        );
        let content = ContentExtractor::extract_main_content(&doc(&html));
        let text = content.text_content();
        assert!(!text.contains("Menu"));
        assert!(!text.contains("Nice post"));
        assert!(text.contains("borrow checker"));
    }

    #[test]
    fn test_falls_back_to_block_containers() {
        let html = format!(
            "<html><body><div id=\"x\"><p>{LONG}</p><p>{LONG}</p></div><div>tiny</div></body></html>"
        );
        let content = ContentExtractor::extract_main_content(&doc(&html));
        assert!(content.text_content().contains("borrow checker"));
    }

    #[test]
    fn test_empty_document_returns_body() {
        let content = ContentExtractor::extract_main_content(&doc(""));
        assert!(content.is("body"));
    }

    #[test]
    fn test_rootless_tree_returns_root() {
        let document = SourceDocument::new(Element::new("section"), None);
        let content = ContentExtractor::extract_main_content(&document);
        assert!(content.is("section"));
    }

    #[test]
    fn test_link_density() {
        let el = Element::new("div")
            .with_child(Node::Element(Element::new("a").with_text("abcd")))
            .with_text("efgh");
        assert!((link_density(&el) - 0.5).abs() < 1e-9);
        assert_eq!(link_density(&Element::new("div")), 0.0);
    }

    #[test]
    fn test_link_heavy_score_is_halved() {
        let links = Element::new("div").with_child(Node::Element(Element::new("a").with_text("abcdefghij")));
        // 10 chars, density 1.0 -> (0 + 0) / 2
        assert_eq!(score_element(&links), 0.0);
    }
}
