//! Formula protection across Markdown rendering
//!
//! Formulas would be mangled by Markdown escaping, so they are lifted out of
//! the tree before the walk and put back afterwards:
//!
//! 1. `extract_with_replacement` swaps each formula for an opaque placeholder
//!    token and records it in a [`FormulaPlaceholder`] table
//! 2. the tree is rendered; tokens pass through untouched
//! 3. `restore` replaces every token with `$f$` (inline) or a `$$` block
//!
//! Recognized, in priority order: math class elements and `<math>` elements
//! (whole subtree replaced), then `$$…$$` and `$…$` in text nodes. Text inside
//! code, keyboard and sample elements is never scanned.

use fancy_regex::Regex as FancyRegex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::mathml::{mathml_to_latex, tex_annotation};
use crate::dom::{Element, Node};

/// Formulas longer than this that use a backslash command render as blocks
pub const BLOCK_LENGTH_THRESHOLD: usize = 50;

const TOKEN_OPEN: char = '\u{E000}';
const TOKEN_CLOSE: char = '\u{E001}';

/// Elements whose text is literal and never holds formulas
const LITERAL_ELEMENTS: &[&str] = &["pre", "code", "kbd", "samp", "script", "style", "textarea"];

const MATH_CLASSES: &[&str] = &[
    "math",
    "math-inline",
    "math-display",
    "katex",
    "katex-display",
    "mathjax",
    "mathjax_display",
    "mathjax_preview",
    "arithmatex",
    "latex",
];

static DISPLAY_MATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\$\$(.+?)\$\$").expect("BUG: hardcoded DISPLAY_MATH_RE is invalid")
});

// No whitespace just inside the delimiters, no digit right after the closing
// one and no escaped dollars. Keeps prices like "$5 or $10" as text.
static INLINE_MATH_RE: LazyLock<FancyRegex> = LazyLock::new(|| {
    FancyRegex::new(r"(?<!\\)\$(?!\s)([^$\n]+?)(?<![\s\\])\$(?!\d)")
        .expect("BUG: hardcoded INLINE_MATH_RE is invalid")
});

static COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[a-zA-Z]+").expect("BUG: hardcoded COMMAND_RE is invalid"));

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\u{E000}(\\d+)\u{E001}").expect("BUG: hardcoded TOKEN_RE is invalid")
});

/// One protected formula. Lives for a single conversion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaPlaceholder {
    pub index: usize,
    pub formula: String,
    pub is_block: bool,
}

impl FormulaPlaceholder {
    /// Opaque token standing in for the formula inside rendered text
    #[must_use]
    pub fn token(&self) -> String {
        format!("{TOKEN_OPEN}{}{TOKEN_CLOSE}", self.index)
    }

    #[must_use]
    pub fn render(&self) -> String {
        if self.is_block {
            format!("\n\n$$\n{}\n$$\n\n", self.formula)
        } else {
            format!("${}$", self.formula)
        }
    }
}

/// A run of rendered text, split at placeholder tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenSegment<'t> {
    Text(&'t str),
    Formula(usize),
}

/// Split `text` into literal runs and the placeholder indexes between them.
pub(crate) fn token_segments(text: &str) -> Vec<TokenSegment<'_>> {
    if !text.contains(TOKEN_OPEN) {
        return vec![TokenSegment::Text(text)];
    }
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in TOKEN_RE.captures_iter(text) {
        let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Ok(index) = digits.as_str().parse::<usize>() else {
            continue;
        };
        if whole.start() > last {
            segments.push(TokenSegment::Text(&text[last..whole.start()]));
        }
        segments.push(TokenSegment::Formula(index));
        last = whole.end();
    }
    if last < text.len() {
        segments.push(TokenSegment::Text(&text[last..]));
    }
    segments
}

/// Namespace for formula extraction and restoration
pub struct MathFormatter;

impl MathFormatter {
    /// Replace every formula in the tree with a placeholder token.
    #[must_use]
    pub fn extract_with_replacement(root: &Element) -> (Element, Vec<FormulaPlaceholder>) {
        let mut out = root.clone();
        let mut table = Vec::new();
        let literal = LITERAL_ELEMENTS.contains(&out.tag.as_str());
        extract_children(&mut out, &mut table, literal);
        tracing::debug!(formulas = table.len(), "Protected math formulas");
        (out, table)
    }

    /// Swap placeholder tokens back for `$f$` / `$$` blocks.
    ///
    /// Tokens with no table entry are dropped.
    #[must_use]
    pub fn restore(markdown: &str, placeholders: &[FormulaPlaceholder]) -> String {
        if placeholders.is_empty() && !markdown.contains(TOKEN_OPEN) {
            return markdown.to_string();
        }
        TOKEN_RE
            .replace_all(markdown, |caps: &regex::Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| placeholders.iter().find(|p| p.index == idx))
                    .map(FormulaPlaceholder::render)
                    .unwrap_or_default()
            })
            .into_owned()
    }

    /// A formula renders as a block when it uses a backslash command and is long.
    #[must_use]
    pub fn is_block_formula(formula: &str) -> bool {
        formula.chars().count() > BLOCK_LENGTH_THRESHOLD && COMMAND_RE.is_match(formula)
    }
}

fn push_formula(table: &mut Vec<FormulaPlaceholder>, formula: String, is_block: bool) -> Node {
    let placeholder = FormulaPlaceholder {
        index: table.len(),
        formula,
        is_block,
    };
    let token = placeholder.token();
    table.push(placeholder);
    Node::Text(token)
}

fn extract_children(el: &mut Element, table: &mut Vec<FormulaPlaceholder>, literal: bool) {
    let children = std::mem::take(&mut el.children);
    let mut rebuilt = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Node::Element(mut child) => {
                if !literal && let Some((formula, is_block)) = element_formula(&child) {
                    rebuilt.push(push_formula(table, formula, is_block));
                    continue;
                }
                let child_literal = literal || LITERAL_ELEMENTS.contains(&child.tag.as_str());
                extract_children(&mut child, table, child_literal);
                rebuilt.push(Node::Element(child));
            }
            Node::Text(text) if !literal => rebuilt.extend(split_text(&text, table)),
            other => rebuilt.push(other),
        }
    }
    el.children = rebuilt;
}

fn has_math_class(el: &Element) -> bool {
    el.classes()
        .any(|class| MATH_CLASSES.iter().any(|m| class.eq_ignore_ascii_case(m)))
}

/// Formula carried by a math element, with whether it must render as a block.
fn element_formula(el: &Element) -> Option<(String, bool)> {
    if el.is("math") {
        let formula = mathml_to_latex(el);
        if formula.is_empty() {
            return None;
        }
        let forced = el
            .attr("display")
            .is_some_and(|d| d.eq_ignore_ascii_case("block"));
        let is_block = forced || MathFormatter::is_block_formula(&formula);
        return Some((formula, is_block));
    }

    if !has_math_class(el) {
        return None;
    }

    let formula = el
        .attr("data-latex")
        .or_else(|| el.attr("data-tex"))
        .map(|tex| tex.trim().to_string())
        .filter(|tex| !tex.is_empty())
        .or_else(|| tex_annotation(el))
        .or_else(|| {
            el.find_first(&|child| child.is("math"))
                .map(mathml_to_latex)
                .filter(|tex| !tex.is_empty())
        })
        .unwrap_or_else(|| strip_delimiters(&el.text_content()));
    if formula.is_empty() {
        return None;
    }

    let display_class = el
        .classes()
        .any(|class| class.to_ascii_lowercase().contains("display"));
    let delimited_block = {
        let text = el.text_content();
        let text = text.trim();
        (text.starts_with("$$") && text.ends_with("$$") && text.len() >= 4)
            || (text.starts_with(r"\[") && text.ends_with(r"\]"))
    };
    let is_block = display_class || delimited_block || MathFormatter::is_block_formula(&formula);
    Some((formula, is_block))
}

/// Remove `$$`, `$`, `\[ \]` or `\( \)` wrapping from element text.
fn strip_delimiters(text: &str) -> String {
    let trimmed = text.trim();
    for (open, close) in [("$$", "$$"), (r"\[", r"\]"), (r"\(", r"\)"), ("$", "$")] {
        if trimmed.len() >= open.len() + close.len()
            && let Some(inner) = trimmed.strip_prefix(open).and_then(|t| t.strip_suffix(close))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Split a text node into text and placeholder nodes.
fn split_text(text: &str, table: &mut Vec<FormulaPlaceholder>) -> Vec<Node> {
    if !text.contains('$') {
        return vec![Node::Text(text.to_string())];
    }

    let mut nodes = Vec::new();
    let mut last = 0;
    for caps in DISPLAY_MATH_RE.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let formula = inner.as_str().trim();
        if formula.is_empty() {
            continue;
        }
        split_inline(&text[last..whole.start()], table, &mut nodes);
        // `$$` delimiters always mean display math.
        nodes.push(push_formula(table, formula.to_string(), true));
        last = whole.end();
    }
    split_inline(&text[last..], table, &mut nodes);
    nodes
}

fn split_inline(text: &str, table: &mut Vec<FormulaPlaceholder>, nodes: &mut Vec<Node>) {
    if text.is_empty() {
        return;
    }
    let mut last = 0;
    for caps in INLINE_MATH_RE.captures_iter(text) {
        let caps = match caps {
            Ok(caps) => caps,
            Err(e) => {
                tracing::warn!(error = %e, "Inline math scan aborted for text node");
                break;
            }
        };
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            nodes.push(Node::Text(text[last..whole.start()].to_string()));
        }
        let formula = inner.as_str().to_string();
        let is_block = MathFormatter::is_block_formula(&formula);
        nodes.push(push_formula(table, formula, is_block));
        last = whole.end();
    }
    if last < text.len() {
        nodes.push(Node::Text(text[last..].to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(text: &str) -> Element {
        Element::new("div").with_child(Node::Element(Element::new("p").with_text(text)))
    }

    #[test]
    fn test_token_segments_split_around_tokens() {
        let text = "a \u{E000}0\u{E001} b\u{E000}12\u{E001}";
        assert_eq!(
            token_segments(text),
            vec![
                TokenSegment::Text("a "),
                TokenSegment::Formula(0),
                TokenSegment::Text(" b"),
                TokenSegment::Formula(12),
            ]
        );
        assert_eq!(token_segments("plain"), vec![TokenSegment::Text("plain")]);
    }

    #[test]
    fn test_inline_formula_round_trips_verbatim() {
        let (tree, table) = MathFormatter::extract_with_replacement(&paragraph("Energy is $E=mc^2$ here."));
        assert_eq!(table.len(), 1);
        assert!(!table[0].is_block);
        let text = tree.text_content();
        assert!(!text.contains('$'));
        assert_eq!(MathFormatter::restore(&text, &table), "Energy is $E=mc^2$ here.");
    }

    #[test]
    fn test_display_dollars_are_block() {
        let (tree, table) = MathFormatter::extract_with_replacement(&paragraph("See $$a+b$$ now"));
        assert_eq!(table.len(), 1);
        assert!(table[0].is_block);
        let restored = MathFormatter::restore(&tree.text_content(), &table);
        assert_eq!(restored, "See \n\n$$\na+b\n$$\n\n now");
    }

    #[test]
    fn test_prices_are_not_formulas() {
        let (_, table) = MathFormatter::extract_with_replacement(&paragraph("It costs $5 or $10, not \\$x$."));
        assert!(table.is_empty());
    }

    #[test]
    fn test_code_is_not_scanned() {
        let root = Element::new("div").with_child(Node::Element(
            Element::new("pre").with_child(Node::Element(Element::new("code").with_text("echo $HOME$PATH"))),
        ));
        let (tree, table) = MathFormatter::extract_with_replacement(&root);
        assert!(table.is_empty());
        assert_eq!(tree, root);
    }

    #[test]
    fn test_math_class_with_data_latex() {
        let root = Element::new("p").with_child(Node::Element(
            Element::new("span")
                .with_attr("class", "katex-display")
                .with_attr("data-latex", r"\int_0^1 x\,dx")
                .with_text("rendered glyphs"),
        ));
        let (_, table) = MathFormatter::extract_with_replacement(&root);
        assert_eq!(table[0].formula, r"\int_0^1 x\,dx");
        assert!(table[0].is_block);
    }

    #[test]
    fn test_mathml_display_block() {
        let root = Element::new("p").with_child(Node::Element(
            Element::new("math")
                .with_attr("display", "block")
                .with_child(Node::Element(Element::new("mi").with_text("x"))),
        ));
        let (_, table) = MathFormatter::extract_with_replacement(&root);
        assert_eq!(table[0].formula, "x");
        assert!(table[0].is_block);
    }

    #[test]
    fn test_long_command_formula_is_block() {
        let formula = r"\sum_{i=1}^{n} \frac{1}{i^2} = \frac{\pi^2}{6} - \epsilon_n + \delta";
        assert!(MathFormatter::is_block_formula(formula));
        assert!(!MathFormatter::is_block_formula(r"\alpha"));
        assert!(!MathFormatter::is_block_formula(&"x".repeat(80)));
    }
}
