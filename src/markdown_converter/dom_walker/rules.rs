//! Walk rule dispatch
//!
//! Built-in rules are a closed enum chosen by tag name, with `Inline` as the
//! fallback for unknown elements. Caller supplied [`CustomRule`]s are compiled
//! once per conversion and consulted first, in order.

use regex::Regex;

use crate::config::{CustomRule, RuleAction};
use crate::dom::Element;

/// Built-in rendering rule for an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rule {
    Heading(usize),
    Paragraph,
    Block,
    Strong,
    Emphasis,
    Strikethrough,
    Highlight,
    Subscript,
    Superscript,
    InlineCode,
    CodeBlock,
    Link,
    Image,
    List { ordered: bool },
    ListItem,
    Blockquote,
    HorizontalRule,
    LineBreak,
    Table,
    DefinitionList,
    Details,
    Summary,
    Figure,
    Figcaption,
    Checkbox,
    Media,
    Skip,
    /// Unknown or purely presentational elements: render the children
    Inline,
}

pub(crate) fn rule_for(el: &Element) -> Rule {
    match el.tag.as_str() {
        "h1" => Rule::Heading(1),
        "h2" => Rule::Heading(2),
        "h3" => Rule::Heading(3),
        "h4" => Rule::Heading(4),
        "h5" => Rule::Heading(5),
        "h6" => Rule::Heading(6),
        "p" => Rule::Paragraph,
        "div" | "section" | "article" | "main" | "header" | "footer" | "aside" | "nav"
        | "body" | "html" | "address" | "center" | "fieldset" | "form" | "hgroup" | "dialog"
        | "search" | "caption" | "legend" | "dt" | "dd" | "tr" | "thead" | "tbody" | "tfoot"
        | "td" | "th" => Rule::Block,
        "strong" | "b" => Rule::Strong,
        "em" | "i" | "cite" | "dfn" | "var" => Rule::Emphasis,
        "del" | "s" | "strike" => Rule::Strikethrough,
        "mark" => Rule::Highlight,
        "sub" => Rule::Subscript,
        "sup" => Rule::Superscript,
        "code" | "kbd" | "samp" | "tt" => Rule::InlineCode,
        "pre" => Rule::CodeBlock,
        "a" => Rule::Link,
        "img" => Rule::Image,
        "ul" | "menu" => Rule::List { ordered: false },
        "ol" => Rule::List { ordered: true },
        "li" => Rule::ListItem,
        "blockquote" => Rule::Blockquote,
        "hr" => Rule::HorizontalRule,
        "br" => Rule::LineBreak,
        "table" => Rule::Table,
        "dl" => Rule::DefinitionList,
        "details" => Rule::Details,
        "summary" => Rule::Summary,
        "figure" => Rule::Figure,
        "figcaption" => Rule::Figcaption,
        "input" if el.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("checkbox")) => Rule::Checkbox,
        "video" | "audio" | "iframe" | "embed" => Rule::Media,
        "script" | "style" | "noscript" | "template" | "head" | "title" | "meta" | "link"
        | "base" | "input" | "select" | "option" | "textarea" | "button" | "svg" | "canvas"
        | "object" | "source" | "track" | "wbr" | "colgroup" | "col" | "area" | "map" => {
            Rule::Skip
        }
        _ => Rule::Inline,
    }
}

/// A custom rule whose pattern compiled
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pattern: Regex,
    pub(crate) action: RuleAction,
}

/// Compile custom rules in order. Invalid patterns are logged and skipped.
pub(crate) fn compile_rules(rules: &[CustomRule]) -> Vec<CompiledRule> {
    rules
        .iter()
        .filter_map(|rule| match Regex::new(&rule.pattern) {
            Ok(pattern) => Some(CompiledRule {
                pattern,
                action: rule.action.clone(),
            }),
            Err(e) => {
                tracing::warn!(pattern = %rule.pattern, error = %e, "Skipping custom rule with invalid pattern");
                None
            }
        })
        .collect()
}

/// First custom rule matching the element signature
pub(crate) fn match_custom<'r>(rules: &'r [CompiledRule], el: &Element) -> Option<&'r CompiledRule> {
    if rules.is_empty() {
        return None;
    }
    let signature = el.signature();
    rules.iter().find(|rule| rule.pattern.is_match(&signature))
}
