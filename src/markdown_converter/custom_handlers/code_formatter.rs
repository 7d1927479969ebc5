//! Code block language detection and annotation
//!
//! Every `<pre>` block gets a language before rendering: an explicit class or
//! data attribute hint wins, otherwise the signature catalogue in
//! [`super::language_patterns`] scores the code. Blocks nothing recognises are
//! `"text"`.

use serde::{Deserialize, Serialize};

use super::language_patterns::{COMPILED_LANGUAGES, is_known_language};
use crate::dom::{Element, Node};

/// Attribute the annotation pass stores the chosen language under
pub const LANGUAGE_ATTR: &str = "data-code-language";

/// Attribute marking that the language came from an explicit hint
pub const HINT_ATTR: &str = "data-code-hinted";

pub const PLAIN_TEXT: &str = "text";

/// Summary of one code block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlockDescriptor {
    pub language: String,
    pub code: String,
    pub line_count: usize,
    pub has_explicit_language_hint: bool,
}

/// Namespace for code block handling
pub struct CodeFormatter;

impl CodeFormatter {
    /// Infer the language of `code` from the signature catalogue.
    ///
    /// Highest cumulative hit count wins, ties go to the earlier catalogue
    /// entry, and `"text"` is returned when nothing scores.
    #[must_use]
    pub fn detect_language(code: &str) -> String {
        if code.trim().is_empty() {
            return PLAIN_TEXT.to_string();
        }

        let mut best: Option<(&'static str, usize)> = None;
        for signature in COMPILED_LANGUAGES.iter() {
            let hits = signature.hits(code);
            if hits > 0 && best.is_none_or(|(_, top)| hits > top) {
                best = Some((signature.name, hits));
            }
        }

        best.map_or_else(|| PLAIN_TEXT.to_string(), |(name, _)| name.to_string())
    }

    /// Language named by a class or data attribute hint on `el`.
    ///
    /// Supports `language-x`, `lang-x`, `highlight-x`, `brush:x`, a bare known
    /// language class, and `data-lang` / `data-language`.
    #[must_use]
    pub fn language_from_class(el: &Element) -> Option<String> {
        for attr in ["data-language", "data-lang"] {
            if let Some(lang) = el.attr(attr).map(str::trim).filter(|l| !l.is_empty()) {
                return Some(normalize_language(lang));
            }
        }

        for class in el.classes() {
            let lower = class.to_ascii_lowercase();
            let hinted = lower
                .strip_prefix("language-")
                .or_else(|| lower.strip_prefix("lang-"))
                .or_else(|| lower.strip_prefix("highlight-"))
                .or_else(|| lower.strip_prefix("brush:"));
            if let Some(lang) = hinted.filter(|l| !l.is_empty()) {
                return Some(normalize_language(lang));
            }
        }

        el.classes()
            .map(normalize_language)
            .find(|lang| is_known_language(lang))
    }

    /// Describe a `<pre>` (or bare `<code>`) block.
    #[must_use]
    pub fn describe(block: &Element) -> CodeBlockDescriptor {
        let code = code_text(block);
        let hint = Self::language_from_class(block).or_else(|| {
            block
                .child_elements()
                .find(|child| child.is("code"))
                .and_then(Self::language_from_class)
        });
        let has_explicit_language_hint = hint.is_some();
        let language = hint.unwrap_or_else(|| Self::detect_language(&code));
        let line_count = if code.is_empty() { 0 } else { code.lines().count() };

        CodeBlockDescriptor {
            language,
            code,
            line_count,
            has_explicit_language_hint,
        }
    }

    /// Store a language on every `<pre>` block in the tree.
    pub fn annotate_code_blocks(root: &mut Element) {
        if root.is("pre") {
            annotate(root);
            return;
        }
        for child in &mut root.children {
            if let Node::Element(child) = child {
                Self::annotate_code_blocks(child);
            }
        }
    }
}

fn annotate(pre: &mut Element) {
    let descriptor = CodeFormatter::describe(pre);
    tracing::debug!(
        language = %descriptor.language,
        lines = descriptor.line_count,
        hinted = descriptor.has_explicit_language_hint,
        "Annotated code block"
    );
    pre.set_attr(LANGUAGE_ATTR, descriptor.language);
    if descriptor.has_explicit_language_hint {
        pre.set_attr(HINT_ATTR, "true");
    }
}

fn normalize_language(lang: &str) -> String {
    let lower = lang.trim().to_ascii_lowercase();
    match lower.as_str() {
        "js" | "jsx" | "node" => "javascript".to_string(),
        "ts" | "tsx" => "typescript".to_string(),
        "py" | "python3" => "python".to_string(),
        "rs" => "rust".to_string(),
        "sh" | "shell" | "zsh" | "console" => "bash".to_string(),
        "c++" | "cxx" => "cpp".to_string(),
        "cs" | "c#" => "csharp".to_string(),
        "yml" => "yaml".to_string(),
        "golang" => "go".to_string(),
        "plaintext" | "plain" | "none" => PLAIN_TEXT.to_string(),
        _ => lower,
    }
}

/// Raw code text of a block, with `<br>` as a newline and one trailing newline dropped.
#[must_use]
pub fn code_text(block: &Element) -> String {
    let mut out = String::new();
    collect_code(block, &mut out);
    if out.ends_with('\n') {
        out.pop();
        if out.ends_with('\r') {
            out.pop();
        }
    }
    out
}

fn collect_code(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(child) if child.is("br") => out.push('\n'),
            Node::Element(child) => collect_code(child, out),
            Node::Comment(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pre_with_code(code_el: Element) -> Element {
        Element::new("pre").with_child(Node::Element(code_el))
    }

    #[test]
    fn test_detect_python() {
        assert_eq!(CodeFormatter::detect_language("def foo():\n    pass"), "python");
    }

    #[test]
    fn test_detect_empty_is_text() {
        assert_eq!(CodeFormatter::detect_language(""), "text");
        assert_eq!(CodeFormatter::detect_language("hello there"), "text");
    }

    #[test]
    fn test_detect_rust_and_javascript() {
        assert_eq!(
            CodeFormatter::detect_language("fn main() {\n    let mut v = Vec::new();\n    println!(\"{:?}\", v);\n}"),
            "rust"
        );
        assert_eq!(
            CodeFormatter::detect_language("const add = (a, b) => {\n  return a + b;\n};\nconsole.log(add(1, 2));"),
            "javascript"
        );
    }

    #[test]
    fn test_class_hint_wins_over_content() {
        let pre = pre_with_code(
            Element::new("code")
                .with_attr("class", "language-ruby")
                .with_text("def foo():\n    pass\n"),
        );
        let descriptor = CodeFormatter::describe(&pre);
        assert_eq!(descriptor.language, "ruby");
        assert!(descriptor.has_explicit_language_hint);
        assert_eq!(descriptor.line_count, 2);
        assert_eq!(descriptor.code, "def foo():\n    pass");
    }

    #[test]
    fn test_bare_known_class_and_aliases() {
        let el = Element::new("code").with_attr("class", "hljs js");
        assert_eq!(CodeFormatter::language_from_class(&el).as_deref(), Some("javascript"));
        let el = Element::new("pre").with_attr("data-lang", "YML");
        assert_eq!(CodeFormatter::language_from_class(&el).as_deref(), Some("yaml"));
        let el = Element::new("code").with_attr("class", "wide");
        assert_eq!(CodeFormatter::language_from_class(&el), None);
    }

    #[test]
    fn test_annotate_sets_language_on_every_pre() {
        let mut root = Element::new("div")
            .with_child(Node::Element(pre_with_code(Element::new("code").with_text("SELECT id FROM users WHERE id = 1"))))
            .with_child(Node::Element(Element::new("pre").with_text("just words")));
        CodeFormatter::annotate_code_blocks(&mut root);
        let langs: Vec<Option<&str>> = root
            .child_elements()
            .map(|pre| pre.attr(LANGUAGE_ATTR))
            .collect();
        assert_eq!(langs, vec![Some("sql"), Some("text")]);
    }

    #[test]
    fn test_code_text_converts_br() {
        let code = Element::new("code")
            .with_text("a")
            .with_child(Node::Element(Element::new("br")))
            .with_text("b");
        assert_eq!(code_text(&code), "a\nb");
    }
}
