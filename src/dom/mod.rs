//! Owned document tree used by every pipeline stage.
//!
//! `scraper` gives us a read-only arena tree. The conversion stages need to
//! cut, rewrite and re-attach nodes on private copies, so markup is parsed once
//! with `scraper` and lifted into this small owned model (see [`parse`]).

mod parse;
mod serialize;

use url::Url;

pub use serialize::{element_to_html, node_to_html};

/// Elements that never have children and are kept even when textless.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Block-level containers. Used by the extractor fallback and the walker.
pub const BLOCK_CONTAINERS: &[&str] = &[
    "article", "aside", "blockquote", "body", "dd", "details", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "header", "li", "main", "nav", "ol", "p", "pre",
    "section", "table", "ul",
];

/// A node of the owned document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

impl Node {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(el) => Some(el),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Concatenated text of this node and its descendants.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Self::Text(text) => out.push_str(text),
            Self::Element(el) => {
                for child in &el.children {
                    child.collect_text(out);
                }
            }
            Self::Comment(_) => {}
        }
    }
}

/// An element with a lowercase tag name, ordered attributes and children.
///
/// Attributes are a list rather than a map so duplicate declarations coming
/// from hand-built trees survive until the noise filter resolves them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(Node::Text(text.into()))
    }

    /// First value declared for `name`.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Replace every declaration of `name` with a single one.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter().position(|(key, _)| key.eq_ignore_ascii_case(name)) {
            Some(idx) => {
                self.attrs[idx].1 = value;
                let mut seen = false;
                self.attrs.retain(|(key, _)| {
                    if key.eq_ignore_ascii_case(name) {
                        let keep = !seen;
                        seen = true;
                        keep
                    } else {
                        true
                    }
                });
            }
            None => self.attrs.push((name.to_ascii_lowercase(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c.eq_ignore_ascii_case(class))
    }

    #[must_use]
    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.tag.as_str())
    }

    /// `tag#id.class1.class2`, the string custom rule patterns match against.
    #[must_use]
    pub fn signature(&self) -> String {
        let mut sig = self.tag.clone();
        if let Some(id) = self.attr("id").filter(|id| !id.is_empty()) {
            sig.push('#');
            sig.push_str(id);
        }
        for class in self.classes() {
            sig.push('.');
            sig.push_str(class);
        }
        sig
    }

    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Descendant elements in document order (self excluded) matching `pred`.
    pub fn find_all<'a>(&'a self, pred: &dyn Fn(&Element) -> bool) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect_matching(pred, &mut found);
        found
    }

    fn collect_matching<'a>(&'a self, pred: &dyn Fn(&Element) -> bool, found: &mut Vec<&'a Element>) {
        for child in self.child_elements() {
            if pred(child) {
                found.push(child);
            }
            child.collect_matching(pred, found);
        }
    }

    /// First descendant (self excluded) matching `pred`, depth first.
    #[must_use]
    pub fn find_first(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        for child in self.child_elements() {
            if pred(child) {
                return Some(child);
            }
            if let Some(hit) = child.find_first(pred) {
                return Some(hit);
            }
        }
        None
    }

    /// Apply `f` to every descendant element, parents before children.
    pub fn for_each_element_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        for child in &mut self.children {
            if let Node::Element(el) = child {
                f(el);
                el.for_each_element_mut(f);
            }
        }
    }

    /// Count of descendant elements whose tag is in `tags`.
    #[must_use]
    pub fn count_tags(&self, tags: &[&str]) -> usize {
        self.child_elements()
            .map(|el| usize::from(tags.contains(&el.tag.as_str())) + el.count_tags(tags))
            .sum()
    }
}

/// A parsed document handed to the pipeline, plus the URL it came from.
///
/// Pipeline stages never mutate a `SourceDocument`; they clone the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    root: Element,
    base_url: Option<Url>,
}

impl SourceDocument {
    #[must_use]
    pub fn new(root: Element, base_url: Option<Url>) -> Self {
        Self { root, base_url }
    }

    /// Parse a full HTML document.
    #[must_use]
    pub fn parse_html(html: &str, base_url: Option<Url>) -> Self {
        Self::new(parse::parse_document(html), base_url)
    }

    /// Parse a markup fragment such as a user selection.
    #[must_use]
    pub fn parse_fragment(html: &str, base_url: Option<Url>) -> Self {
        Self::new(parse::parse_fragment(html), base_url)
    }

    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    #[must_use]
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// The `<body>` element, or the root when the tree has none.
    #[must_use]
    pub fn body(&self) -> &Element {
        if self.root.is("body") {
            return &self.root;
        }
        self.root.find_first(&|el| el.is("body")).unwrap_or(&self.root)
    }
}
