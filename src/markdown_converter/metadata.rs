//! Page metadata harvested from `<title>`, headings and `<meta>` tags.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dom::Element;

/// Title used when a document offers none
pub const UNTITLED: &str = "Untitled";

const AUTHOR_KEYS: &[&str] = &["author", "article:author", "og:author", "dc.creator", "twitter:creator"];
const DATE_KEYS: &[&str] = &[
    "article:published_time",
    "og:published_time",
    "date",
    "publishdate",
    "publisheddate",
    "dc.date",
    "dc.date.issued",
];
const TITLE_META_KEYS: &[&str] = &["og:title", "twitter:title"];

/// Metadata describing the page a conversion came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub language: Option<String>,
    pub canonical_url: Option<String>,
}

/// Title by precedence: `<title>`, first `<h1>`, `og:title`/`twitter:title`, then "Untitled".
#[must_use]
pub fn resolve_title(root: &Element) -> String {
    find_title(root, &meta_map(root)).unwrap_or_else(|| UNTITLED.to_string())
}

fn find_title(root: &Element, meta: &HashMap<String, String>) -> Option<String> {
    let text_of = |el: Option<&Element>| {
        el.map(|el| collapse(&el.text_content()))
            .filter(|text| !text.is_empty())
    };
    text_of(document_title(root))
        .or_else(|| text_of(root.find_first(&|el| el.is("h1"))))
        .or_else(|| first_meta(meta, TITLE_META_KEYS))
}

/// First `<title>` outside inline SVG and MathML, which use it for tooltips.
fn document_title(el: &Element) -> Option<&Element> {
    for child in el.child_elements() {
        if child.is("title") {
            return Some(child);
        }
        if child.is("svg") || child.is("math") {
            continue;
        }
        if let Some(title) = document_title(child) {
            return Some(title);
        }
    }
    None
}

/// Collect metadata from the whole document tree.
#[must_use]
pub fn extract_page_metadata(root: &Element) -> PageMetadata {
    let meta = meta_map(root);

    let mut tags: Vec<String> = Vec::new();
    let mut push_tag = |tag: &str| {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            tags.push(tag.to_string());
        }
    };
    if let Some(keywords) = meta.get("keywords") {
        keywords.split(',').for_each(&mut push_tag);
    }
    for el in root.find_all(&|el| el.is("meta")) {
        if meta_key(el).as_deref() == Some("article:tag")
            && let Some(content) = el.attr("content")
        {
            push_tag(content);
        }
    }

    let published_date = first_meta(&meta, DATE_KEYS).or_else(|| {
        root.find_first(&|el| el.is("time") && el.has_attr("datetime"))
            .and_then(|time| time.attr("datetime"))
            .map(|dt| dt.trim().to_string())
            .filter(|dt| !dt.is_empty())
    });

    let language = root
        .find_first(&|el| el.is("html"))
        .or(root.is("html").then_some(root))
        .and_then(|html| html.attr("lang"))
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty());

    let canonical_url = root
        .find_first(&|el| {
            el.is("link")
                && el
                    .attr("rel")
                    .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("canonical")))
        })
        .and_then(|link| link.attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty());

    PageMetadata {
        title: find_title(root, &meta),
        description: first_meta(&meta, &["description", "og:description"]),
        author: first_meta(&meta, AUTHOR_KEYS),
        published_date,
        tags,
        language,
        canonical_url,
    }
}

fn meta_key(el: &Element) -> Option<String> {
    el.attr("name")
        .or_else(|| el.attr("property"))
        .or_else(|| el.attr("itemprop"))
        .map(|key| key.trim().to_ascii_lowercase())
}

/// `<meta>` name/property → content. The first declaration of a key wins.
fn meta_map(root: &Element) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for el in root.find_all(&|el| el.is("meta")) {
        if let (Some(key), Some(content)) = (meta_key(el), el.attr("content")) {
            let content = collapse(content);
            if !content.is_empty() {
                map.entry(key).or_insert(content);
            }
        }
    }
    map
}

fn first_meta(meta: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| meta.get(*key).cloned())
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::SourceDocument;

    #[test]
    fn test_title_precedence() {
        let doc = SourceDocument::parse_html(
            "<html><head><title> Page  Title </title><meta property=\"og:title\" content=\"OG\"></head><body><h1>Heading</h1></body></html>",
            None,
        );
        assert_eq!(resolve_title(doc.root()), "Page Title");

        let doc = SourceDocument::parse_html(
            "<html><head><meta property=\"og:title\" content=\"OG\"></head><body><h1>Heading</h1></body></html>",
            None,
        );
        assert_eq!(resolve_title(doc.root()), "Heading");

        let doc = SourceDocument::parse_html(
            "<html><head><meta name=\"twitter:title\" content=\"Tweet\"></head><body><p>x</p></body></html>",
            None,
        );
        assert_eq!(resolve_title(doc.root()), "Tweet");

        let doc = SourceDocument::parse_html("<p>nothing</p>", None);
        assert_eq!(resolve_title(doc.root()), UNTITLED);
    }

    #[test]
    fn test_svg_title_is_not_the_page_title() {
        let doc = SourceDocument::parse_html(
            "<html><head></head><body><svg><title>Close icon</title></svg><h1>Heading</h1></body></html>",
            None,
        );
        assert_eq!(resolve_title(doc.root()), "Heading");

        let doc = SourceDocument::parse_html(
            "<html><head><title>Real</title></head><body><svg><title>Icon</title></svg></body></html>",
            None,
        );
        assert_eq!(resolve_title(doc.root()), "Real");
    }

    #[test]
    fn test_metadata_fields() {
        let doc = SourceDocument::parse_html(
            r#"<html lang="en"><head>
                <meta name="author" content="Ada Lovelace">
                <meta name="author" content="Second">
                <meta property="article:published_time" content="2024-03-01T10:00:00Z">
                <meta name="keywords" content="rust, parsing , Rust">
                <meta property="article:tag" content="markdown">
                <meta name="description" content="About things">
                <link rel="canonical" href="https://example.com/a">
            </head><body><p>x</p></body></html>"#,
            None,
        );
        let meta = extract_page_metadata(doc.root());
        assert_eq!(meta.author.as_deref(), Some("Ada Lovelace"));
        assert_eq!(meta.published_date.as_deref(), Some("2024-03-01T10:00:00Z"));
        assert_eq!(meta.tags, vec!["rust", "parsing", "markdown"]);
        assert_eq!(meta.description.as_deref(), Some("About things"));
        assert_eq!(meta.language.as_deref(), Some("en"));
        assert_eq!(meta.canonical_url.as_deref(), Some("https://example.com/a"));
    }

    #[test]
    fn test_time_element_fallback() {
        let doc = SourceDocument::parse_html(
            r#"<article><time datetime="2023-01-02">Jan 2</time></article>"#,
            None,
        );
        assert_eq!(extract_page_metadata(doc.root()).published_date.as_deref(), Some("2023-01-02"));
    }
}
