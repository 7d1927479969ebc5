//! Noise filtering for document trees.
//!
//! Removes nodes a reader never sees or that carry nothing:
//! - hidden nodes (`display:none`, `visibility:hidden`, `opacity:0`,
//!   `aria-hidden="true"`, the `hidden` attribute)
//! - empty nodes with no text, media, line break or form control inside
//! - duplicate and non-allow-listed attributes
//!
//! `sanitize` strips script handlers and executable URL schemes, and
//! `clean_urls` drops tracking parameters from anchor hrefs.
//!
//! All operations are pure: they take a tree by reference and return a new one.

use crate::dom::{Element, Node};

// ============================================================================
// Allow-lists
// ============================================================================

/// Attributes every element may keep
const GLOBAL_ATTRS: &[&str] = &["class", "id", "title", "role", "itemprop"];

/// Elements that count as content even without text
const MEDIA_ELEMENTS: &[&str] = &[
    "img", "picture", "video", "audio", "svg", "canvas", "iframe", "embed", "object", "math",
];

const FORM_CONTROLS: &[&str] = &["input", "select", "textarea", "button"];

/// Elements kept even when empty so table column positions survive
const EMPTY_EXEMPT: &[&str] = &["td", "th"];

/// Attributes that carry a navigable or fetchable URL
const URL_ATTRS: &[&str] = &["href", "src", "action", "formaction", "poster", "xlink:href"];

const EXECUTABLE_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:text/html"];

const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "yclid", "mc_cid", "mc_eid", "igshid", "_ga", "_gl",
    "ref_src",
];

fn tag_attrs(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href", "name", "target", "rel"],
        "img" => &["src", "alt", "width", "height", "srcset"],
        "source" => &["src", "srcset", "type", "media"],
        "video" | "audio" => &["src", "poster", "controls", "type"],
        "iframe" | "embed" => &["src", "width", "height"],
        "object" => &["data", "type"],
        "td" | "th" => &["colspan", "rowspan", "align", "scope", "style"],
        "table" => &["role", "summary"],
        "col" | "colgroup" => &["span", "align"],
        "ol" => &["start", "type", "reversed"],
        "li" => &["value"],
        "meta" => &["name", "content", "property"],
        "math" => &["display", "xmlns"],
        "annotation" => &["encoding"],
        "time" => &["datetime"],
        "blockquote" | "q" => &["cite"],
        "input" => &["type", "checked", "value", "disabled"],
        "details" => &["open"],
        _ => &[],
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Namespace for the noise filtering passes
pub struct NoiseFilter;

impl NoiseFilter {
    /// Remove hidden and empty nodes, then reduce attributes to the allow-list.
    ///
    /// Idempotent: running `clean` on its own output changes nothing.
    #[must_use]
    pub fn clean(root: &Element) -> Element {
        let mut out = root.clone();
        clean_in_place(&mut out);
        out
    }

    /// Remove `on*` handlers and URLs using executable schemes.
    #[must_use]
    pub fn sanitize(root: &Element) -> Element {
        let mut out = root.clone();
        sanitize_element(&mut out);
        out.for_each_element_mut(&mut sanitize_element);
        out
    }

    /// Strip tracking query parameters from anchor hrefs.
    #[must_use]
    pub fn clean_urls(root: &Element) -> Element {
        let mut out = root.clone();
        clean_anchor(&mut out);
        out.for_each_element_mut(&mut clean_anchor);
        out
    }

    /// `clean`, `sanitize` and `clean_urls` in sequence.
    #[must_use]
    pub fn filter(root: &Element) -> Element {
        let mut out = root.clone();
        clean_in_place(&mut out);
        sanitize_element(&mut out);
        out.for_each_element_mut(&mut sanitize_element);
        clean_anchor(&mut out);
        out.for_each_element_mut(&mut clean_anchor);
        out
    }
}

// ============================================================================
// clean
// ============================================================================

fn clean_in_place(el: &mut Element) {
    el.children.retain(|child| match child {
        Node::Element(child) => !is_hidden(child),
        _ => true,
    });

    for child in &mut el.children {
        if let Node::Element(child) = child {
            clean_in_place(child);
        }
    }

    el.children.retain(|child| match child {
        Node::Element(child) => has_content(child),
        _ => true,
    });

    dedupe_attrs(el);
    let allowed = tag_attrs(&el.tag);
    el.attrs.retain(|(name, _)| {
        GLOBAL_ATTRS.contains(&name.as_str())
            || name.starts_with("data-")
            || name.starts_with("aria-")
            || allowed.contains(&name.as_str())
    });
}

/// Hidden by inline style, `aria-hidden` or the `hidden` attribute.
fn is_hidden(el: &Element) -> bool {
    if el.has_attr("hidden") {
        return true;
    }
    if el
        .attr("aria-hidden")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    {
        return true;
    }
    el.attr("style").is_some_and(style_hides)
}

fn style_hides(style: &str) -> bool {
    style.split(';').any(|decl| {
        let Some((prop, value)) = decl.split_once(':') else {
            return false;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let value = value
            .trim()
            .trim_end_matches("!important")
            .trim()
            .to_ascii_lowercase();
        match prop.as_str() {
            "display" => value == "none",
            "visibility" => value == "hidden",
            "opacity" => value
                .trim_end_matches('%')
                .parse::<f64>()
                .is_ok_and(|opacity| opacity == 0.0),
            _ => false,
        }
    })
}

/// Whether a cleaned element carries anything worth keeping.
fn has_content(el: &Element) -> bool {
    let tag = el.tag.as_str();
    if el.is_void()
        || EMPTY_EXEMPT.contains(&tag)
        || MEDIA_ELEMENTS.contains(&tag)
        || FORM_CONTROLS.contains(&tag)
    {
        return true;
    }
    el.children.iter().any(|child| match child {
        Node::Text(text) => !text.trim().is_empty(),
        Node::Element(child) => has_content(child),
        Node::Comment(_) => false,
    })
}

/// First declaration of each attribute wins.
fn dedupe_attrs(el: &mut Element) {
    let mut seen: Vec<String> = Vec::with_capacity(el.attrs.len());
    el.attrs.retain(|(name, _)| {
        let key = name.to_ascii_lowercase();
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
}

// ============================================================================
// sanitize
// ============================================================================

fn sanitize_element(el: &mut Element) {
    el.attrs.retain(|(name, value)| {
        if name.len() > 2 && name.starts_with("on") {
            return false;
        }
        !(URL_ATTRS.contains(&name.as_str()) && is_executable_url(value))
    });
}

fn is_executable_url(value: &str) -> bool {
    // Browsers ignore embedded whitespace and control characters in schemes.
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take(32)
        .collect::<String>()
        .to_ascii_lowercase();
    EXECUTABLE_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
}

// ============================================================================
// clean_urls
// ============================================================================

fn clean_anchor(el: &mut Element) {
    if !el.is("a") {
        return;
    }
    if let Some(href) = el.attr("href") {
        let cleaned = strip_tracking_params(href);
        if cleaned != href {
            el.set_attr("href", cleaned);
        }
    }
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Remove tracking keys from the query string, keeping everything else verbatim.
///
/// Works on relative and absolute hrefs alike.
#[must_use]
pub fn strip_tracking_params(href: &str) -> String {
    let (before_fragment, fragment) = match href.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (href, None),
    };
    let Some((path, query)) = before_fragment.split_once('?') else {
        return href.to_string();
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(key, _)| key);
            !is_tracking_param(key)
        })
        .collect();

    let mut out = path.to_string();
    if !kept.is_empty() {
        out.push('?');
        out.push_str(&kept.join("&"));
    }
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}
