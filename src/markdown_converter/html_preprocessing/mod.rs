//! Tree preprocessing run before Markdown rendering.

pub mod main_content_extraction;
pub mod noise_filter;

pub use main_content_extraction::{ContentExtractor, ScoredCandidate};
pub use noise_filter::NoiseFilter;

use crate::dom::{Element, Node};

/// Elements whose content never reaches the output
const NON_CONTENT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Drop scripts, styles, templates and comments from the tree.
pub fn strip_non_content(el: &mut Element) {
    el.children.retain(|child| match child {
        Node::Element(child) => !NON_CONTENT_ELEMENTS.contains(&child.tag.as_str()),
        Node::Comment(_) => false,
        Node::Text(_) => true,
    });
    for child in &mut el.children {
        if let Node::Element(child) = child {
            strip_non_content(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_non_content() {
        let mut root = Element::new("div")
            .with_child(Node::Element(Element::new("script").with_text("alert(1)")))
            .with_child(Node::Comment("c".into()))
            .with_child(Node::Element(
                Element::new("p")
                    .with_text("kept")
                    .with_child(Node::Element(Element::new("style").with_text("p{}"))),
            ));
        strip_non_content(&mut root);
        assert_eq!(root.text_content(), "kept");
        assert_eq!(root.children.len(), 1);
    }
}
