//! Lift a `scraper` parse into the owned tree.

use ego_tree::NodeRef;
use scraper::{Html, node::Node as ScraperNode};

use super::{Element, Node};

pub(super) fn parse_document(html: &str) -> Element {
    let parsed = Html::parse_document(html);
    lift_root(&parsed)
}

/// Fragments parse into an `html` element whose children are the fragment's
/// top-level nodes.
pub(super) fn parse_fragment(html: &str) -> Element {
    let parsed = Html::parse_fragment(html);
    lift_root(&parsed)
}

fn lift_root(parsed: &Html) -> Element {
    let root = parsed.root_element();
    let mut element = Element::new(root.value().name());
    element.attrs = root
        .value()
        .attrs()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
        .collect();
    element.children = root.children().filter_map(lift_node).collect();
    element
}

fn lift_node(node: NodeRef<'_, ScraperNode>) -> Option<Node> {
    match node.value() {
        ScraperNode::Text(text) => Some(Node::Text(text.text.to_string())),
        ScraperNode::Comment(comment) => Some(Node::Comment(comment.comment.to_string())),
        ScraperNode::Element(el) => {
            let mut element = Element::new(el.name());
            element.attrs = el
                .attrs()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                .collect();
            element.children = node.children().filter_map(lift_node).collect();
            Some(Node::Element(element))
        }
        // Doctype, processing instructions and nested document nodes carry no content.
        _ => None,
    }
}
