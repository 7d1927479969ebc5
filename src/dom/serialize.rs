//! Serialize the owned tree back to markup.
//!
//! Used by the `html` output format and by the `KeepHtml` custom rule action.

use html_escape::{encode_double_quoted_attribute, encode_text};

use super::{Element, Node};

/// Elements whose text is emitted verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[must_use]
pub fn node_to_html(node: &Node) -> String {
    let mut out = String::new();
    write_node(node, false, &mut out);
    out
}

#[must_use]
pub fn element_to_html(element: &Element) -> String {
    let mut out = String::new();
    write_element(element, &mut out);
    out
}

fn write_node(node: &Node, raw: bool, out: &mut String) {
    match node {
        Node::Text(text) if raw => out.push_str(text),
        Node::Text(text) => out.push_str(&encode_text(text)),
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        Node::Element(el) => write_element(el, out),
    }
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&encode_double_quoted_attribute(value));
        out.push('"');
    }
    out.push('>');

    if el.is_void() {
        return;
    }

    let raw = RAW_TEXT_ELEMENTS.contains(&el.tag.as_str());
    for child in &el.children {
        write_node(child, raw, out);
    }
    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_text_and_attributes() {
        let el = Element::new("a")
            .with_attr("title", "say \"hi\"")
            .with_text("1 < 2 & 3");
        assert_eq!(
            element_to_html(&el),
            "<a title=\"say &quot;hi&quot;\">1 &lt; 2 &amp; 3</a>"
        );
    }

    #[test]
    fn test_void_elements_have_no_closing_tag() {
        let el = Element::new("p").with_child(Node::Element(Element::new("br")));
        assert_eq!(element_to_html(&el), "<p><br></p>");
    }
}
