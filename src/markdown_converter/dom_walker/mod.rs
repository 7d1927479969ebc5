//! Tree walk that renders a cleaned subtree as Markdown or plain text.
//!
//! Output is built into a single buffer. Block rules make sure the buffer ends
//! with a blank line before they write and leave one after, inline rules
//! append directly. Text nodes are whitespace-collapsed and escaped based on
//! whether they start a line.

mod rules;

use url::Url;

use super::custom_handlers::code_formatter::{LANGUAGE_ATTR, code_text};
use super::custom_handlers::math_formatter::{TokenSegment, token_segments};
use super::custom_handlers::{FormulaPlaceholder, TableFormatter};
use crate::config::{ConversionOptions, OutputFormat, RuleAction};
use crate::dom::{BLOCK_CONTAINERS, Element, Node, element_to_html};
use rules::{CompiledRule, Rule, compile_rules, match_custom, rule_for};

/// Subtrees nested deeper than this are dropped.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Marks a hard line break until the final pass decides how to spell it.
const HARD_BREAK: char = '\u{E002}';

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    depth: usize,
    in_cell: bool,
    in_heading: bool,
    /// Output must stay on one line: table cells, headings, link text,
    /// summaries, captions and terms.
    one_line: bool,
}

impl Context {
    fn on_one_line(self) -> Self {
        Self {
            one_line: true,
            ..self
        }
    }
}

/// Renders elements according to one set of [`ConversionOptions`].
pub struct DomWalker<'a> {
    options: &'a ConversionOptions,
    base_url: Option<&'a Url>,
    rules: Vec<CompiledRule>,
    plain: bool,
    formulas: &'a [FormulaPlaceholder],
}

impl<'a> DomWalker<'a> {
    #[must_use]
    pub fn new(options: &'a ConversionOptions, base_url: Option<&'a Url>) -> Self {
        Self {
            options,
            base_url,
            rules: compile_rules(&options.custom_rules),
            plain: options.format == OutputFormat::Text,
            formulas: &[],
        }
    }

    /// Render formula placeholder tokens found in text nodes from `formulas`.
    ///
    /// Block formulas become `$$` blocks where a block fits and `$f$` inside
    /// one-line constructs.
    #[must_use]
    pub fn with_formulas(mut self, formulas: &'a [FormulaPlaceholder]) -> Self {
        self.formulas = formulas;
        self
    }

    /// Render `root` and everything below it. The result is not yet normalized.
    #[must_use]
    pub fn render(&self, root: &Element) -> String {
        let mut out = String::new();
        self.element(root, &mut out, Context::default());
        let hard_break = if self.plain { "" } else { "\\" };
        out.replace(HARD_BREAK, hard_break)
    }

    fn formatting(&self) -> bool {
        !self.plain && self.options.preserve_formatting
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    fn children(&self, el: &Element, ctx: Context) -> String {
        let mut out = String::new();
        self.children_into(el, &mut out, ctx);
        out
    }

    fn children_into(&self, el: &Element, out: &mut String, ctx: Context) {
        for child in &el.children {
            match child {
                Node::Element(child) => self.element(child, out, ctx),
                Node::Text(text) => self.text(text, out, ctx),
                Node::Comment(_) => {}
            }
        }
    }

    fn element(&self, el: &Element, out: &mut String, ctx: Context) {
        if ctx.depth >= MAX_NESTING_DEPTH {
            tracing::warn!(tag = %el.tag, depth = ctx.depth, "Nesting limit reached, dropping subtree");
            return;
        }
        let ctx = Context {
            depth: ctx.depth + 1,
            ..ctx
        };

        if let Some(rule) = match_custom(&self.rules, el) {
            self.custom(el, &rule.action, out, ctx);
            return;
        }

        match rule_for(el) {
            Rule::Heading(level) => self.heading(el, level, out, ctx),
            Rule::Paragraph | Rule::Block => {
                let content = trim_block(&self.children(el, ctx));
                push_block(out, &content);
            }
            Rule::Strong => {
                let content = self.children(el, ctx);
                push_inline(out, &self.marked(&content, "**", "**"));
            }
            Rule::Emphasis => {
                let content = self.children(el, ctx);
                push_inline(out, &self.marked(&content, "*", "*"));
            }
            Rule::Strikethrough => {
                let content = self.children(el, ctx);
                push_inline(out, &self.marked(&content, "~~", "~~"));
            }
            Rule::Highlight => {
                let content = self.children(el, ctx);
                push_inline(out, &self.marked(&content, "==", "=="));
            }
            Rule::Subscript => {
                let content = self.children(el, ctx);
                push_inline(out, &self.script(&content, "~"));
            }
            Rule::Superscript => {
                let content = self.children(el, ctx);
                push_inline(out, &self.script(&content, "^"));
            }
            Rule::InlineCode => self.inline_code(el, out),
            Rule::CodeBlock => self.code_block(el, out),
            Rule::Link => self.link(el, out, ctx),
            Rule::Image => self.image(el, out),
            Rule::List { ordered } => self.list(el, ordered, out, ctx),
            Rule::ListItem => {
                // An <li> outside any list
                if let Some(item) = self.list_item(el, "- ", ctx) {
                    push_block(out, &item);
                }
            }
            Rule::Blockquote => self.blockquote(el, out, ctx),
            Rule::HorizontalRule => {
                if !self.plain {
                    push_block(out, "---");
                }
            }
            Rule::LineBreak => self.line_break(out, ctx),
            Rule::Table => self.table(el, out, ctx),
            Rule::DefinitionList => self.definition_list(el, out, ctx),
            Rule::Details => self.details(el, out, ctx),
            Rule::Summary => {
                let summary = single_line(&self.children(el, ctx.on_one_line()));
                push_block(out, &self.strong(&summary));
            }
            Rule::Figure => {
                let content = trim_block(&self.children(el, ctx));
                push_block(out, &content);
            }
            Rule::Figcaption => {
                let caption = single_line(&self.children(el, ctx.on_one_line()));
                push_block(out, &self.emphasis(&caption));
            }
            Rule::Checkbox => {
                let mark = if el.has_attr("checked") { "[x] " } else { "[ ] " };
                push_inline(out, mark);
            }
            Rule::Media => self.media(el, out),
            Rule::Skip => {}
            Rule::Inline => self.children_into(el, out, ctx),
        }
    }

    fn text(&self, text: &str, out: &mut String, ctx: Context) {
        let collapsed = collapse_whitespace(text);
        if self.formulas.is_empty() {
            self.literal_text(&collapsed, out);
            return;
        }
        for segment in token_segments(&collapsed) {
            match segment {
                TokenSegment::Text(text) => self.literal_text(text, out),
                TokenSegment::Formula(index) => self.formula(index, out, ctx),
            }
        }
    }

    fn literal_text(&self, collapsed: &str, out: &mut String) {
        if collapsed.is_empty() {
            return;
        }
        let collapsed = if collapsed.starts_with(' ') && at_word_boundary(out) {
            &collapsed[1..]
        } else {
            collapsed
        };
        if collapsed.is_empty() {
            return;
        }
        if self.plain {
            out.push_str(collapsed);
        } else {
            let line_start = out.is_empty() || out.ends_with('\n');
            out.push_str(&escape_text(collapsed, line_start));
        }
    }

    fn formula(&self, index: usize, out: &mut String, ctx: Context) {
        let Some(placeholder) = self.formulas.iter().find(|p| p.index == index) else {
            return;
        };
        let formula = placeholder.formula.trim();
        if placeholder.is_block && !ctx.one_line {
            push_block(out, &format!("$$\n{formula}\n$$"));
        } else {
            // Newlines would end the enclosing line
            push_inline(out, &format!("${}$", formula.replace(['\r', '\n'], " ")));
        }
    }

    // ========================================================================
    // Custom rules
    // ========================================================================

    fn custom(&self, el: &Element, action: &RuleAction, out: &mut String, ctx: Context) {
        let is_block = BLOCK_CONTAINERS.contains(&el.tag.as_str())
            || matches!(rule_for(el), Rule::Heading(_) | Rule::Table);
        let place = |out: &mut String, rendered: &str| {
            if is_block {
                push_block(out, rendered.trim());
            } else {
                push_inline(out, rendered);
            }
        };

        match action {
            RuleAction::Remove => {}
            RuleAction::Unwrap => self.children_into(el, out, ctx),
            RuleAction::KeepHtml => place(out, &element_to_html(el)),
            RuleAction::Wrap { prefix, suffix } => {
                let content = self.children(el, ctx);
                place(out, &format!("{prefix}{}{suffix}", content.trim()));
            }
            RuleAction::Replace { template } => {
                let content = self.children(el, ctx);
                let rendered = template
                    .replace("{content}", content.trim())
                    .replace("{text}", el.text_content().trim());
                place(out, &rendered);
            }
        }
    }

    // ========================================================================
    // Inline rules
    // ========================================================================

    fn marked(&self, content: &str, open: &str, close: &str) -> String {
        if self.formatting() {
            flanked(content, |inner| format!("{open}{inner}{close}"))
        } else {
            content.to_string()
        }
    }

    /// Sub/superscript markers survive `preserve_formatting = false`.
    fn script(&self, content: &str, marker: &str) -> String {
        if self.plain {
            content.to_string()
        } else {
            flanked(content, |inner| format!("{marker}{inner}{marker}"))
        }
    }

    fn strong(&self, text: &str) -> String {
        if self.formatting() && !text.is_empty() {
            format!("**{text}**")
        } else {
            text.to_string()
        }
    }

    fn emphasis(&self, text: &str) -> String {
        if self.formatting() && !text.is_empty() {
            format!("*{text}*")
        } else {
            text.to_string()
        }
    }

    fn inline_code(&self, el: &Element, out: &mut String) {
        let code = code_text(el).replace(['\n', '\r'], " ");
        if code.trim().is_empty() {
            return;
        }
        if self.plain {
            push_inline(out, &code);
            return;
        }
        let ticks = "`".repeat(longest_run(&code, '`') + 1);
        let pad = if code.starts_with('`') || code.ends_with('`') { " " } else { "" };
        push_inline(out, &format!("{ticks}{pad}{code}{pad}{ticks}"));
    }

    fn link(&self, el: &Element, out: &mut String, ctx: Context) {
        let content = self.children(el, ctx.on_one_line());
        let href = el.attr("href").map(str::trim).filter(|href| !href.is_empty());
        let Some(href) = href.filter(|_| !self.plain) else {
            push_inline(out, &content);
            return;
        };
        let text = single_line(&content);
        if text.is_empty() {
            return;
        }
        let destination = destination(&self.resolve_href(href));
        let title = title_suffix(el.attr("title"));
        push_inline(out, &flanked(&content, |_| format!("[{text}]({destination}{title})")));
    }

    fn resolve_href(&self, href: &str) -> String {
        if href.starts_with('#') || Url::parse(href).is_ok() {
            return href.to_string();
        }
        match self.base_url.map(|base| base.join(href)) {
            Some(Ok(resolved)) => resolved.to_string(),
            _ => href.to_string(),
        }
    }

    fn image(&self, el: &Element, out: &mut String) {
        let Some(src) = el.attr("src").map(str::trim).filter(|src| !src.is_empty()) else {
            return;
        };
        let alt = collapse_whitespace(el.attr("alt").unwrap_or_default());
        let alt = alt.trim();
        if self.plain {
            push_inline(out, alt);
            return;
        }
        let mut escaped_alt = String::with_capacity(alt.len());
        for ch in alt.chars() {
            if matches!(ch, '\\' | '[' | ']') {
                escaped_alt.push('\\');
            }
            escaped_alt.push(ch);
        }
        let title = title_suffix(el.attr("title"));
        push_inline(out, &format!("![{escaped_alt}]({}{title})", destination(src)));
    }

    fn media(&self, el: &Element, out: &mut String) {
        if self.plain {
            return;
        }
        let src = el.attr("src").map(str::to_string).or_else(|| {
            el.child_elements()
                .filter(|child| child.is("source"))
                .find_map(|source| source.attr("src").map(str::to_string))
        });
        let Some(src) = src.filter(|src| !src.trim().is_empty()) else {
            return;
        };
        let label = el
            .attr("title")
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(el.tag.as_str());
        push_inline(out, &format!("[{label}]({})", destination(&self.resolve_href(src.trim()))));
    }

    fn line_break(&self, out: &mut String, ctx: Context) {
        if ctx.in_cell || ctx.in_heading {
            push_inline(out, " ");
            return;
        }
        if out.is_empty() || out.ends_with('\n') {
            return;
        }
        trim_trailing_spaces(out);
        if !self.plain {
            out.push(HARD_BREAK);
        }
        out.push('\n');
    }

    // ========================================================================
    // Block rules
    // ========================================================================

    fn heading(&self, el: &Element, level: usize, out: &mut String, ctx: Context) {
        let ctx = Context {
            in_heading: true,
            one_line: true,
            ..ctx
        };
        let content = single_line(&self.children(el, ctx));
        if content.is_empty() {
            return;
        }
        if self.plain || ctx.in_cell {
            push_block(out, &content);
        } else {
            push_block(out, &format!("{} {content}", "#".repeat(level)));
        }
    }

    fn code_block(&self, el: &Element, out: &mut String) {
        let code = code_text(el);
        if code.trim().is_empty() {
            return;
        }
        if self.plain {
            push_block(out, code.trim_end());
            return;
        }
        let language = if self.options.enable_code_highlight {
            el.attr(LANGUAGE_ATTR).unwrap_or_default()
        } else {
            ""
        };
        let fence = "`".repeat(longest_run(&code, '`').max(2) + 1);
        push_block(out, &format!("{fence}{language}\n{code}\n{fence}"));
    }

    fn list(&self, el: &Element, ordered: bool, out: &mut String, ctx: Context) {
        let mut number: i64 = if ordered {
            el.attr("start")
                .and_then(|start| start.trim().parse().ok())
                .unwrap_or(1)
        } else {
            1
        };
        let mut items: Vec<String> = Vec::new();
        for child in &el.children {
            let Node::Element(child) = child else {
                continue;
            };
            if child.is("li") {
                if ordered && let Some(value) = child.attr("value").and_then(|v| v.trim().parse().ok()) {
                    number = value;
                }
                let marker = if ordered {
                    format!("{number}. ")
                } else {
                    "- ".to_string()
                };
                number = number.saturating_add(1);
                if let Some(item) = self.list_item(child, &marker, ctx) {
                    items.push(item);
                }
                continue;
            }
            // Lists nested directly in a list belong to the previous item.
            let rendered = trim_block(&self.render_element(child, ctx));
            if rendered.is_empty() {
                continue;
            }
            match items.last_mut() {
                Some(last) => {
                    last.push('\n');
                    last.push_str(&indent(&rendered, 2));
                }
                None => items.push(rendered),
            }
        }
        push_block(out, &items.join("\n"));
    }

    fn render_element(&self, el: &Element, ctx: Context) -> String {
        let mut out = String::new();
        self.element(el, &mut out, ctx);
        out
    }

    fn list_item(&self, item: &Element, marker: &str, ctx: Context) -> Option<String> {
        let mut content = trim_block(&self.children(item, ctx));
        let loose = item
            .find_first(&|el| matches!(el.tag.as_str(), "p" | "pre" | "blockquote" | "table"))
            .is_some();
        if !loose {
            while content.contains("\n\n") {
                content = content.replace("\n\n", "\n");
            }
        }
        if content.is_empty() {
            return Some(marker.trim_end().to_string());
        }
        let body = indent(&content, marker.chars().count());
        Some(format!("{marker}{}", body.trim_start()))
    }

    fn blockquote(&self, el: &Element, out: &mut String, ctx: Context) {
        let content = trim_block(&self.children(el, ctx));
        if content.is_empty() {
            return;
        }
        if self.plain {
            push_block(out, &content);
            return;
        }
        let quoted = content
            .lines()
            .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {line}") })
            .collect::<Vec<_>>()
            .join("\n");
        push_block(out, &quoted);
    }

    fn table(&self, el: &Element, out: &mut String, ctx: Context) {
        let cell_ctx = Context {
            in_cell: true,
            one_line: true,
            ..ctx
        };
        let render_cell = |cell: &Element| single_line(&self.children(cell, cell_ctx));
        let model = TableFormatter::parse_with(el, &render_cell);
        if model.is_empty() {
            return;
        }
        if let Some(caption) = &model.caption {
            push_block(out, caption);
        }
        if self.plain {
            push_block(out, &TableFormatter::render_plain(&model));
        } else {
            push_block(out, &TableFormatter::render(&model));
        }
    }

    fn definition_list(&self, el: &Element, out: &mut String, ctx: Context) {
        let mut lines = Vec::new();
        let mut entries: Vec<&Element> = Vec::new();
        for child in el.child_elements() {
            // <div> groups are allowed around dt/dd pairs
            if child.is("div") {
                entries.extend(child.child_elements());
            } else {
                entries.push(child);
            }
        }
        for entry in entries {
            if entry.is("dt") {
                let term = single_line(&self.children(entry, ctx.on_one_line()));
                if !term.is_empty() {
                    lines.push(term);
                }
            } else if entry.is("dd") {
                let definition = trim_block(&self.children(entry, ctx));
                if !definition.is_empty() {
                    let body = indent(&definition, 2);
                    lines.push(format!(": {}", body.trim_start()));
                }
            }
        }
        push_block(out, &lines.join("\n"));
    }

    fn details(&self, el: &Element, out: &mut String, ctx: Context) {
        let mut body = String::new();
        let mut summary = String::new();
        for child in &el.children {
            match child {
                Node::Element(child) if child.is("summary") && summary.is_empty() => {
                    summary = single_line(&self.children(child, ctx.on_one_line()));
                }
                Node::Element(child) => self.element(child, &mut body, ctx),
                Node::Text(text) => self.text(text, &mut body, ctx),
                Node::Comment(_) => {}
            }
        }
        push_block(out, &self.strong(&summary));
        push_block(out, &trim_block(&body));
    }
}

// ============================================================================
// Buffer helpers
// ============================================================================

fn at_word_boundary(out: &str) -> bool {
    out.ends_with([' ', '\n', HARD_BREAK])
}

fn trim_trailing_spaces(out: &mut String) {
    let keep = out.trim_end_matches([' ', '\t']).len();
    out.truncate(keep);
}

/// Start a new block: trailing spaces dropped, then a blank line.
fn ensure_blank_line(out: &mut String) {
    trim_trailing_spaces(out);
    if out.is_empty() {
        return;
    }
    while !out.ends_with("\n\n") {
        out.push('\n');
    }
}

fn push_block(out: &mut String, block: &str) {
    if block.is_empty() {
        return;
    }
    ensure_blank_line(out);
    out.push_str(block);
    out.push_str("\n\n");
}

fn push_inline(out: &mut String, inline: &str) {
    if inline.starts_with(' ') && at_word_boundary(out) {
        out.push_str(inline.trim_start_matches(' '));
    } else {
        out.push_str(inline);
    }
}

/// Apply `wrap` to the trimmed content, keeping outer whitespace outside it.
fn flanked(content: &str, wrap: impl FnOnce(&str) -> String) -> String {
    let inner = content.trim();
    if inner.is_empty() {
        return content.to_string();
    }
    let lead = &content[..content.len() - content.trim_start().len()];
    let trail = &content[content.trim_end().len()..];
    format!("{lead}{}{trail}", wrap(inner))
}

fn trim_block(text: &str) -> String {
    let mut trimmed = text.trim();
    while let Some(rest) = trimmed.strip_suffix(HARD_BREAK) {
        trimmed = rest.trim_end();
    }
    trimmed.to_string()
}

fn single_line(text: &str) -> String {
    text.replace(HARD_BREAK, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| if line.is_empty() { String::new() } else { format!("{pad}{line}") })
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

fn longest_run(text: &str, target: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in text.chars() {
        if ch == target {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn destination(url: &str) -> String {
    if url.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') {
        format!("<{url}>")
    } else {
        url.to_string()
    }
}

fn title_suffix(title: Option<&str>) -> String {
    match title.map(str::trim).filter(|title| !title.is_empty()) {
        Some(title) => format!(" \"{}\"", title.replace('"', "\\\"")),
        None => String::new(),
    }
}

// ============================================================================
// Escaping
// ============================================================================

fn escape_text(text: &str, line_start: bool) -> String {
    let mut escaped = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        if matches!(ch, '\\' | '*' | '_' | '`' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    if line_start {
        escape_line_start(escaped)
    } else {
        escaped
    }
}

/// Escape a leading character that would otherwise open a block construct.
fn escape_line_start(text: String) -> String {
    let pad = text.len() - text.trim_start_matches(' ').len();
    let (lead, body) = text.split_at(pad);
    let bytes = body.as_bytes();
    let escape_at = match bytes.first() {
        Some(b'#' | b'>') => Some(0),
        Some(b'-' | b'+') if bytes.get(1).is_none_or(|b| *b == b' ') => Some(0),
        Some(b) if b.is_ascii_digit() => {
            let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
            let rest = &bytes[digits..];
            let is_marker = matches!(rest.first(), Some(b'.' | b')'))
                && rest.get(1).is_none_or(|b| *b == b' ');
            is_marker.then_some(digits)
        }
        _ => None,
    };
    match escape_at {
        Some(at) => format!("{lead}{}\\{}", &body[..at], &body[at..]),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustomRule;
    use crate::dom::SourceDocument;

    fn render_with(markup: &str, options: &ConversionOptions, base: Option<&Url>) -> String {
        let doc = SourceDocument::parse_fragment(markup, None);
        DomWalker::new(options, base).render(doc.root()).trim().to_string()
    }

    fn md(markup: &str) -> String {
        render_with(markup, &ConversionOptions::default(), None)
    }

    #[test]
    fn test_heading_and_strong() {
        assert_eq!(
            md("<h1>Title</h1><p>Hello <strong>world</strong></p>"),
            "# Title\n\nHello **world**"
        );
    }

    #[test]
    fn test_emphasis_whitespace_moves_outside_markers() {
        assert_eq!(md("<p>a<em> b </em>c</p>"), "a *b* c");
        assert_eq!(md("<p>x<b>  </b>y</p>"), "x y");
    }

    #[test]
    fn test_image_without_download() {
        assert_eq!(md(r#"<img src="a.jpg" alt="Cat">"#), "![Cat](a.jpg)");
        assert_eq!(
            md(r#"<img src="a b.png" alt="x" title="T">"#),
            "![x](<a b.png> \"T\")"
        );
    }

    #[test]
    fn test_links_resolve_against_base() {
        let base = Url::parse("https://example.com/docs/page").expect("valid url");
        let out = render_with(
            r##"<p><a href="../guide" title="Guide">the guide</a> and <a href="#top">top</a></p>"##,
            &ConversionOptions::default(),
            Some(&base),
        );
        assert_eq!(out, "[the guide](https://example.com/guide \"Guide\") and [top](#top)");
    }

    #[test]
    fn test_nested_and_ordered_lists() {
        assert_eq!(
            md("<ul><li>a<ul><li>b</li></ul></li><li>c</li></ul>"),
            "- a\n  - b\n- c"
        );
        assert_eq!(md(r#"<ol start="3"><li>x</li><li>y</li></ol>"#), "3. x\n4. y");
    }

    #[test]
    fn test_ordered_list_numbering_saturates() {
        assert_eq!(
            md(r#"<ol start="9223372036854775807"><li>x</li><li>y</li></ol>"#),
            "9223372036854775807. x\n9223372036854775807. y"
        );
        assert_eq!(md(r#"<ol start="-2"><li>x</li><li value="7">y</li><li>z</li></ol>"#), "-2. x\n7. y\n8. z");
    }

    #[test]
    fn test_task_list_items() {
        assert_eq!(
            md(r#"<ul><li><input type="checkbox" checked> done</li><li><input type="checkbox"> todo</li></ul>"#),
            "- [x] done\n- [ ] todo"
        );
    }

    #[test]
    fn test_blockquote() {
        assert_eq!(md("<blockquote><p>one</p><p>two</p></blockquote>"), "> one\n>\n> two");
    }

    #[test]
    fn test_fenced_code_uses_language_attr() {
        let markup = r#"<pre data-code-language="rust"><code>fn main() {}</code></pre>"#;
        assert_eq!(md(markup), "```rust\nfn main() {}\n```");
        let plain_fence = render_with(markup, &ConversionOptions::default().with_code_highlight(false), None);
        assert_eq!(plain_fence, "```\nfn main() {}\n```");
    }

    #[test]
    fn test_inline_code_and_kbd() {
        assert_eq!(md("<p>Run <code>a_b*</code> or <kbd>Ctrl</kbd></p>"), "Run `a_b*` or `Ctrl`");
        assert_eq!(md("<p><code>x`y</code></p>"), "``x`y``");
    }

    #[test]
    fn test_text_escaping() {
        assert_eq!(md("<p>a*b*c [x] snake_case</p>"), r"a\*b\*c \[x\] snake\_case");
        assert_eq!(md("<p># not heading</p>"), r"\# not heading");
        assert_eq!(md("<p>1. not a list</p>"), r"1\. not a list");
        assert_eq!(md("<p>- dash</p>"), r"\- dash");
    }

    #[test]
    fn test_extra_inline_rules() {
        assert_eq!(
            md("<p><del>old</del> <mark>hot</mark> H<sub>2</sub>O x<sup>2</sup></p>"),
            "~~old~~ ==hot== H~2~O x^2^"
        );
    }

    #[test]
    fn test_hard_break_and_rule() {
        assert_eq!(md("<p>a<br>b</p><hr><p>c</p>"), "a\\\nb\n\n---\n\nc");
        assert_eq!(md("<p>a<br></p>"), "a");
    }

    #[test]
    fn test_table_rendering() {
        let out = md("<table><caption>Scores</caption><tr><th>A</th><th>B</th></tr><tr><td><b>1</b></td><td>2</td></tr></table>");
        assert_eq!(out, "Scores\n\n| A | B |\n|---|---|\n| **1** | 2 |");
    }

    #[test]
    fn test_definition_list_details_and_figure() {
        assert_eq!(md("<dl><dt>Term</dt><dd>Meaning</dd></dl>"), "Term\n: Meaning");
        assert_eq!(
            md("<details><summary>More</summary><p>Hidden body</p></details>"),
            "**More**\n\nHidden body"
        );
        assert_eq!(
            md(r#"<figure><img src="f.png" alt="F"><figcaption>A figure</figcaption></figure>"#),
            "![F](f.png)\n\n*A figure*"
        );
    }

    #[test]
    fn test_preserve_formatting_off() {
        let options = ConversionOptions::default().with_preserve_formatting(false);
        assert_eq!(
            render_with("<p><b>bold</b> <i>it</i> <del>gone</del></p>", &options, None),
            "bold it gone"
        );
    }

    #[test]
    fn test_text_format_drops_markers() {
        let options = ConversionOptions::text_only();
        let out = render_with(
            r#"<h2>Head</h2><p>See <a href="/x">this *link*</a> <img src="i.png" alt="pic"></p><table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>"#,
            &options,
            None,
        );
        assert_eq!(out, "Head\n\nSee this *link* pic\n\nA\tB\n1\t2");
    }

    #[test]
    fn test_custom_rules() {
        let options = ConversionOptions::default()
            .with_custom_rule(CustomRule::new(r"\.ad\b", RuleAction::Remove))
            .with_custom_rule(CustomRule::new(
                r"^span\.note",
                RuleAction::Wrap {
                    prefix: "(".into(),
                    suffix: ")".into(),
                },
            ))
            .with_custom_rule(CustomRule::new(
                r"^div\.callout",
                RuleAction::Replace {
                    template: "> **Note:** {text}".into(),
                },
            ))
            .with_custom_rule(CustomRule::new(r"^sup\.keep", RuleAction::KeepHtml));
        let out = render_with(
            r#"<div class="ad">buy</div><p>a <span class="note">aside</span> b<sup class="keep">1</sup></p><div class="callout">Careful</div>"#,
            &options,
            None,
        );
        assert_eq!(
            out,
            "a (aside) b<sup class=\"keep\">1</sup>\n\n> **Note:** Careful"
        );
    }

    #[test]
    fn test_depth_limit_drops_deep_subtrees() {
        let mut el = Element::new("span").with_text("deep");
        for _ in 0..(MAX_NESTING_DEPTH + 10) {
            el = Element::new("span").with_child(Node::Element(el));
        }
        let options = ConversionOptions::default();
        assert_eq!(DomWalker::new(&options, None).render(&el).trim(), "");
    }
}
