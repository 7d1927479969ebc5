//! Table parsing and Markdown table rendering
//!
//! Tables are parsed into a [`TableModel`] grid where every row has the same
//! number of slots:
//! 1. Header rows come from `<thead>` or rows made only of `<th>` cells
//! 2. `colspan` inserts `colspan - 1` empty slots after the spanning cell
//! 3. Short rows are padded at the end
//! 4. `rowspan` is recorded but the cell is NOT copied into the rows below;
//!    the following rows are padded at the end instead
//!
//! Layout tables (`role="presentation"`, layout classes, a single column) are
//! unwrapped into plain blocks by [`TableFormatter::normalize_tables`].

use serde::{Deserialize, Serialize};

use crate::dom::{Element, Node};

/// Maximum rows kept from one table
const MAX_GRID_ROWS: usize = 1000;

/// Maximum columns kept from one table, and the colspan ceiling
const MAX_GRID_COLS: usize = 100;

/// Column alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCell {
    pub text: String,
    pub colspan: usize,
    pub rowspan: usize,
    pub is_header: bool,
    pub alignment: Option<Alignment>,
}

impl TableCell {
    fn filler(is_header: bool) -> Self {
        Self {
            text: String::new(),
            colspan: 1,
            rowspan: 1,
            is_header,
            alignment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
    pub is_header: bool,
}

/// Grid form of a table. After parsing every row has `columns` cells.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableModel {
    pub caption: Option<String>,
    pub rows: Vec<TableRow>,
    pub columns: usize,
}

impl TableModel {
    /// Column alignments taken from the header row, falling back to the first row.
    #[must_use]
    pub fn alignments(&self) -> Vec<Option<Alignment>> {
        let source = self
            .rows
            .iter()
            .find(|row| row.is_header)
            .or_else(|| self.rows.first());
        match source {
            Some(row) => row.cells.iter().map(|cell| cell.alignment).collect(),
            None => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns == 0
    }
}

/// Namespace for table handling
pub struct TableFormatter;

impl TableFormatter {
    /// Parse with plain, whitespace-collapsed cell text.
    #[must_use]
    pub fn parse(table: &Element) -> TableModel {
        Self::parse_with(table, &|cell| collapse_whitespace(&cell.text_content()))
    }

    /// Parse with a caller supplied cell renderer, used to keep inline Markdown.
    #[must_use]
    pub fn parse_with(table: &Element, cell_text: &dyn Fn(&Element) -> String) -> TableModel {
        let caption = table
            .child_elements()
            .find(|el| el.is("caption"))
            .map(|caption| collapse_whitespace(&caption.text_content()))
            .filter(|text| !text.is_empty());

        let mut rows = Vec::new();
        for (tr, in_thead) in table_rows(table) {
            if rows.len() >= MAX_GRID_ROWS {
                tracing::warn!(limit = MAX_GRID_ROWS, "Table row limit reached, truncating");
                break;
            }

            let cells: Vec<&Element> = tr
                .child_elements()
                .filter(|el| el.is("td") || el.is("th"))
                .collect();
            if cells.is_empty() {
                continue;
            }
            let all_th = cells.iter().all(|cell| cell.is("th"));
            let is_header = in_thead || all_th;

            let mut expanded = Vec::with_capacity(cells.len());
            for cell in cells {
                let colspan = span_attr(cell, "colspan");
                let alignment = extract_alignment(cell);
                expanded.push(TableCell {
                    text: cell_text(cell),
                    colspan,
                    rowspan: span_attr(cell, "rowspan"),
                    is_header: is_header || cell.is("th"),
                    alignment,
                });
                for _ in 1..colspan {
                    let mut filler = TableCell::filler(is_header);
                    filler.alignment = alignment;
                    expanded.push(filler);
                }
            }
            if expanded.len() > MAX_GRID_COLS {
                tracing::warn!(limit = MAX_GRID_COLS, "Table column limit reached, truncating row");
                expanded.truncate(MAX_GRID_COLS);
            }

            rows.push(TableRow {
                cells: expanded,
                is_header,
            });
        }

        let columns = rows.iter().map(|row| row.cells.len()).max().unwrap_or(0);
        for row in &mut rows {
            while row.cells.len() < columns {
                row.cells.push(TableCell::filler(row.is_header));
            }
        }

        TableModel {
            caption,
            rows,
            columns,
        }
    }

    /// Render a model as a Markdown table.
    ///
    /// The first header row becomes the table header; without one the first
    /// row is promoted. Captions are not part of the output.
    #[must_use]
    pub fn render(model: &TableModel) -> String {
        if model.is_empty() {
            return String::new();
        }

        let header_idx = model.rows.iter().position(|row| row.is_header).unwrap_or(0);
        let mut out = String::new();
        push_row(&mut out, &model.rows[header_idx]);

        out.push('|');
        for alignment in model.alignments() {
            out.push_str(match alignment {
                None => "---",
                Some(Alignment::Left) => ":---",
                Some(Alignment::Center) => ":---:",
                Some(Alignment::Right) => "---:",
            });
            out.push('|');
        }
        out.push('\n');

        for (idx, row) in model.rows.iter().enumerate() {
            if idx != header_idx {
                push_row(&mut out, row);
            }
        }
        out.truncate(out.trim_end().len());
        out
    }

    /// Render a model as tab separated plain text rows.
    #[must_use]
    pub fn render_plain(model: &TableModel) -> String {
        model
            .rows
            .iter()
            .map(|row| {
                row.cells
                    .iter()
                    .map(|cell| cell.text.replace(['\t', '\n'], " "))
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Unwrap layout tables into plain blocks so only data tables remain.
    pub fn normalize_tables(root: &mut Element) {
        for child in &mut root.children {
            if let Node::Element(el) = child {
                if el.is("table") && is_layout_table(el) {
                    tracing::debug!("Unwrapping layout table");
                    *el = unwrap_layout_table(el);
                }
                Self::normalize_tables(el);
            }
        }
    }
}

/// Rows of a table in order, with whether each sits in `<thead>`.
/// Nested tables are not descended into.
fn table_rows(table: &Element) -> Vec<(&Element, bool)> {
    let mut rows = Vec::new();
    for child in table.child_elements() {
        match child.tag.as_str() {
            "tr" => rows.push((child, false)),
            "thead" | "tbody" | "tfoot" => {
                let in_thead = child.is("thead");
                rows.extend(child.child_elements().filter(|el| el.is("tr")).map(|tr| (tr, in_thead)));
            }
            _ => {}
        }
    }
    rows
}

fn span_attr(cell: &Element, name: &str) -> usize {
    cell.attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_GRID_COLS)
}

/// Alignment from `align`, inline `text-align`, or a `text-*`/`align-*` class
fn extract_alignment(cell: &Element) -> Option<Alignment> {
    let parse = |value: &str| match value.trim().to_ascii_lowercase().as_str() {
        "left" | "start" => Some(Alignment::Left),
        "center" | "centre" => Some(Alignment::Center),
        "right" | "end" => Some(Alignment::Right),
        _ => None,
    };

    if let Some(align) = cell.attr("align").and_then(parse) {
        return Some(align);
    }

    if let Some(style) = cell.attr("style") {
        for decl in style.split(';') {
            if let Some((prop, value)) = decl.split_once(':')
                && prop.trim().eq_ignore_ascii_case("text-align")
                && let Some(align) = parse(value)
            {
                return Some(align);
            }
        }
    }

    cell.classes().find_map(|class| {
        let lower = class.to_ascii_lowercase();
        lower
            .strip_prefix("text-")
            .or_else(|| lower.strip_prefix("align-"))
            .and_then(parse)
    })
}

fn is_layout_table(table: &Element) -> bool {
    if table
        .attr("role")
        .is_some_and(|role| role.eq_ignore_ascii_case("presentation") || role.eq_ignore_ascii_case("none"))
    {
        return true;
    }
    if table.classes().any(|class| {
        let lower = class.to_ascii_lowercase();
        lower.contains("layout") || lower == "container"
    }) {
        return true;
    }

    let rows = table_rows(table);
    // Header cells or a caption mark a data table, even with one column
    let has_header = rows
        .iter()
        .any(|(tr, in_thead)| *in_thead || tr.child_elements().any(|cell| cell.is("th")));
    if has_header || table.child_elements().any(|el| el.is("caption")) {
        return false;
    }

    !rows.is_empty()
        && rows.iter().all(|(tr, _)| {
            tr.child_elements()
                .filter(|el| el.is("td") || el.is("th"))
                .map(|cell| span_attr(cell, "colspan"))
                .sum::<usize>()
                <= 1
        })
}

/// Replace a layout table with a `div` holding one `div` per cell.
fn unwrap_layout_table(table: &Element) -> Element {
    let mut block = Element::new("div");
    for child in table.child_elements().filter(|el| el.is("caption")) {
        let mut caption = Element::new("p");
        caption.children = child.children.clone();
        block.children.push(Node::Element(caption));
    }
    for (tr, _) in table_rows(table) {
        for cell in tr.child_elements().filter(|el| el.is("td") || el.is("th")) {
            let mut cell_block = Element::new("div");
            cell_block.children = cell.children.clone();
            block.children.push(Node::Element(cell_block));
        }
    }
    block
}

fn push_row(out: &mut String, row: &TableRow) {
    out.push('|');
    for cell in &row.cells {
        out.push(' ');
        out.push_str(&escape_cell(&cell.text));
        out.push_str(" |");
    }
    out.push('\n');
}

/// Escape pipes and fold newlines so a cell stays on one line
///
/// A pipe after an odd run of backslashes is already escaped. After an even
/// run the backslashes escape each other and the pipe still needs one.
#[must_use]
pub fn escape_cell(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut backslashes = 0usize;
    for ch in text.chars() {
        match ch {
            '|' if backslashes % 2 == 1 => out.push('|'),
            '|' => out.push_str("\\|"),
            '\r' => {}
            '\n' => out.push(' '),
            c => out.push(c),
        }
        backslashes = if ch == '\\' { backslashes + 1 } else { 0 };
    }
    collapse_whitespace(&out)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::SourceDocument;

    fn table(html: &str) -> Element {
        let doc = SourceDocument::parse_fragment(html, None);
        doc.root()
            .find_first(&|el| el.is("table"))
            .cloned()
            .expect("fragment contains a table")
    }

    #[test]
    fn test_two_column_table() {
        let model = TableFormatter::parse(&table(
            "<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>",
        ));
        assert_eq!(model.columns, 2);
        let md = TableFormatter::render(&model);
        assert_eq!(md, "| A | B |\n|---|---|\n| 1 | 2 |");
        assert!(md.contains("---|---"));
    }

    #[test]
    fn test_colspan_header_fills_every_row() {
        let model = TableFormatter::parse(&table(
            "<table><thead><tr><th colspan=\"2\">Wide</th></tr></thead>\
             <tbody><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr></tbody></table>",
        ));
        assert_eq!(model.columns, 2);
        assert!(model.rows.iter().all(|row| row.cells.len() == model.columns));
        let md = TableFormatter::render(&model);
        for line in md.lines() {
            // Each line has columns + 1 unescaped pipes.
            assert_eq!(line.matches('|').count(), model.columns + 1, "line: {line}");
        }
    }

    #[test]
    fn test_rowspan_is_not_duplicated() {
        let model = TableFormatter::parse(&table(
            "<table><tr><th>K</th><th>V</th></tr>\
             <tr><td rowspan=\"2\">x</td><td>1</td></tr><tr><td>2</td></tr></table>",
        ));
        assert_eq!(model.rows[1].cells[0].rowspan, 2);
        assert_eq!(model.rows[2].cells[0].text, "2");
        assert_eq!(model.rows[2].cells[1].text, "");
    }

    #[test]
    fn test_alignment_and_escaping() {
        let model = TableFormatter::parse(&table(
            "<table><tr><th style=\"text-align: center\">A|B</th><th align=\"right\">C</th><th>D</th></tr>\
             <tr><td>line\none</td><td>2</td><td>3</td></tr></table>",
        ));
        let md = TableFormatter::render(&model);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "| A\\|B | C | D |");
        assert_eq!(lines[1], "|:---:|---:|---|");
        assert_eq!(lines[2], "| line one | 2 | 3 |");
    }

    #[test]
    fn test_first_row_promoted_without_header() {
        let model = TableFormatter::parse(&table(
            "<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>",
        ));
        let md = TableFormatter::render(&model);
        assert_eq!(md, "| a | b |\n|---|---|\n| c | d |");
    }

    #[test]
    fn test_caption_is_captured() {
        let model = TableFormatter::parse(&table(
            "<table><caption> Results </caption><tr><th>A</th><th>B</th></tr></table>",
        ));
        assert_eq!(model.caption.as_deref(), Some("Results"));
    }

    #[test]
    fn test_layout_tables_are_unwrapped() {
        let doc = SourceDocument::parse_fragment(
            "<div><table role=\"presentation\"><tr><td><p>Left</p></td><td><p>Right</p></td></tr></table>\
             <table><tr><td>only</td></tr><tr><td>column</td></tr></table></div>",
            None,
        );
        let mut root = doc.root().clone();
        TableFormatter::normalize_tables(&mut root);
        assert!(root.find_first(&|el| el.is("table")).is_none());
        assert!(root.text_content().contains("Left"));
        assert!(root.text_content().contains("column"));
    }

    #[test]
    fn test_single_column_with_header_stays_a_table() {
        let doc = SourceDocument::parse_fragment(
            "<div><table><tr><th>Name</th></tr><tr><td>Ada</td></tr><tr><td>Bob</td></tr></table>\
             <table><caption>Totals</caption><tr><td>42</td></tr></table></div>",
            None,
        );
        let mut root = doc.root().clone();
        TableFormatter::normalize_tables(&mut root);
        let tables = root.find_all(&|el| el.is("table"));
        assert_eq!(tables.len(), 2);

        let md = TableFormatter::render(&TableFormatter::parse(tables[0]));
        assert_eq!(md, "| Name |\n|---|\n| Ada |\n| Bob |");
    }

    #[test]
    fn test_escape_cell_backslash_runs() {
        assert_eq!(escape_cell("a|b"), "a\\|b");
        assert_eq!(escape_cell("a\\|b"), "a\\|b");
        // Escaped backslash then a bare pipe
        assert_eq!(escape_cell("a\\\\|b"), "a\\\\\\|b");
        assert_eq!(escape_cell("C:\\dir"), "C:\\dir");
    }

    #[test]
    fn test_render_plain_is_tab_separated() {
        let model = TableFormatter::parse(&table(
            "<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>",
        ));
        assert_eq!(TableFormatter::render_plain(&model), "A\tB\n1\t2");
    }
}
