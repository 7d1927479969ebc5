use kodegen_tools_clipmark::config::ConversionOptions;
use kodegen_tools_clipmark::dom::SourceDocument;
use kodegen_tools_clipmark::markdown_converter::{CodeFormatter, MarkdownConverter, MathFormatter};
use kodegen_tools_clipmark::{DocumentScope, OutputFormat, Pipeline, convert_html};

fn convert(html: &str) -> String {
    let doc = SourceDocument::parse_fragment(html, None);
    MarkdownConverter::default()
        .convert_sync(doc.root(), &ConversionOptions::default(), None, None)
        .markdown
}

#[test]
fn test_heading_and_strong() {
    assert_eq!(
        convert("<h1>Title</h1><p>Hello <strong>world</strong></p>"),
        "# Title\n\nHello **world**"
    );
}

#[test]
fn test_image_without_download_keeps_reference() {
    assert_eq!(convert(r#"<img src="a.jpg" alt="Cat">"#), "![Cat](a.jpg)");
}

#[test]
fn test_two_column_table() {
    let markdown = convert(
        "<table><tr><th>Name</th><th>Age</th></tr><tr><td>Ada</td><td>36</td></tr></table>",
    );
    assert_eq!(markdown, "| Name | Age |\n|---|---|\n| Ada | 36 |");
}

#[test]
fn test_colspan_header_fills_every_slot() {
    let markdown = convert(
        r#"<table><tr><th colspan="2">Both</th></tr><tr><td>a</td><td>b</td></tr></table>"#,
    );
    for line in markdown.lines() {
        assert_eq!(line.matches('|').count(), 3, "row {line:?} should have 2 slots");
    }
}

#[test]
fn test_language_detection() {
    assert_eq!(CodeFormatter::detect_language("def foo():\n    pass"), "python");
    assert_eq!(CodeFormatter::detect_language(""), "text");
}

#[test]
fn test_code_block_keeps_newlines_and_language() {
    let markdown = convert(
        r#"<pre><code class="language-rust">fn main() {
    println!("hi");
}</code></pre>"#,
    );
    assert!(markdown.starts_with("```rust\n"), "got {markdown:?}");
    assert!(markdown.contains("fn main() {\n    println!(\"hi\");\n}"));
    assert!(markdown.ends_with("```"));
}

#[test]
fn test_inline_formula_survives_round_trip() {
    let doc = SourceDocument::parse_fragment("<p>Euler: $e^{i\\pi}+1=0$ holds.</p>", None);
    let (protected, placeholders) = MathFormatter::extract_with_replacement(doc.root());
    assert_eq!(placeholders.len(), 1);
    assert!(!protected.text_content().contains('$'));

    let restored = MathFormatter::restore(&protected.text_content(), &placeholders);
    assert_eq!(restored, "Euler: $e^{i\\pi}+1=0$ holds.");

    let markdown = convert("<p>Euler: $e^{i\\pi}+1=0$ holds.</p>");
    assert_eq!(markdown, "Euler: $e^{i\\pi}+1=0$ holds.");
}

#[test]
fn test_text_format_drops_markers() {
    let doc = SourceDocument::parse_fragment(
        r#"<h2>Intro</h2><p>Read <a href="https://example.com">the <em>docs</em></a>.</p>"#,
        None,
    );
    let result = MarkdownConverter::default().convert_sync(
        doc.root(),
        &ConversionOptions::text_only(),
        None,
        None,
    );
    assert_eq!(result.markdown, "Intro\n\nRead the docs.");
}

#[tokio::test]
async fn test_page_conversion_counts() {
    let html = r#"<html><head><title>Counting</title></head><body><main>
        <h1>Counting</h1>
        <p>One two three four five six seven eight nine ten eleven twelve thirteen fourteen fifteen.</p>
        <p><img src="/pic.png" alt="Pic"></p>
        <pre><code>let x = 1;</code></pre>
        </main></body></html>"#;
    let result = convert_html(html, Some("https://example.com/post"), &ConversionOptions::default())
        .await
        .expect("converts");
    assert_eq!(result.title, "Counting");
    assert_eq!(result.metadata.image_count, 1);
    assert_eq!(result.metadata.code_block_count, 1);
    assert!(result.metadata.word_count >= 15);
}

#[tokio::test]
async fn test_html_format_returns_cleaned_markup() {
    let options = ConversionOptions::default().with_format(OutputFormat::Html);
    let result = Pipeline::default()
        .convert_markup(
            r#"<div onclick="x()"><p>Kept</p><script>gone()</script></div>"#,
            None,
            DocumentScope::Selection,
            &options,
        )
        .await
        .expect("converts");
    assert!(result.markdown.contains("<p>Kept</p>"));
    assert!(!result.markdown.contains("onclick"));
    assert!(!result.markdown.contains("gone()"));
}

#[tokio::test]
async fn test_page_with_item_prop_article_body() {
    let html = r#"<html><head><title>Recipes</title></head><body>
        <div class="related"><p>You may also like: bread, soup, salad</p></div>
        <div itemprop="articleBody">
          <p>Knead the dough for ten minutes until it springs back when pressed, then leave it covered in a warm spot until it has doubled in size, which takes about an hour in a warm kitchen.</p>
        </div>
        </body></html>"#;
    let result = convert_html(html, None, &ConversionOptions::default())
        .await
        .expect("converts");
    assert!(result.markdown.starts_with("Knead the dough"), "got {:?}", result.markdown);
    assert!(!result.markdown.contains("You may also like"));
}

#[test]
fn test_display_formula_in_table_cell_keeps_rows() {
    let markdown = convert(
        "<table><tr><th>A</th><th>B</th></tr><tr><td>$$a+b$$</td><td>1</td></tr></table>",
    );
    assert_eq!(markdown.lines().count(), 3, "got {markdown:?}");
    assert!(markdown.lines().all(|line| line.starts_with('|')), "got {markdown:?}");
    assert!(markdown.contains("$a+b$"));
}

#[test]
fn test_display_formula_in_list_keeps_one_list() {
    let markdown = convert(
        r#"<ol><li>First</li><li>Then <span class="math-display">\int_0^1 f(x)\,dx</span></li><li>Last</li></ol>"#,
    );
    let markers: Vec<&str> = markdown
        .lines()
        .filter(|line| !line.starts_with(' '))
        .collect();
    assert_eq!(markers, vec!["1. First", "2. Then", "3. Last"], "got {markdown:?}");
    assert!(markdown.contains("   $$\n   \\int_0^1 f(x)\\,dx\n   $$"), "got {markdown:?}");
}

#[test]
fn test_single_column_table_with_header() {
    assert_eq!(
        convert("<table><tr><th>Name</th></tr><tr><td>Ada</td></tr><tr><td>Bob</td></tr></table>"),
        "| Name |\n|---|\n| Ada |\n| Bob |"
    );
}

#[test]
fn test_backslash_before_pipe_in_cell() {
    let markdown = convert(
        r"<table><tr><th>Pattern</th><th>Use</th></tr><tr><td>a\|b</td><td>split</td></tr></table>",
    );
    let rows: Vec<&str> = markdown.lines().collect();
    assert_eq!(rows[2], r"| a\\\|b | split |");
}
