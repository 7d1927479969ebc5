//! Document subtree to Markdown conversion pipeline
//!
//! Stages, in order:
//! 1. strip script/style/noscript/template/comments
//! 2. assign a language to every code block
//! 3. unwrap layout tables
//! 4. resolve, rewrite or download images
//! 5. lift formulas out behind placeholders
//! 6. walk the tree with the rule set, rendering formulas where their
//!    tokens sit
//! 7. put back formulas the walk saw only as raw markup
//! 8. normalize whitespace and count words, images and code blocks
//!
//! # Usage
//!
//! ```rust
//! # use kodegen_tools_clipmark::dom::SourceDocument;
//! # use kodegen_tools_clipmark::markdown_converter::MarkdownConverter;
//! # use kodegen_tools_clipmark::config::ConversionOptions;
//! let doc = SourceDocument::parse_fragment("<h1>Title</h1><p>Hello <strong>world</strong></p>", None);
//! let converter = MarkdownConverter::default();
//! let result = converter.convert_sync(doc.root(), &ConversionOptions::default(), None, None);
//! assert_eq!(result.markdown, "# Title\n\nHello **world**");
//! ```

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

pub mod custom_handlers;
pub mod dom_walker;
pub mod html_preprocessing;
pub mod markdown_postprocessing;
pub mod metadata;

pub use custom_handlers::{
    CodeBlockDescriptor, CodeFormatter, FormulaPlaceholder, ImageOptions, ImageProcessor,
    ImageRecord, MathFormatter, TableFormatter, TableModel,
};
pub use dom_walker::DomWalker;
pub use html_preprocessing::{ContentExtractor, NoiseFilter, ScoredCandidate};
pub use metadata::{PageMetadata, extract_page_metadata, resolve_title};

use crate::config::{ClipperConfig, ConversionOptions, OutputFormat};
use crate::dom::{Element, element_to_html};
use crate::error::{ConvertError, ConvertResult};
use markdown_postprocessing::{count_code_blocks, count_images, count_words, normalize_whitespace};

/// Counts and page facts attached to a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub author: Option<String>,
    pub date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub word_count: usize,
    pub image_count: usize,
    pub code_block_count: usize,
}

/// Output of one conversion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Markdown body, or HTML/plain text for those output formats
    pub markdown: String,
    pub title: String,
    pub source_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub metadata: ResultMetadata,
    #[serde(default)]
    pub images: Vec<ImageRecord>,
}

/// Converts cleaned subtrees. Holds the image service and image policy defaults.
#[derive(Debug, Clone)]
pub struct MarkdownConverter {
    images: ImageProcessor,
    image_dir: PathBuf,
    rewrite_absolute: bool,
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        let config = ClipperConfig::default();
        Self::from_config(reqwest::Client::new(), &config)
    }
}

impl MarkdownConverter {
    #[must_use]
    pub fn new(images: ImageProcessor, image_dir: impl Into<PathBuf>, rewrite_absolute: bool) -> Self {
        Self {
            images,
            image_dir: image_dir.into(),
            rewrite_absolute,
        }
    }

    #[must_use]
    pub fn from_config(client: reqwest::Client, config: &ClipperConfig) -> Self {
        Self::new(
            ImageProcessor::from_config(client, config),
            config.image_dir().clone(),
            config.rewrite_absolute(),
        )
    }

    fn image_options(&self, options: &ConversionOptions) -> ImageOptions {
        ImageOptions {
            download_images: options.download_images,
            target_path: self.image_dir.clone(),
            rewrite_absolute: self.rewrite_absolute,
        }
    }

    /// Convert a subtree, downloading images when `options.download_images` is set.
    ///
    /// `page` carries metadata harvested from the full document; without it the
    /// title is resolved from the subtree itself.
    pub async fn convert(
        &self,
        subtree: &Element,
        options: &ConversionOptions,
        base_url: Option<&Url>,
        page: Option<&PageMetadata>,
    ) -> ConvertResult<ConversionResult> {
        let prepared = prepare(subtree);

        let image_options = self.image_options(options);
        let (tree, images) = if image_options.download_images || image_options.rewrite_absolute {
            self.images.process(&prepared, &image_options, base_url).await
        } else {
            (prepared, Vec::new())
        };

        let title = title_for(subtree, page);
        let options = options.clone();
        let base_url = base_url.cloned();
        let page = page.cloned();

        tokio::task::spawn_blocking(move || {
            finish(&tree, &options, base_url.as_ref(), title, page.as_ref(), images)
        })
        .await
        .map_err(|e| ConvertError::Other(format!("Markdown conversion task panicked: {e}")))
    }

    /// Convert without network access. Images are rewritten but never downloaded.
    #[must_use]
    pub fn convert_sync(
        &self,
        subtree: &Element,
        options: &ConversionOptions,
        base_url: Option<&Url>,
        page: Option<&PageMetadata>,
    ) -> ConversionResult {
        let prepared = prepare(subtree);

        if options.download_images {
            tracing::debug!("Image downloads skipped in synchronous conversion");
        }
        let (tree, images) = if self.rewrite_absolute {
            let image_options = ImageOptions {
                download_images: false,
                ..self.image_options(options)
            };
            ImageProcessor::rewrite_references(&prepared, &image_options, base_url)
        } else {
            (prepared, Vec::new())
        };

        finish(&tree, options, base_url, title_for(subtree, page), page, images)
    }
}

fn title_for(subtree: &Element, page: Option<&PageMetadata>) -> String {
    page.and_then(|page| page.title.clone())
        .unwrap_or_else(|| resolve_title(subtree))
}

/// Stages that run before images: strip non-content, code languages, layout tables.
fn prepare(subtree: &Element) -> Element {
    let mut tree = subtree.clone();
    html_preprocessing::strip_non_content(&mut tree);
    CodeFormatter::annotate_code_blocks(&mut tree);
    TableFormatter::normalize_tables(&mut tree);
    tree
}

fn finish(
    tree: &Element,
    options: &ConversionOptions,
    base_url: Option<&Url>,
    title: String,
    page: Option<&PageMetadata>,
    images: Vec<ImageRecord>,
) -> ConversionResult {
    let (body, counts) = match options.format {
        OutputFormat::Html => {
            let html = element_to_html(tree);
            let counts = (
                count_words(&tree.text_content()),
                tree.count_tags(&["img"]),
                tree.count_tags(&["pre"]),
            );
            (html, counts)
        }
        OutputFormat::Markdown | OutputFormat::PdfIntent | OutputFormat::Text => {
            let markdown = render_markdown(tree, options, base_url);
            let counts = (
                count_words(&markdown),
                count_images(&markdown),
                count_code_blocks(&markdown),
            );
            (markdown, counts)
        }
    };

    let (author, date, tags) = match page.filter(|_| options.include_metadata) {
        Some(page) => (page.author.clone(), page.published_date.clone(), page.tags.clone()),
        None => (None, None, Vec::new()),
    };

    tracing::debug!(
        words = counts.0,
        images = counts.1,
        code_blocks = counts.2,
        format = ?options.format,
        "Conversion finished"
    );

    ConversionResult {
        markdown: body,
        title,
        source_url: base_url.map(Url::to_string),
        timestamp: Utc::now(),
        metadata: ResultMetadata {
            author,
            date,
            tags,
            word_count: counts.0,
            image_count: counts.1,
            code_block_count: counts.2,
        },
        images,
    }
}

/// Math extraction, rule walk, math restoration and whitespace normalization.
fn render_markdown(tree: &Element, options: &ConversionOptions, base_url: Option<&Url>) -> String {
    let (tree, placeholders) = if options.enable_math {
        MathFormatter::extract_with_replacement(tree)
    } else {
        (tree.clone(), Vec::new())
    };

    let walked = DomWalker::new(options, base_url)
        .with_formulas(&placeholders)
        .render(&tree);
    // Tokens kept by `KeepHtml` or `{text}` custom rules never reach a text node
    let restored = if placeholders.is_empty() {
        walked
    } else {
        MathFormatter::restore(&walked, &placeholders)
    };
    normalize_whitespace(&restored)
}
