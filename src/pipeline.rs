//! Whole-page and selection conversion over a `SourceDocument`
//!
//! Page: noise filter → main content extraction → conversion, with page
//! metadata harvested from the full document first.
//! Selection: noise filter → conversion. Selections are already the content.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ConversionOptions;
use crate::dom::SourceDocument;
use crate::error::{ConvertError, ConvertResult};
use crate::markdown_converter::{
    ContentExtractor, ConversionResult, MarkdownConverter, NoiseFilter, extract_page_metadata,
};

/// Whether markup is a whole page or a user selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentScope {
    Page,
    Selection,
}

/// Conversion entry points shared by the queue runner and direct callers
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    converter: MarkdownConverter,
}

impl Pipeline {
    #[must_use]
    pub fn new(converter: MarkdownConverter) -> Self {
        Self { converter }
    }

    #[must_use]
    pub fn converter(&self) -> &MarkdownConverter {
        &self.converter
    }

    /// Convert a full page: clean, pick the main content, render.
    pub async fn convert_page(
        &self,
        document: &SourceDocument,
        options: &ConversionOptions,
    ) -> ConvertResult<ConversionResult> {
        let page = extract_page_metadata(document.root());
        let filtered = SourceDocument::new(
            NoiseFilter::filter(document.root()),
            document.base_url().cloned(),
        );
        let main = ContentExtractor::extract_main_content(&filtered);
        tracing::debug!(
            base_url = ?document.base_url().map(Url::as_str),
            main_tag = %main.tag,
            "Extracted main content"
        );
        self.converter
            .convert(&main, options, document.base_url(), Some(&page))
            .await
    }

    /// Convert a selection: clean and render, no extraction.
    pub async fn convert_selection(
        &self,
        document: &SourceDocument,
        options: &ConversionOptions,
    ) -> ConvertResult<ConversionResult> {
        let filtered = NoiseFilter::filter(document.root());
        self.converter
            .convert(&filtered, options, document.base_url(), None)
            .await
    }

    /// Parse raw markup and convert it in the given scope.
    ///
    /// Empty markup is absent input and fails. Whitespace-only markup is a
    /// valid, empty document.
    pub async fn convert_markup(
        &self,
        markup: &str,
        base_url: Option<&str>,
        scope: DocumentScope,
        options: &ConversionOptions,
    ) -> ConvertResult<ConversionResult> {
        if markup.is_empty() {
            return Err(ConvertError::MissingInput(
                "document markup is empty".to_string(),
            ));
        }
        let base_url = base_url
            .map(|base| Url::parse(base).map_err(|_| ConvertError::InvalidBaseUrl(base.to_string())))
            .transpose()?;

        match scope {
            DocumentScope::Page => {
                let document = SourceDocument::parse_html(markup, base_url);
                self.convert_page(&document, options).await
            }
            DocumentScope::Selection => {
                let document = SourceDocument::parse_fragment(markup, base_url);
                self.convert_selection(&document, options).await
            }
        }
    }
}
