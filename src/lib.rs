//! Document to Markdown clipping pipeline
//!
//! Cleans a page, picks its main content and renders it as Markdown, with
//! formulas, code languages, tables and images handled on the way. Batches of
//! conversions run through a bounded [`TaskQueue`].

pub mod clipper;
pub mod config;
pub mod dom;
pub mod error;
pub mod markdown_converter;
pub mod pipeline;
pub mod task_queue;

pub use clipper::Clipper;
pub use config::{
    ClipperConfig, ClipperConfigBuilder, ConversionOptions, CustomRule, OutputFormat, RuleAction,
};
pub use dom::{Element, Node, SourceDocument};
pub use error::{ConvertError, ConvertResult, QueueError, QueueResult};
pub use markdown_converter::{
    ContentExtractor, ConversionResult, MarkdownConverter, NoiseFilter, ResultMetadata,
};
pub use pipeline::{DocumentScope, Pipeline};
pub use task_queue::{
    ConversionTask, InMemoryHistory, ResultStore, TaskObserver, TaskPayload, TaskQueue,
    TaskStats, TaskStatus,
};

/// Convert one markup document with default services.
///
/// Convenience wrapper over [`Pipeline::convert_markup`] for one-off calls.
///
/// # Errors
///
/// Fails when `markup` is empty or `base_url` does not parse.
pub async fn convert_html(
    markup: &str,
    base_url: Option<&str>,
    options: &ConversionOptions,
) -> ConvertResult<ConversionResult> {
    Pipeline::default()
        .convert_markup(markup, base_url, DocumentScope::Page, options)
        .await
}
