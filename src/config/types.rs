//! Conversion option types
//!
//! `ConversionOptions` is the only tunable surface of the pipeline. It is
//! passed by reference into every stage and never mutated along the way.

use serde::{Deserialize, Serialize};

/// Output format requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// CommonMark-flavoured Markdown
    #[default]
    Markdown,
    /// Cleaned, normalized HTML of the selected subtree
    Html,
    /// Plain text without markup markers
    Text,
    /// Markdown destined for a PDF renderer downstream
    PdfIntent,
}

impl OutputFormat {
    /// Formats whose body is Markdown text.
    #[must_use]
    pub fn emits_markdown(self) -> bool {
        matches!(self, Self::Markdown | Self::PdfIntent)
    }
}

/// What a matching custom rule does to an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Drop the element and its subtree
    Remove,
    /// Render the children as if the element were absent
    Unwrap,
    /// Emit the element's markup verbatim
    KeepHtml,
    /// Surround the rendered children
    Wrap { prefix: String, suffix: String },
    /// Substitute `{content}` (rendered children) and `{text}` (plain text)
    Replace { template: String },
}

/// An ordered override consulted before the built-in walk rules.
///
/// `pattern` is a regular expression matched against an element signature of
/// the form `tag#id.class1.class2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRule {
    pub pattern: String,
    pub action: RuleAction,
}

impl CustomRule {
    #[must_use]
    pub fn new(pattern: impl Into<String>, action: RuleAction) -> Self {
        Self {
            pattern: pattern.into(),
            action,
        }
    }
}

/// Configuration options for document to Markdown conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Output format (default: markdown)
    pub format: OutputFormat,

    /// Harvest author, date and tags from page meta (default: true)
    pub include_metadata: bool,

    /// Keep inline emphasis markers (default: true)
    ///
    /// When disabled, bold, italic, strikethrough and highlight are emitted
    /// as their bare text.
    pub preserve_formatting: bool,

    /// Download referenced images and rewrite them to local paths (default: false)
    pub download_images: bool,

    /// Protect and re-emit math formulas as `$`/`$$` LaTeX (default: true)
    pub enable_math: bool,

    /// Infer and emit code fence languages (default: true)
    pub enable_code_highlight: bool,

    /// Ordered pattern to action overrides (default: none)
    pub custom_rules: Vec<CustomRule>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Markdown,
            include_metadata: true,
            preserve_formatting: true,
            download_images: false,
            enable_math: true,
            enable_code_highlight: true,
            custom_rules: Vec::new(),
        }
    }
}

impl ConversionOptions {
    /// Create a new `ConversionOptions` with the default feature set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable all optional processing
    ///
    /// Plain structural conversion: no metadata, math or language inference.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            format: OutputFormat::Markdown,
            include_metadata: false,
            preserve_formatting: true,
            download_images: false,
            enable_math: false,
            enable_code_highlight: false,
            custom_rules: Vec::new(),
        }
    }

    /// Text-only mode: plain text output without formatting markers
    #[must_use]
    pub fn text_only() -> Self {
        Self {
            format: OutputFormat::Text,
            include_metadata: true,
            preserve_formatting: false,
            download_images: false,
            enable_math: true,
            enable_code_highlight: false,
            custom_rules: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    #[must_use]
    pub fn with_preserve_formatting(mut self, preserve: bool) -> Self {
        self.preserve_formatting = preserve;
        self
    }

    #[must_use]
    pub fn with_download_images(mut self, download: bool) -> Self {
        self.download_images = download;
        self
    }

    #[must_use]
    pub fn with_math(mut self, enabled: bool) -> Self {
        self.enable_math = enabled;
        self
    }

    #[must_use]
    pub fn with_code_highlight(mut self, enabled: bool) -> Self {
        self.enable_code_highlight = enabled;
        self
    }

    #[must_use]
    pub fn with_custom_rule(mut self, rule: CustomRule) -> Self {
        self.custom_rules.push(rule);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let minimal = ConversionOptions::minimal();
        assert!(!minimal.enable_math);
        assert!(!minimal.enable_code_highlight);

        let text = ConversionOptions::text_only();
        assert_eq!(text.format, OutputFormat::Text);
        assert!(!text.preserve_formatting);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ConversionOptions =
            serde_json::from_str(r#"{"format":"pdf-intent","custom_rules":[{"pattern":"^aside","action":{"type":"remove"}}]}"#)
                .expect("valid options json");
        assert_eq!(options.format, OutputFormat::PdfIntent);
        assert!(options.include_metadata);
        assert_eq!(options.custom_rules[0].action, RuleAction::Remove);
    }
}
