//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use kodegen_tools_clipmark::OutputFormat;
use kodegen_tools_clipmark::config::builder::{DEFAULT_CONCURRENCY, DEFAULT_LOAD_TIMEOUT_SECS};

/// Output format accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Markdown,
    Html,
    Text,
    PdfIntent,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Html => OutputFormat::Html,
            FormatArg::Text => OutputFormat::Text,
            FormatArg::PdfIntent => OutputFormat::PdfIntent,
        }
    }
}

/// Clip web pages and HTML files to Markdown.
///
/// Each input is converted through the task queue. File inputs get their
/// output written next to them; URL inputs are written to the output directory.
#[derive(Parser, Debug)]
#[command(name = "clipmark")]
#[command(author, version, about)]
pub struct Args {
    /// HTML files or http(s) URLs to convert
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Maximum concurrent conversions (1-64)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub concurrency: u8,

    /// Seconds to wait for a URL input to load
    #[arg(long, default_value_t = DEFAULT_LOAD_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub load_timeout: u64,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = FormatArg::Markdown)]
    pub format: FormatArg,

    /// Download images next to the output
    #[arg(long)]
    pub download_images: bool,

    /// Directory for downloaded images
    #[arg(long, default_value = "images")]
    pub image_dir: PathBuf,

    /// Directory for URL outputs
    #[arg(short = 'o', long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Skip math formula extraction
    #[arg(long)]
    pub no_math: bool,

    /// Omit author, date and tags from the result metadata
    #[arg(long)]
    pub no_metadata: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["clipmark", "page.html"]).expect("parses");
        assert_eq!(args.inputs, vec!["page.html"]);
        assert_eq!(args.format, FormatArg::Markdown);
        assert_eq!(usize::from(args.concurrency), DEFAULT_CONCURRENCY);
        assert!(!args.download_images);
        assert_eq!(args.load_timeout, DEFAULT_LOAD_TIMEOUT_SECS);
    }

    #[test]
    fn test_requires_input() {
        let err = Args::try_parse_from(["clipmark"]).expect_err("input is required");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_format_and_concurrency_range() {
        let args = Args::try_parse_from(["clipmark", "-f", "text", "-c", "8", "a.html"]).expect("parses");
        assert_eq!(OutputFormat::from(args.format), OutputFormat::Text);
        assert_eq!(args.concurrency, 8);

        let err = Args::try_parse_from(["clipmark", "-c", "0", "a.html"]).expect_err("out of range");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
