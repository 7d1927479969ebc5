//! Configuration for conversions and for the clipper service
//!
//! `ConversionOptions` travels with every conversion request. `ClipperConfig`
//! is built once per process and wires the queue and image downloader.

pub mod builder;
pub mod types;

pub use builder::{ClipperConfig, ClipperConfigBuilder};
pub use types::{ConversionOptions, CustomRule, OutputFormat, RuleAction};
