//! Specialized sub-converters consulted during conversion.

pub mod code_formatter;
pub mod image_processor;
pub mod language_patterns;
pub mod math_formatter;
pub mod mathml;
pub mod table_formatter;

pub use code_formatter::{CodeBlockDescriptor, CodeFormatter};
pub use image_processor::{ImageOptions, ImageProcessor, ImageRecord};
pub use math_formatter::{FormulaPlaceholder, MathFormatter};
pub use mathml::mathml_to_latex;
pub use table_formatter::{Alignment, TableCell, TableFormatter, TableModel, TableRow};
