//! The document-converter capability.
//!
//! The pipeline never parses PDFs itself. It talks to a [`DocumentConverter`]
//! through a deliberately loose contract: whole-document mode returns a
//! Markdown string, chunked mode returns a JSON value that *should* be an
//! array of `{ "text": ..., "metadata": {...} }` records. The adapter in
//! [`crate::pipeline::adapter`] turns that into typed page chunks.
//!
//! [`PdfiumConverter`] is the bundled implementation.

pub mod pdfium;

pub use pdfium::PdfiumConverter;

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Options passed to one converter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterOptions {
    pub dpi: u32,
    pub force_text: bool,
    pub write_images: bool,
    pub embed_images: bool,
    /// Directory that receives written images.
    pub image_output_path: Option<PathBuf>,
    /// File extension / encoder for written images. Default: `png`.
    pub image_format: String,
    /// Return per-page chunks instead of one Markdown string.
    pub page_chunks: bool,
    /// Infer heading levels from font sizes (`hdr_info`). Default: true.
    pub header_inference: bool,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            dpi: 150,
            force_text: true,
            write_images: false,
            embed_images: false,
            image_output_path: None,
            image_format: "png".to_string(),
            page_chunks: false,
            header_inference: true,
        }
    }
}

/// Loosely typed converter result.
#[derive(Debug, Clone, PartialEq)]
pub enum ConverterOutput {
    /// Whole-document Markdown.
    Markdown(String),
    /// Chunked output; expected to be an array of page records.
    Chunks(serde_json::Value),
}

/// Failures reported by a converter.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// Heading inference needed an extremum over an empty set of candidates.
    ///
    /// The adapter retries once with `header_inference = false`.
    #[error("empty extremum during {stage}: no candidate values")]
    EmptyExtremum { stage: &'static str },

    /// The document could not be parsed.
    #[error("PDF is corrupt: {detail}")]
    Corrupt { detail: String },

    /// The document is encrypted.
    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,

    /// The PDF engine could not be loaded or failed internally.
    #[error("PDF engine error: {0}")]
    Engine(String),

    /// An extracted image could not be encoded or written.
    #[error("image extraction failed on page {page}: {detail}")]
    Image { page: usize, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConverterError {
    pub fn is_empty_extremum(&self) -> bool {
        matches!(self, ConverterError::EmptyExtremum { .. })
    }
}

/// A PDF-to-Markdown engine.
///
/// Implementations are synchronous; the adapter calls them from
/// `spawn_blocking`.
pub trait DocumentConverter: Send + Sync {
    /// Convert the document at `path`.
    fn to_markdown(
        &self,
        path: &Path,
        options: &ConverterOptions,
    ) -> Result<ConverterOutput, ConverterError>;

    /// Plain text, one entry per page.
    fn extract_text(&self, path: &Path) -> Result<Vec<String>, ConverterError>;

    /// Called once, when layout mode is switched on for the process.
    fn on_layout_activated(&self) {}
}
