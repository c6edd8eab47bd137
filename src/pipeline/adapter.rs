//! Document converter adapter: the pipeline's only door to the converter.
//!
//! A job needs two things from the converter: whole-document Markdown (with
//! image options applied) and per-page chunks (with image output forced
//! off, so images are materialised once). Both calls go through the same
//! fallback policy:
//!
//! * [`ConverterError::EmptyExtremum`] during heading inference is retried
//!   exactly once with `header_inference = false`. If the retry fails too,
//!   the retry's error is surfaced.
//! * Every other failure is mapped to [`Pdf2MdError::ConversionFailed`]
//!   and returned as is.
//!
//! ## Chunk parsing policy
//!
//! The chunked result is loosely typed. [`normalize_chunks`] keeps only
//! JSON objects from a JSON array and drops everything else with a log
//! line; a result that is not an array at all yields zero pages. A record's
//! `text` is used when it is a string, treated as empty when missing or
//! `null`, and stringified otherwise. `metadata` is kept when it is an
//! object and replaced by an empty map otherwise. Indices are assigned
//! after filtering, so they are always `1..=n` with no gaps.

use crate::converter::{ConverterError, ConverterOptions, ConverterOutput, DocumentConverter};
use crate::error::Pdf2MdError;
use crate::layout::{Activation, LayoutRegistry};
use crate::output::PageChunk;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of both converter passes over one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub markdown: String,
    pub chunks: Vec<PageChunk>,
}

/// Wraps a [`DocumentConverter`] with the retry policy and layout gate.
#[derive(Clone)]
pub struct ConverterAdapter {
    converter: Arc<dyn DocumentConverter>,
    layout: Arc<LayoutRegistry>,
}

impl ConverterAdapter {
    pub fn new(converter: Arc<dyn DocumentConverter>, layout: Arc<LayoutRegistry>) -> Self {
        Self { converter, layout }
    }

    pub fn layout(&self) -> &LayoutRegistry {
        &self.layout
    }

    /// Switch layout mode on when `requested`.
    ///
    /// Fails with [`Pdf2MdError::LayoutUnavailable`] if the capability is not
    /// compiled in. The converter is notified only on the off→on transition.
    /// Returns whether layout mode is active for the process afterwards.
    pub fn activate_layout(&self, requested: bool) -> Result<bool, Pdf2MdError> {
        if !requested {
            return Ok(self.layout.is_active());
        }
        match self.layout.try_activate() {
            Activation::Unavailable => Err(Pdf2MdError::LayoutUnavailable),
            Activation::Activated => {
                info!("Layout mode activated for this process");
                self.converter.on_layout_activated();
                Ok(true)
            }
            Activation::AlreadyActive => Ok(true),
        }
    }

    /// Run the full-document pass followed by the per-page pass.
    pub async fn convert(
        &self,
        pdf: &Path,
        options: &ConverterOptions,
    ) -> Result<Conversion, Pdf2MdError> {
        let markdown = self.full_markdown(pdf, options).await?;
        let chunks = self.page_chunks(pdf, options).await?;
        debug!(
            "Converter produced {} chars of Markdown and {} page chunks",
            markdown.len(),
            chunks.len()
        );
        Ok(Conversion { markdown, chunks })
    }

    /// Whole-document Markdown, image options applied.
    pub async fn full_markdown(
        &self,
        pdf: &Path,
        options: &ConverterOptions,
    ) -> Result<String, Pdf2MdError> {
        let opts = ConverterOptions {
            page_chunks: false,
            ..options.clone()
        };
        match self.call(pdf, opts).await? {
            ConverterOutput::Markdown(md) => Ok(md),
            ConverterOutput::Chunks(value) => {
                warn!("Converter returned chunks for a whole-document request; joining pages");
                Ok(normalize_chunks(value)
                    .into_iter()
                    .map(|c| c.text)
                    .collect::<Vec<_>>()
                    .join("\n\n"))
            }
        }
    }

    /// Per-page chunks, with image writing and embedding forced off.
    pub async fn page_chunks(
        &self,
        pdf: &Path,
        options: &ConverterOptions,
    ) -> Result<Vec<PageChunk>, Pdf2MdError> {
        let opts = ConverterOptions {
            write_images: false,
            embed_images: false,
            image_output_path: None,
            page_chunks: true,
            ..options.clone()
        };
        match self.call(pdf, opts).await? {
            ConverterOutput::Chunks(value) => Ok(normalize_chunks(value)),
            ConverterOutput::Markdown(_) => {
                warn!("Converter returned plain Markdown for a chunked request; no pages");
                Ok(Vec::new())
            }
        }
    }

    /// Plain text, one entry per page.
    pub async fn extract_text(&self, pdf: &Path) -> Result<Vec<String>, Pdf2MdError> {
        let converter = Arc::clone(&self.converter);
        let path = pdf.to_path_buf();
        tokio::task::spawn_blocking(move || converter.extract_text(&path))
            .await
            .map_err(|e| Pdf2MdError::Internal(format!("Text extraction task panicked: {e}")))?
            .map_err(conversion_failed)
    }

    async fn call(
        &self,
        pdf: &Path,
        options: ConverterOptions,
    ) -> Result<ConverterOutput, Pdf2MdError> {
        match self.run_blocking(pdf, options.clone()).await? {
            Ok(out) => Ok(out),
            Err(e) if e.is_empty_extremum() && options.header_inference => {
                warn!("{e}; retrying once without header inference");
                let retry = ConverterOptions {
                    header_inference: false,
                    ..options
                };
                self.run_blocking(pdf, retry).await?.map_err(conversion_failed)
            }
            Err(e) => Err(conversion_failed(e)),
        }
    }

    async fn run_blocking(
        &self,
        pdf: &Path,
        options: ConverterOptions,
    ) -> Result<Result<ConverterOutput, ConverterError>, Pdf2MdError> {
        let converter = Arc::clone(&self.converter);
        let path = pdf.to_path_buf();
        tokio::task::spawn_blocking(move || converter.to_markdown(&path, &options))
            .await
            .map_err(|e| Pdf2MdError::Internal(format!("Converter task panicked: {e}")))
    }
}

fn conversion_failed(e: ConverterError) -> Pdf2MdError {
    Pdf2MdError::ConversionFailed {
        reason: e.to_string(),
    }
}

/// Parse a loosely typed chunk list into ordered [`PageChunk`]s.
pub fn normalize_chunks(value: Value) -> Vec<PageChunk> {
    let Value::Array(items) = value else {
        if !value.is_null() {
            warn!("Discarding non-array chunk result");
        }
        return Vec::new();
    };

    let total = items.len();
    let chunks: Vec<PageChunk> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(record) => Some(record),
            other => {
                debug!("Dropping non-record chunk entry: {other}");
                None
            }
        })
        .enumerate()
        .map(|(i, mut record)| {
            let text = match record.remove("text") {
                Some(Value::String(s)) => s,
                None | Some(Value::Null) => String::new(),
                Some(other) => other.to_string(),
            };
            let metadata = match record.remove("metadata") {
                Some(Value::Object(m)) => m,
                _ => Map::new(),
            };
            PageChunk {
                index: i + 1,
                text,
                metadata,
            }
        })
        .collect();

    if chunks.len() != total {
        warn!("Dropped {} malformed chunk entries", total - chunks.len());
    }
    chunks
}
