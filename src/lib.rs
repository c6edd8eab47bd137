//! # edgequake-pdf2md-bundle
//!
//! Convert a PDF into an artifact bundle: full-document Markdown and HTML,
//! per-page Markdown and HTML, extracted images and a manifest describing
//! all of it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Workspace  isolated per-job directory, always released
//!  ├─ 2. Convert    full document + per-page chunks (pdfium, spawn_blocking),
//!  │                one retry without heading inference on empty extremum
//!  ├─ 3. Render     Markdown → HTML (tables, footnotes, heading anchors)
//!  ├─ 4. Write      full.md, full.html, pages/, pages_html/, manifest.json
//!  └─ 5. Package    streamed zip (workspace released after transfer)
//!                   or inline JSON (workspace released immediately)
//! ```
//!
//! Two front ends drive the same pipeline: an HTTP service
//! ([`server::router`]) taking multipart uploads, and a plugin tool
//! ([`tool::PdfTool`]) taking a path, URL, base64 payload or file object.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2md_bundle::{
//!     ConversionOptions, ConverterAdapter, JobOutput, JobRequest, LayoutRegistry,
//!     Pipeline, PdfiumConverter, ResponseFormat,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = ConverterAdapter::new(
//!         Arc::new(PdfiumConverter::from_env()),
//!         Arc::new(LayoutRegistry::from_build()),
//!     );
//!     let pipeline = Pipeline::new(adapter, None);
//!
//!     let request = JobRequest {
//!         filename: "report.pdf".into(),
//!         bytes: std::fs::read("report.pdf")?,
//!         options: ConversionOptions::builder()
//!             .response_format(ResponseFormat::Inline)
//!             .build()?,
//!     };
//!     if let JobOutput::Inline(body) = pipeline.run(request).await? {
//!         println!("{}", body.full_markdown);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `pdf2md-bundle` binary (clap + anyhow + tracing-subscriber) |
//! | `layout` | off     | Makes `use_layout=true` available (reading-order text layout) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-pdf2md-bundle = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod converter;
pub mod error;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod stream;
pub mod tool;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionOptions, ConversionOptionsBuilder, ResponseFormat, ServiceConfig};
pub use convert::{JobOutput, JobRequest, Pipeline};
pub use converter::{
    ConverterError, ConverterOptions, ConverterOutput, DocumentConverter, PdfiumConverter,
};
pub use error::{ErrorClass, Pdf2MdError};
pub use layout::{Activation, LayoutRegistry};
pub use output::{InlineResponse, Manifest, ManifestFiles, PageChunk, PageRecord};
pub use pipeline::adapter::ConverterAdapter;
pub use pipeline::input::{DocumentSource, FileRef, InputResolver};
pub use stream::ArchiveDelivery;
pub use tool::{PdfTool, ToolMessage, ToolParameters};
pub use workspace::Workspace;
