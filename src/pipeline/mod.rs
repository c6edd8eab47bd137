//! Pipeline stages for PDF-to-bundle conversion.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested on its own and the converter behind [`adapter`] can be swapped
//! without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ adapter ──▶ render ──▶ materialize ──▶ package
//! (bytes)   (converter)  (HTML)    (files+manifest) (zip / inline)
//! ```
//!
//! 1. [`input`]       — resolve a path, URL, base64 payload or structured
//!    reference to document bytes
//! 2. [`adapter`]     — drive the converter twice (full document, per page)
//!    with the empty-extremum retry and the layout gate; converter calls run
//!    in `spawn_blocking` because pdfium is not async-safe
//! 3. [`render`]      — Markdown → HTML with a fixed extension set
//! 4. [`materialize`] — write `full.*`, `pages/`, `pages_html/` and
//!    `manifest.json`
//! 5. [`package`]     — zip the artifacts directory or build the inline body
//!
//! [`postprocess`] and [`encode`] are helpers used by the pdfium converter
//! (Markdown cleanup, image data URIs) and by the input resolver (base64).

pub mod adapter;
pub mod encode;
pub mod input;
pub mod materialize;
pub mod package;
pub mod postprocess;
pub mod render;
