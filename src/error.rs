//! Error types for the edgequake-pdf2md-bundle library.
//!
//! Two error types reflect two distinct boundaries:
//!
//! * [`Pdf2MdError`]: everything a caller of the job pipeline, the HTTP
//!   surface or the tool surface can observe. Every variant belongs to one
//!   [`ErrorClass`], which front ends map to a status (4xx for validation,
//!   5xx for conversion and resource failures).
//!
//! * [`crate::converter::ConverterError`]: failures reported by the
//!   document converter collaborator. The adapter recovers exactly one of
//!   them locally (the empty-extremum failure) and maps the rest to
//!   [`Pdf2MdError::ConversionFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used by front ends to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is wrong. Reported as a 4xx.
    Validation,
    /// The converter failed on an otherwise valid request. Reported as a 5xx.
    Conversion,
    /// Filesystem, network or packaging failure. Reported as a 5xx.
    Resource,
}

/// All errors returned by the edgequake-pdf2md-bundle library.
#[derive(Debug, Error)]
pub enum Pdf2MdError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// Upload filename does not carry a `.pdf` extension.
    #[error("Only PDF uploads are supported.")]
    UnsupportedFileType { filename: String },

    /// `write_images` and `embed_images` were both requested.
    #[error("Choose either write_images=true or embed_images=true, not both.")]
    ConflictingImageOptions,

    /// Option or form-field validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Layout mode was requested but the capability is not compiled in.
    #[error(
        "use_layout=true requested, but the layout-analysis capability is unavailable in this build.\n\
Rebuild with `--features layout` to enable it."
    )]
    LayoutUnavailable,

    /// None of the accepted input parameters yielded any bytes.
    #[error("No PDF input provided. Use one of: {}.", accepted.join(", "))]
    MissingInput { accepted: Vec<&'static str> },

    /// An explicit local path does not exist or is not a regular file.
    #[error("pdf_path not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// A base64 payload could not be decoded.
    #[error("Invalid pdf_base64 content: {reason}")]
    InvalidBase64 { reason: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The document converter failed and the failure was not recoverable.
    #[error("Processing failed: {reason}")]
    ConversionFailed { reason: String },

    // ── Resource errors ───────────────────────────────────────────────────
    /// Remote URL download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// Could not create a job workspace.
    #[error("Failed to allocate workspace under '{}': {source}", path.display())]
    WorkspaceFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read or write an artifact inside the workspace.
    #[error("Failed to write artifact '{}': {source}", path.display())]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Building the zip archive failed.
    #[error("Failed to build archive: {0}")]
    ArchiveFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2MdError {
    /// Classify this error for status mapping.
    pub fn class(&self) -> ErrorClass {
        match self {
            Pdf2MdError::UnsupportedFileType { .. }
            | Pdf2MdError::ConflictingImageOptions
            | Pdf2MdError::InvalidConfig(_)
            | Pdf2MdError::LayoutUnavailable
            | Pdf2MdError::MissingInput { .. }
            | Pdf2MdError::FileNotFound { .. }
            | Pdf2MdError::InvalidBase64 { .. } => ErrorClass::Validation,
            Pdf2MdError::ConversionFailed { .. } | Pdf2MdError::Internal(_) => {
                ErrorClass::Conversion
            }
            Pdf2MdError::DownloadFailed { .. }
            | Pdf2MdError::DownloadTimeout { .. }
            | Pdf2MdError::WorkspaceFailed { .. }
            | Pdf2MdError::OutputWriteFailed { .. }
            | Pdf2MdError::ArchiveFailed(_) => ErrorClass::Resource,
        }
    }

    /// `true` when the error is the caller's fault.
    pub fn is_validation(&self) -> bool {
        self.class() == ErrorClass::Validation
    }

    pub(crate) fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Pdf2MdError::OutputWriteFailed {
            path: path.into(),
            source,
        }
    }
}
