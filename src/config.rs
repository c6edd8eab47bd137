//! Configuration types for artifact-bundle jobs and the service around them.
//!
//! Per-job behaviour is controlled through [`ConversionOptions`], built via
//! [`ConversionOptionsBuilder`]. Process-wide settings (listen address,
//! workspace root, download timeout, converter library path) live in
//! [`ServiceConfig`].

use crate::error::Pdf2MdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Options for one conversion job.
///
/// # Example
/// ```rust
/// use edgequake_pdf2md_bundle::{ConversionOptions, ResponseFormat};
///
/// let options = ConversionOptions::builder()
///     .dpi(200)
///     .write_images(false)
///     .embed_images(true)
///     .response_format(ResponseFormat::Inline)
///     .build()
///     .unwrap();
/// assert!(options.embed_images);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Rendering resolution for extracted images. Must be positive. Default: 150.
    pub dpi: u32,

    /// Keep text even when it overlaps images or graphics. Default: true.
    pub force_text: bool,

    /// Write extracted images into the artifact `images/` directory. Default: true.
    pub write_images: bool,

    /// Embed images as base64 data URIs in the Markdown. Default: false.
    ///
    /// Mutually exclusive with `write_images`.
    pub embed_images: bool,

    /// Request the optional layout-analysis mode. Default: false.
    pub use_layout: bool,

    /// How the artifacts are delivered. Default: [`ResponseFormat::Archive`].
    pub response_format: ResponseFormat,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            dpi: 150,
            force_text: true,
            write_images: true,
            embed_images: false,
            use_layout: false,
            response_format: ResponseFormat::default(),
        }
    }
}

impl ConversionOptions {
    /// Create a new builder for `ConversionOptions`.
    pub fn builder() -> ConversionOptionsBuilder {
        ConversionOptionsBuilder {
            options: Self::default(),
        }
    }

    /// Check the cross-field invariants.
    ///
    /// Runs before any workspace is allocated or any conversion is attempted.
    pub fn validate(&self) -> Result<(), Pdf2MdError> {
        if self.dpi == 0 {
            return Err(Pdf2MdError::InvalidConfig(
                "dpi must be a positive integer".into(),
            ));
        }
        if self.write_images && self.embed_images {
            return Err(Pdf2MdError::ConflictingImageOptions);
        }
        Ok(())
    }
}

/// Builder for [`ConversionOptions`].
#[derive(Debug)]
pub struct ConversionOptionsBuilder {
    options: ConversionOptions,
}

impl ConversionOptionsBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.options.dpi = dpi;
        self
    }

    pub fn force_text(mut self, v: bool) -> Self {
        self.options.force_text = v;
        self
    }

    pub fn write_images(mut self, v: bool) -> Self {
        self.options.write_images = v;
        self
    }

    pub fn embed_images(mut self, v: bool) -> Self {
        self.options.embed_images = v;
        self
    }

    pub fn use_layout(mut self, v: bool) -> Self {
        self.options.use_layout = v;
        self
    }

    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.options.response_format = format;
        self
    }

    /// Build the options, validating constraints.
    pub fn build(self) -> Result<ConversionOptions, Pdf2MdError> {
        self.options.validate()?;
        Ok(self.options)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Delivery envelope for a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// A zip archive streamed as an attachment. (default)
    #[default]
    #[serde(rename = "zip")]
    Archive,
    /// One JSON document carrying every artifact inline.
    #[serde(rename = "json")]
    Inline,
}

impl FromStr for ResponseFormat {
    type Err = Pdf2MdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zip" => Ok(ResponseFormat::Archive),
            "json" => Ok(ResponseFormat::Inline),
            other => Err(Pdf2MdError::InvalidConfig(format!(
                "response_format must be 'zip' or 'json', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseFormat::Archive => f.write_str("zip"),
            ResponseFormat::Inline => f.write_str("json"),
        }
    }
}

/// Parse a form-style boolean (`true/false`, `1/0`, `yes/no`, `on/off`).
pub fn parse_bool(field: &str, value: &str) -> Result<bool, Pdf2MdError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        other => Err(Pdf2MdError::InvalidConfig(format!(
            "{field} must be a boolean, got '{other}'"
        ))),
    }
}

// ── Service configuration ────────────────────────────────────────────────

/// Process-wide settings shared by the HTTP and tool front ends.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to. Default: `0.0.0.0:8000`.
    pub bind: SocketAddr,

    /// Parent directory for job workspaces. `None` uses the system temp dir.
    pub workspace_root: Option<PathBuf>,

    /// Timeout for remote URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Largest accepted request body in bytes. Default: 100 MiB.
    pub max_upload_bytes: usize,

    /// Explicit pdfium shared-library path. `None` searches `./` then the system.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            workspace_root: None,
            download_timeout_secs: 60,
            max_upload_bytes: 100 * 1024 * 1024,
            pdfium_lib_path: None,
        }
    }
}
