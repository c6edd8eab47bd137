//! Output types: page chunks, the manifest and the inline response body.

use crate::workspace::{IMAGES_DIR, PAGES_DIR, PAGES_HTML_DIR};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// File name of the full-document Markdown inside the artifacts root.
pub const FULL_MARKDOWN: &str = "full.md";
/// File name of the full-document HTML inside the artifacts root.
pub const FULL_HTML: &str = "full.html";
/// File name of the manifest inside the artifacts root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// One page of converted output, in natural document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageChunk {
    /// 1-based page index.
    pub index: usize,
    /// Markdown for the page.
    pub text: String,
    /// Converter-supplied metadata, passed through untouched.
    pub metadata: Map<String, Value>,
}

/// Relative paths of the artifacts, keyed by logical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFiles {
    pub full_markdown: String,
    pub full_html: String,
    pub pages_dir: String,
    pub pages_html_dir: String,
    pub images_dir: String,
}

impl Default for ManifestFiles {
    fn default() -> Self {
        Self {
            full_markdown: FULL_MARKDOWN.to_string(),
            full_html: FULL_HTML.to_string(),
            pages_dir: format!("{PAGES_DIR}/"),
            pages_html_dir: format!("{PAGES_HTML_DIR}/"),
            images_dir: format!("{IMAGES_DIR}/"),
        }
    }
}

/// Description of a completed job's artifact set.
///
/// Persisted as `manifest.json` in the archive and returned inline in JSON
/// mode. Every field describes what is actually on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub job_id: String,
    pub filename: String,
    pub dpi: u32,
    pub force_text: bool,
    pub write_images: bool,
    pub embed_images: bool,
    pub layout_active: bool,
    pub page_count: usize,
    /// Image file names present in `images/`, sorted lexically.
    pub images: Vec<String>,
    pub files: ManifestFiles,
}

/// One page as delivered in the inline response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_number: usize,
    pub markdown: String,
    pub html: String,
    pub metadata: Map<String, Value>,
}

/// Body of a successful `response_format=json` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineResponse {
    pub manifest: Manifest,
    pub full_markdown: String,
    pub full_html: String,
    pub layout_active: bool,
    pub pages: Vec<PageRecord>,
    pub embedded_images: bool,
}

/// `page-0001`, `page-0002`, ... (zero-padded so names sort lexically).
pub fn page_stem(index: usize) -> String {
    format!("page-{index:04}")
}
