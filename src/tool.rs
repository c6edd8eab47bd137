//! Plugin tool surface.
//!
//! The tool accepts the PDF in one of several shapes and answers with a
//! sequence of messages: zero or more image blobs (sorted by filename,
//! at most `max_images`), then one JSON result. It never fails: any error
//! becomes a single `{"error": "..."}` JSON message.
//!
//! ## Parameters
//!
//! | Name | Type | Default |
//! |------|------|---------|
//! | `pdf_file` | path string or file object | – |
//! | `pdf_path` | string | – |
//! | `pdf_url` | `http(s)://` string | – |
//! | `pdf_base64` | string, optional data-URI prefix | – |
//! | `dpi` | integer | 150 |
//! | `extract_images` | bool-ish | false |
//! | `image_format` | string | `"png"` |
//! | `max_images` | integer ≥ 1 | 30 |
//!
//! Hosts send loosely typed values (numbers as strings, booleans as
//! `"yes"`), so every setting is coerced rather than strictly parsed.

use crate::convert::Pipeline;
use crate::converter::ConverterOptions;
use crate::error::Pdf2MdError;
use crate::pipeline::input::{DocumentSource, FileRef, InputResolver};
use crate::pipeline::materialize::list_files;
use crate::pipeline::render::markdown_to_html;
use crate::workspace::Workspace;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use std::path::Path;
use tracing::{info, warn};

const DEFAULT_DPI: u32 = 150;
const DEFAULT_IMAGE_FORMAT: &str = "png";
const DEFAULT_MAX_IMAGES: usize = 30;

/// Raw tool parameters, exactly as the host sent them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolParameters {
    #[serde(default)]
    pub pdf_file: Value,
    #[serde(default)]
    pub pdf_path: Value,
    #[serde(default)]
    pub pdf_url: Value,
    #[serde(default)]
    pub pdf_base64: Value,
    #[serde(default)]
    pub dpi: Value,
    #[serde(default)]
    pub extract_images: Value,
    #[serde(default)]
    pub image_format: Value,
    #[serde(default)]
    pub max_images: Value,
    /// In-process callers can hand the document over directly.
    #[serde(skip)]
    pub pdf_file_bytes: Option<Vec<u8>>,
}

impl ToolParameters {
    /// Candidate sources in resolution order.
    pub fn sources(&self) -> Vec<DocumentSource> {
        let mut file_ref = FileRef::from_value(&self.pdf_file);
        file_ref.bytes = self.pdf_file_bytes.clone();

        let mut sources = vec![DocumentSource::StructuredRef(file_ref)];
        if let Some(p) = self.pdf_path.as_str().map(str::trim) {
            sources.push(DocumentSource::LocalPath(p.into()));
        }
        if let Some(u) = self.pdf_url.as_str() {
            sources.push(DocumentSource::RemoteUrl(u.to_string()));
        }
        if let Some(b) = self.pdf_base64.as_str() {
            sources.push(DocumentSource::Base64Payload(b.to_string()));
        }
        sources
    }
}

/// Coerced tool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub dpi: u32,
    pub extract_images: bool,
    pub image_format: String,
    pub max_images: usize,
}

impl ToolSettings {
    pub fn from_parameters(params: &ToolParameters) -> Result<Self, Pdf2MdError> {
        let dpi = match coerce_int("dpi", &params.dpi)? {
            None | Some(0) => DEFAULT_DPI,
            Some(n) if n < 0 => {
                return Err(Pdf2MdError::InvalidConfig(format!(
                    "dpi must be a positive integer, got {n}"
                )))
            }
            Some(n) => u32::try_from(n)
                .map_err(|_| Pdf2MdError::InvalidConfig(format!("dpi {n} is out of range")))?,
        };
        let max_images = match coerce_int("max_images", &params.max_images)? {
            None | Some(0) => DEFAULT_MAX_IMAGES,
            Some(n) => usize::try_from(n.max(1)).unwrap_or(usize::MAX),
        };
        let image_format = match &params.image_format {
            Value::String(s) => s.trim().to_lowercase(),
            Value::Null => String::new(),
            other => other.to_string().to_lowercase(),
        };
        let image_format = if image_format.is_empty() {
            DEFAULT_IMAGE_FORMAT.to_string()
        } else {
            image_format
        };

        Ok(Self {
            dpi,
            extract_images: coerce_bool(&params.extract_images, false),
            image_format,
            max_images,
        })
    }
}

/// Truthiness the way plugin hosts send it.
pub fn coerce_bool(value: &Value, default: bool) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => default,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        _ => default,
    }
}

fn coerce_int(field: &str, value: &Value) -> Result<Option<i64>, Pdf2MdError> {
    let invalid = || Pdf2MdError::InvalidConfig(format!("{field} must be an integer, got {value}"));
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(i64::from(*b))),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(Some)
            .ok_or_else(invalid),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// One message emitted by the tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolMessage {
    Blob {
        #[serde(serialize_with = "as_base64")]
        blob: Vec<u8>,
        filename: String,
        mime_type: String,
    },
    Json {
        message: Value,
    },
}

impl ToolMessage {
    pub fn error(detail: impl Into<String>) -> Self {
        ToolMessage::Json {
            message: json!({ "error": detail.into() }),
        }
    }
}

fn as_base64<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&STANDARD.encode(bytes))
}

/// The tool: parameters in, messages out.
#[derive(Clone)]
pub struct PdfTool {
    pipeline: Pipeline,
    resolver: InputResolver,
}

impl PdfTool {
    pub fn new(pipeline: Pipeline, resolver: InputResolver) -> Self {
        Self { pipeline, resolver }
    }

    /// Run the tool. Failures are reported as a single error message.
    pub async fn invoke(&self, params: &ToolParameters) -> Vec<ToolMessage> {
        match self.run(params).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Tool invocation failed: {}", e);
                vec![ToolMessage::error(e.to_string())]
            }
        }
    }

    async fn run(&self, params: &ToolParameters) -> Result<Vec<ToolMessage>, Pdf2MdError> {
        let bytes = self.resolver.resolve(&params.sources()).await?;
        let settings = ToolSettings::from_parameters(params)?;
        info!(
            "Tool invoked: {} bytes, dpi={}, extract_images={}",
            bytes.len(),
            settings.dpi,
            settings.extract_images
        );

        let workspace = self.pipeline.allocate_workspace()?;
        let result = self.convert(&workspace, &bytes, &settings).await;
        workspace.release();
        result
    }

    async fn convert(
        &self,
        workspace: &Workspace,
        bytes: &[u8],
        settings: &ToolSettings,
    ) -> Result<Vec<ToolMessage>, Pdf2MdError> {
        let input = workspace.input_path();
        tokio::fs::write(&input, bytes)
            .await
            .map_err(|e| Pdf2MdError::write_failed(&input, e))?;

        let images_dir = workspace.images_dir();
        let options = ConverterOptions {
            dpi: settings.dpi,
            write_images: settings.extract_images,
            image_output_path: Some(images_dir.clone()),
            image_format: settings.image_format.clone(),
            ..ConverterOptions::default()
        };

        let adapter = self.pipeline.adapter();
        let full_markdown = adapter.full_markdown(&input, &options).await?;
        let pages_markdown: Vec<String> = adapter
            .page_chunks(&input, &options)
            .await?
            .into_iter()
            .map(|c| c.text)
            .collect();
        let pages_html: Vec<String> = pages_markdown.iter().map(|md| markdown_to_html(md)).collect();
        let full_html = markdown_to_html(&full_markdown);

        let pages_text = adapter.extract_text(&input).await?;
        let full_text = pages_text.join("\n");

        let mut messages = Vec::new();
        let mut emitted = Vec::new();
        if settings.extract_images {
            for name in list_files(&images_dir)
                .await?
                .into_iter()
                .take(settings.max_images)
            {
                let path = images_dir.join(&name);
                let blob = tokio::fs::read(&path)
                    .await
                    .map_err(|e| Pdf2MdError::write_failed(&path, e))?;
                messages.push(ToolMessage::Blob {
                    blob,
                    mime_type: mime_type(&name, &settings.image_format),
                    filename: name.clone(),
                });
                emitted.push(name);
            }
        }

        let result = json!({
            "input": {
                "dpi": settings.dpi,
                "bytes": bytes.len(),
                "extract_images": settings.extract_images,
                "image_format": settings.image_format,
                "max_images": settings.max_images,
            },
            "output": {
                "markdown": { "full": full_markdown, "pages": pages_markdown },
                "text": { "full": full_text, "pages": pages_text },
                "html": { "full": full_html, "pages": pages_html },
                "images": { "count": emitted.len(), "names": emitted },
            },
        });
        messages.push(ToolMessage::Json { message: result });
        Ok(messages)
    }
}

/// `image/{extension}`, falling back to the requested format.
fn mime_type(filename: &str, image_format: &str) -> String {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| image_format.to_string());
    format!("image/{ext}")
}
