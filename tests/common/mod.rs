//! Shared fixtures for integration tests: a scriptable in-memory converter
//! and pipeline builders.

#![allow(dead_code)]

use edgequake_pdf2md_bundle::{
    ConverterAdapter, ConverterError, ConverterOptions, ConverterOutput, DocumentConverter,
    LayoutRegistry, Pipeline,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Minimal bytes that pass as an uploaded PDF for the fake converter.
pub const PDF_BYTES: &[u8] = b"%PDF-1.7\n%fake\n";

/// A failure to inject before the converter starts succeeding.
#[derive(Debug, Clone)]
pub enum Scripted {
    EmptyExtremum,
    Fail(&'static str),
}

/// Converter that returns canned pages and records every call.
#[derive(Debug, Default)]
pub struct FakeConverter {
    pages: Vec<String>,
    images: Vec<String>,
    chunks_override: Option<Value>,
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<ConverterOptions>>,
    layout_notifications: AtomicUsize,
}

impl FakeConverter {
    pub fn with_pages(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Image files written to `image_output_path` when `write_images` is on.
    pub fn images(mut self, names: &[&str]) -> Self {
        self.images = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Raw value returned for chunked requests instead of the canned pages.
    pub fn chunks(mut self, value: Value) -> Self {
        self.chunks_override = Some(value);
        self
    }

    /// Failures returned, in order, by the next `to_markdown` calls.
    pub fn script(self, steps: &[Scripted]) -> Self {
        *self.script.lock().unwrap() = steps.iter().cloned().collect();
        self
    }

    pub fn calls(&self) -> Vec<ConverterOptions> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn layout_notifications(&self) -> usize {
        self.layout_notifications.load(Ordering::SeqCst)
    }
}

impl DocumentConverter for FakeConverter {
    fn to_markdown(
        &self,
        path: &Path,
        options: &ConverterOptions,
    ) -> Result<ConverterOutput, ConverterError> {
        self.calls.lock().unwrap().push(options.clone());
        std::fs::metadata(path)?;

        if let Some(step) = self.script.lock().unwrap().pop_front() {
            return Err(match step {
                Scripted::EmptyExtremum => ConverterError::EmptyExtremum {
                    stage: "header inference",
                },
                Scripted::Fail(reason) => ConverterError::Corrupt {
                    detail: reason.to_string(),
                },
            });
        }

        if options.page_chunks {
            let value = self.chunks_override.clone().unwrap_or_else(|| {
                Value::Array(
                    self.pages
                        .iter()
                        .enumerate()
                        .map(|(i, text)| json!({"text": text, "metadata": {"page": i + 1}}))
                        .collect(),
                )
            });
            return Ok(ConverterOutput::Chunks(value));
        }

        let mut markdown = self.pages.join("\n\n");
        if options.write_images {
            if let Some(dir) = &options.image_output_path {
                for name in &self.images {
                    std::fs::write(dir.join(name), format!("image {name}"))?;
                    markdown.push_str(&format!("\n\n![]({}/{name})", dir.display()));
                }
            }
        }
        if options.embed_images && !self.images.is_empty() {
            markdown.push_str("\n\n![](data:image/png;base64,iVBORw0KGgo=)");
        }
        Ok(ConverterOutput::Markdown(markdown))
    }

    fn extract_text(&self, path: &Path) -> Result<Vec<String>, ConverterError> {
        std::fs::metadata(path)?;
        Ok(self
            .pages
            .iter()
            .map(|p| p.trim_start_matches('#').trim().to_string())
            .collect())
    }

    fn on_layout_activated(&self) {
        self.layout_notifications.fetch_add(1, Ordering::SeqCst);
    }
}

/// Pipeline over `fake` with workspaces under `root`.
pub fn pipeline(fake: &Arc<FakeConverter>, layout_available: bool, root: &Path) -> Pipeline {
    let converter: Arc<dyn DocumentConverter> = fake.clone();
    let adapter = ConverterAdapter::new(converter, Arc::new(LayoutRegistry::new(layout_available)));
    Pipeline::new(adapter, Some(root.to_path_buf()))
}

/// Number of entries left directly under `root`.
pub fn leftover_entries(root: &Path) -> usize {
    std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
}

/// Read every file of a zip into `(name, contents)` pairs, in archive order.
pub fn unzip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut f = archive.by_index(i).unwrap();
        if f.is_dir() {
            continue;
        }
        let mut buf = Vec::new();
        f.read_to_end(&mut buf).unwrap();
        out.push((f.name().to_string(), buf));
    }
    out
}

/// Look up a file from [`unzip`] output as UTF-8.
pub fn entry<'a>(files: &'a [(String, Vec<u8>)], name: &str) -> &'a str {
    let (_, bytes) = files
        .iter()
        .find(|(n, _)| n == name)
        .unwrap_or_else(|| panic!("{name} missing from archive"));
    std::str::from_utf8(bytes).unwrap()
}
