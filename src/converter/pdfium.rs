//! pdfium-backed [`DocumentConverter`].
//!
//! Each page is read as a list of positioned text runs and image
//! placements. Markdown is produced by grouping runs into lines and
//! paragraphs; heading levels come from font sizes relative to the
//! dominant body size.
//!
//! pdfium is not async-safe, so every call here is blocking and is expected
//! to run on a `spawn_blocking` thread.

use super::{ConverterError, ConverterOptions, ConverterOutput, DocumentConverter};
use crate::pipeline::{encode, postprocess};
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Highest Markdown heading level emitted.
const MAX_HEADING_LEVELS: usize = 6;

/// Converter that reads PDFs through the pdfium library.
#[derive(Debug, Default)]
pub struct PdfiumConverter {
    library_path: Option<PathBuf>,
    reading_order: AtomicBool,
}

impl PdfiumConverter {
    /// Bind to `./libpdfium` or the system library on each call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to an explicit pdfium shared library.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
            reading_order: AtomicBool::new(false),
        }
    }

    /// Honour `PDFIUM_LIB_PATH` when set.
    pub fn from_env() -> Self {
        match std::env::var("PDFIUM_LIB_PATH") {
            Ok(p) if !p.is_empty() => Self::with_library_path(p),
            _ => Self::new(),
        }
    }

    fn bind(&self) -> Result<Pdfium, ConverterError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| {
            ConverterError::Engine(format!(
                "failed to bind pdfium: {e:?}. Set PDFIUM_LIB_PATH=/path/to/libpdfium"
            ))
        })?;
        Ok(Pdfium::new(bindings))
    }

    fn layout_active(&self) -> bool {
        self.reading_order.load(Ordering::Acquire)
    }
}

fn load_document<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, ConverterError> {
    pdfium.load_pdf_from_file(path, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            ConverterError::PasswordRequired
        } else {
            ConverterError::Corrupt { detail: err_str }
        }
    })
}

impl DocumentConverter for PdfiumConverter {
    fn to_markdown(
        &self,
        path: &Path,
        options: &ConverterOptions,
    ) -> Result<ConverterOutput, ConverterError> {
        let pdfium = self.bind()?;
        let document = load_document(&pdfium, path)?;
        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let want_images = options.write_images || options.embed_images;
        let mut contents = Vec::with_capacity(total_pages);
        for (index, page) in pages.iter().enumerate() {
            let mut content = read_page(&page, want_images, index + 1)?;
            if !options.force_text {
                content.drop_text_under_images();
            }
            if self.layout_active() {
                content.sort_reading_order();
            }
            contents.push(content);
        }

        let levels = if options.header_inference {
            HeadingLevels::infer(&contents)?
        } else {
            HeadingLevels::default()
        };

        let doc_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let mut page_markdown = Vec::with_capacity(contents.len());
        for (index, content) in contents.iter().enumerate() {
            let image_refs = emit_images(content, index, &doc_name, options)?;
            let md = render_page(&content.runs, &levels, &image_refs);
            page_markdown.push(postprocess::clean_markdown(&md));
        }

        if options.page_chunks {
            let chunks: Vec<serde_json::Value> = page_markdown
                .into_iter()
                .enumerate()
                .map(|(i, text)| {
                    json!({
                        "metadata": {
                            "file_path": path.display().to_string(),
                            "page": i + 1,
                            "page_count": total_pages,
                        },
                        "text": text,
                    })
                })
                .collect();
            return Ok(ConverterOutput::Chunks(serde_json::Value::Array(chunks)));
        }

        Ok(ConverterOutput::Markdown(postprocess::clean_markdown(
            &page_markdown.join("\n\n"),
        )))
    }

    fn extract_text(&self, path: &Path) -> Result<Vec<String>, ConverterError> {
        let pdfium = self.bind()?;
        let document = load_document(&pdfium, path)?;
        document
            .pages()
            .iter()
            .enumerate()
            .map(|(index, page)| {
                page.text()
                    .map(|t| postprocess::normalise_line_endings(&t.all()))
                    .map_err(|e| ConverterError::Engine(format!("page {}: {:?}", index + 1, e)))
            })
            .collect()
    }

    fn on_layout_activated(&self) {
        self.reading_order.store(true, Ordering::Release);
        info!("Layout analysis enabled: text is ordered top-to-bottom, left-to-right");
    }
}

// ── Page model ───────────────────────────────────────────────────────────

/// Axis-aligned bounds in PDF points (y grows upwards).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    left: f32,
    bottom: f32,
    right: f32,
    top: f32,
}

impl Rect {
    fn contains_centre_of(&self, other: &Rect) -> bool {
        let cx = (other.left + other.right) / 2.0;
        let cy = (other.bottom + other.top) / 2.0;
        cx >= self.left && cx <= self.right && cy >= self.bottom && cy <= self.top
    }

    fn width(&self) -> f32 {
        (self.right - self.left).abs()
    }

    fn height(&self) -> f32 {
        (self.top - self.bottom).abs()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TextRun {
    text: String,
    size: f32,
    rect: Rect,
}

struct PlacedImage {
    rect: Rect,
    image: Option<DynamicImage>,
}

#[derive(Default)]
struct PageContent {
    runs: Vec<TextRun>,
    images: Vec<PlacedImage>,
}

impl PageContent {
    fn drop_text_under_images(&mut self) {
        let images: Vec<Rect> = self.images.iter().map(|i| i.rect).collect();
        self.runs
            .retain(|run| !images.iter().any(|img| img.contains_centre_of(&run.rect)));
    }

    fn sort_reading_order(&mut self) {
        sort_reading_order(&mut self.runs);
    }
}

fn sort_reading_order(runs: &mut [TextRun]) {
    runs.sort_by(|a, b| {
        let ta = a.rect.top.round();
        let tb = b.rect.top.round();
        tb.total_cmp(&ta).then(a.rect.left.total_cmp(&b.rect.left))
    });
}

fn read_page(page: &PdfPage, want_images: bool, page_num: usize) -> Result<PageContent, ConverterError> {
    let mut content = PageContent::default();

    for object in page.objects().iter() {
        let rect = match object.bounds() {
            Ok(b) => Rect {
                left: b.left().value,
                bottom: b.bottom().value,
                right: b.right().value,
                top: b.top().value,
            },
            Err(e) => {
                debug!("Page {}: skipping object without bounds: {:?}", page_num, e);
                continue;
            }
        };

        if let Some(text) = object.as_text_object() {
            content.runs.push(TextRun {
                text: text.text(),
                size: text.scaled_font_size().value,
                rect,
            });
        } else if let Some(img) = object.as_image_object() {
            let image = if want_images {
                match img.get_raw_image() {
                    Ok(i) => Some(i),
                    Err(e) => {
                        warn!("Page {}: could not decode image: {:?}", page_num, e);
                        None
                    }
                }
            } else {
                None
            };
            content.images.push(PlacedImage { rect, image });
        }
    }

    debug!(
        "Page {}: {} text runs, {} images",
        page_num,
        content.runs.len(),
        content.images.len()
    );
    Ok(content)
}

// ── Heading inference ────────────────────────────────────────────────────

/// Font sizes are bucketed to half points.
fn size_key(size: f32) -> u32 {
    (size * 2.0).round().max(0.0) as u32
}

/// Font-size buckets that map to heading levels, largest first.
#[derive(Debug, Default, Clone, PartialEq)]
struct HeadingLevels {
    sizes: Vec<u32>,
}

impl HeadingLevels {
    fn infer(pages: &[PageContent]) -> Result<Self, ConverterError> {
        Self::from_runs(pages.iter().flat_map(|p| p.runs.iter()))
    }

    fn from_runs<'a>(runs: impl Iterator<Item = &'a TextRun>) -> Result<Self, ConverterError> {
        let mut weights: BTreeMap<u32, usize> = BTreeMap::new();
        for run in runs {
            let chars = run.text.trim().chars().count();
            if chars > 0 {
                *weights.entry(size_key(run.size)).or_default() += chars;
            }
        }

        let body = weights
            .iter()
            .max_by_key(|(size, weight)| (**weight, **size))
            .map(|(size, _)| *size)
            .ok_or(ConverterError::EmptyExtremum {
                stage: "header inference",
            })?;

        let sizes = weights
            .keys()
            .rev()
            .filter(|s| **s > body)
            .take(MAX_HEADING_LEVELS)
            .copied()
            .collect();
        Ok(Self { sizes })
    }

    fn level(&self, size: f32) -> Option<usize> {
        let key = size_key(size);
        self.sizes.iter().position(|s| *s == key).map(|i| i + 1)
    }
}

// ── Markdown assembly ────────────────────────────────────────────────────

struct Line {
    level: Option<usize>,
    text: String,
    size: f32,
    rect: Rect,
}

fn group_lines(runs: &[TextRun], levels: &HeadingLevels) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    for run in runs {
        let text = run.text.trim();
        if text.is_empty() {
            continue;
        }
        let level = levels.level(run.size);
        let tolerance = run.size.max(1.0) * 0.5;
        match lines.last_mut() {
            Some(line)
                if line.level == level && (line.rect.bottom - run.rect.bottom).abs() < tolerance =>
            {
                line.text.push(' ');
                line.text.push_str(text);
                line.rect.right = line.rect.right.max(run.rect.right);
                line.rect.top = line.rect.top.max(run.rect.top);
            }
            _ => lines.push(Line {
                level,
                text: text.to_string(),
                size: run.size,
                rect: run.rect,
            }),
        }
    }
    lines
}

fn render_page(runs: &[TextRun], levels: &HeadingLevels, image_refs: &[String]) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut paragraph = String::new();
    let mut previous: Option<Rect> = None;

    for line in group_lines(runs, levels) {
        if let Some(level) = line.level {
            if !paragraph.is_empty() {
                blocks.push(std::mem::take(&mut paragraph));
            }
            blocks.push(format!("{} {}", "#".repeat(level), line.text));
            previous = None;
            continue;
        }

        let tight = previous
            .map(|prev| (prev.bottom - line.rect.top) <= line.size.max(1.0))
            .unwrap_or(false);
        if !paragraph.is_empty() {
            if tight {
                paragraph.push('\n');
            } else {
                blocks.push(std::mem::take(&mut paragraph));
            }
        }
        paragraph.push_str(&line.text);
        previous = Some(line.rect);
    }
    if !paragraph.is_empty() {
        blocks.push(paragraph);
    }

    blocks.extend(image_refs.iter().map(|r| format!("![]({r})")));
    blocks.join("\n\n")
}

// ── Images ───────────────────────────────────────────────────────────────

/// `{doc}-{page0}-{idx}.{ext}`, the name images are written under.
fn image_file_name(doc_name: &str, page_index: usize, image_index: usize, ext: &str) -> String {
    format!("{doc_name}-{page_index}-{image_index}.{ext}")
}

/// Downscale an image to its on-page size at `dpi`. Never upscales.
fn fit_to_dpi(image: DynamicImage, rect: &Rect, dpi: u32) -> DynamicImage {
    let scale = dpi as f32 / 72.0;
    let target_w = (rect.width() * scale).round().max(1.0) as u32;
    let target_h = (rect.height() * scale).round().max(1.0) as u32;
    if image.width() > target_w && image.height() > target_h {
        image.resize(target_w, target_h, FilterType::Lanczos3)
    } else {
        image
    }
}

/// Write or embed a page's images; returns the Markdown link targets.
fn emit_images(
    content: &PageContent,
    page_index: usize,
    doc_name: &str,
    options: &ConverterOptions,
) -> Result<Vec<String>, ConverterError> {
    let mut refs = Vec::new();
    let page_num = page_index + 1;

    for (image_index, placed) in content.images.iter().enumerate() {
        let Some(raw) = placed.image.clone() else {
            continue;
        };
        let image = fit_to_dpi(raw, &placed.rect, options.dpi);

        if options.embed_images {
            let uri = encode::data_uri(&image).map_err(|e| ConverterError::Image {
                page: page_num,
                detail: e.to_string(),
            })?;
            refs.push(uri);
        } else if options.write_images {
            let Some(dir) = options.image_output_path.as_deref() else {
                continue;
            };
            let ext = options.image_format.to_ascii_lowercase();
            let format = ImageFormat::from_extension(&ext).ok_or_else(|| ConverterError::Image {
                page: page_num,
                detail: format!("unsupported image format '{ext}'"),
            })?;
            let name = image_file_name(doc_name, page_index, image_index, &ext);
            let target = dir.join(&name);
            let image = match format {
                ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
                _ => image,
            };
            image
                .save_with_format(&target, format)
                .map_err(|e| ConverterError::Image {
                    page: page_num,
                    detail: e.to_string(),
                })?;
            debug!("Wrote image {}", target.display());

            let dir_name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            refs.push(if dir_name.is_empty() {
                name
            } else {
                format!("{dir_name}/{name}")
            });
        }
    }
    Ok(refs)
}
