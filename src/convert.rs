//! Job orchestration: one uploaded PDF in, one artifact bundle out.
//!
//! [`Pipeline::run`] drives every stage for a single job:
//!
//! ```text
//! validate ──▶ layout gate ──▶ allocate workspace ──▶ write input.pdf
//!    ──▶ convert (full + chunks) ──▶ materialize ──▶ package
//! ```
//!
//! Validation and the layout gate run before any workspace exists, so a
//! rejected request never touches the filesystem. Once the workspace is
//! allocated, every error path releases it before the error is returned.
//! In inline mode the workspace is released as soon as the response body is
//! built; in archive mode ownership moves into the [`ArchiveDelivery`],
//! which releases it when the transfer ends.

use crate::config::{ConversionOptions, ResponseFormat};
use crate::converter::ConverterOptions;
use crate::error::Pdf2MdError;
use crate::output::InlineResponse;
use crate::pipeline::adapter::ConverterAdapter;
use crate::pipeline::materialize::{materialize, Artifacts};
use crate::pipeline::package::{build_archive, inline_response};
use crate::stream::ArchiveDelivery;
use crate::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One conversion request.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Original upload filename. Must end in `.pdf`.
    pub filename: String,
    pub bytes: Vec<u8>,
    pub options: ConversionOptions,
}

/// How a finished job is handed back.
#[derive(Debug)]
pub enum JobOutput {
    /// A zip waiting to be streamed; owns the workspace until sent.
    Archive(ArchiveDelivery),
    /// The complete structured body; the workspace is already gone.
    Inline(InlineResponse),
}

/// The job pipeline shared by all front ends.
#[derive(Clone)]
pub struct Pipeline {
    adapter: ConverterAdapter,
    workspace_root: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(adapter: ConverterAdapter, workspace_root: Option<PathBuf>) -> Self {
        Self {
            adapter,
            workspace_root,
        }
    }

    pub fn adapter(&self) -> &ConverterAdapter {
        &self.adapter
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace_root.as_deref()
    }

    /// Allocate a workspace under the configured root with a fresh job id.
    pub fn allocate_workspace(&self) -> Result<Workspace, Pdf2MdError> {
        Workspace::allocate(self.workspace_root(), &new_job_id())
    }

    /// Run one job to completion.
    pub async fn run(&self, request: JobRequest) -> Result<JobOutput, Pdf2MdError> {
        let JobRequest {
            filename,
            bytes,
            options,
        } = request;

        options.validate()?;
        check_pdf_filename(&filename)?;
        let layout_active = self.adapter.activate_layout(options.use_layout)?;

        let start = Instant::now();
        let workspace = self.allocate_workspace()?;
        info!(
            "Job {} started: {} ({} bytes, format={})",
            workspace.job_id(),
            filename,
            bytes.len(),
            options.response_format
        );

        let artifacts = match self
            .execute(&workspace, &filename, &bytes, &options, layout_active)
            .await
        {
            Ok(a) => a,
            Err(e) => {
                warn!("Job {} failed: {}", workspace.job_id(), e);
                workspace.release();
                return Err(e);
            }
        };

        let output = match options.response_format {
            ResponseFormat::Inline => {
                let body = inline_response(artifacts, options.embed_images);
                workspace.release();
                JobOutput::Inline(body)
            }
            ResponseFormat::Archive => {
                match build_archive(&workspace.artifacts_dir(), &workspace.archive_path()).await {
                    Ok(size) => JobOutput::Archive(ArchiveDelivery::new(
                        workspace,
                        attachment_name(&filename),
                        size,
                    )),
                    Err(e) => {
                        warn!("Job {} packaging failed: {}", workspace.job_id(), e);
                        workspace.release();
                        return Err(e);
                    }
                }
            }
        };

        info!("Job finished in {}ms", start.elapsed().as_millis());
        Ok(output)
    }

    async fn execute(
        &self,
        workspace: &Workspace,
        filename: &str,
        bytes: &[u8],
        options: &ConversionOptions,
        layout_active: bool,
    ) -> Result<Artifacts, Pdf2MdError> {
        let input = workspace.input_path();
        tokio::fs::write(&input, bytes)
            .await
            .map_err(|e| Pdf2MdError::write_failed(&input, e))?;

        let converter_options = converter_options(options, &workspace.images_dir());
        let conversion = self.adapter.convert(&input, &converter_options).await?;
        debug!(
            "Job {}: {} pages converted",
            workspace.job_id(),
            conversion.chunks.len()
        );

        materialize(
            workspace,
            filename,
            options,
            layout_active,
            conversion.markdown,
            conversion.chunks,
        )
        .await
    }
}

/// Converter options for the full-document pass of a job.
pub fn converter_options(options: &ConversionOptions, images_dir: &Path) -> ConverterOptions {
    ConverterOptions {
        dpi: options.dpi,
        force_text: options.force_text,
        write_images: options.write_images,
        embed_images: options.embed_images,
        image_output_path: options.write_images.then(|| images_dir.to_path_buf()),
        ..ConverterOptions::default()
    }
}

/// Reject anything whose name does not end in `.pdf` (any case).
pub fn check_pdf_filename(filename: &str) -> Result<(), Pdf2MdError> {
    let is_pdf = Path::new(filename)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        Ok(())
    } else {
        Err(Pdf2MdError::UnsupportedFileType {
            filename: filename.to_string(),
        })
    }
}

/// `report.pdf` → `report-artifacts.zip`.
pub fn attachment_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    format!("{stem}-artifacts.zip")
}

fn new_job_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
