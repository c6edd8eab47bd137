//! Packaging: turn materialised artifacts into a deliverable.
//!
//! * Archive mode zips the artifacts directory into `result.zip` next to it
//!   (inside the workspace, outside the zipped tree). Entry names are
//!   relative to the artifacts root and use `/`, so they match the paths in
//!   the manifest exactly. Entries are visited in sorted order so the same
//!   artifact set always yields the same entry order.
//! * Inline mode builds an [`InlineResponse`] from the in-memory artifacts.

use crate::error::Pdf2MdError;
use crate::output::InlineResponse;
use crate::pipeline::materialize::Artifacts;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Zip `artifacts_dir` into `archive_path`. Runs on the blocking pool.
pub async fn build_archive(artifacts_dir: &Path, archive_path: &Path) -> Result<u64, Pdf2MdError> {
    let src = artifacts_dir.to_path_buf();
    let dst = archive_path.to_path_buf();
    tokio::task::spawn_blocking(move || write_zip(&src, &dst))
        .await
        .map_err(|e| Pdf2MdError::Internal(format!("Archive task panicked: {e}")))?
}

fn write_zip(src: &Path, dst: &Path) -> Result<u64, Pdf2MdError> {
    let file = File::create(dst).map_err(|e| Pdf2MdError::write_failed(dst, e))?;
    let mut zip = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut entries = 0usize;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(archive_err)?;
        let name = entry_name(src, entry.path())?;
        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options)
                .map_err(archive_err)?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, options).map_err(archive_err)?;
            let mut f = File::open(entry.path()).map_err(archive_err)?;
            std::io::copy(&mut f, &mut zip).map_err(archive_err)?;
            entries += 1;
        }
    }

    let file = zip.finish().map_err(archive_err)?;
    let size = file
        .metadata()
        .map_err(|e| Pdf2MdError::write_failed(dst, e))?
        .len();
    debug!("Archived {entries} files into {} ({size} bytes)", dst.display());
    Ok(size)
}

fn archive_err(e: impl std::fmt::Display) -> Pdf2MdError {
    Pdf2MdError::ArchiveFailed(e.to_string())
}

/// Archive entry name for `path`: relative to `root`, `/`-separated.
fn entry_name(root: &Path, path: &Path) -> Result<String, Pdf2MdError> {
    let rel: PathBuf = path
        .strip_prefix(root)
        .map_err(|e| Pdf2MdError::ArchiveFailed(e.to_string()))?
        .to_path_buf();
    Ok(rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Build the `response_format=json` body.
pub fn inline_response(artifacts: Artifacts, embedded_images: bool) -> InlineResponse {
    InlineResponse {
        layout_active: artifacts.manifest.layout_active,
        manifest: artifacts.manifest,
        full_markdown: artifacts.full_markdown,
        full_html: artifacts.full_html,
        pages: artifacts.pages,
        embedded_images,
    }
}
