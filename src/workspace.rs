//! Per-job scratch directories.
//!
//! Every job gets its own uniquely named directory tree, so concurrent jobs
//! never share a filesystem region:
//!
//! ```text
//! pdf2md-{job_id}-XXXXXX/
//! ├── input.pdf
//! ├── result.zip          (archive mode only)
//! └── artifacts/
//!     ├── pages/
//!     ├── pages_html/
//!     └── images/
//! ```
//!
//! The tree is backed by a [`TempDir`], so it is removed when the
//! [`Workspace`] is released *or* dropped. Release is best-effort: a path
//! that is already gone or a removal race is logged and ignored.

use crate::error::Pdf2MdError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Name of the input document inside a workspace.
pub const INPUT_FILE: &str = "input.pdf";
/// Artifacts root, relative to the workspace.
pub const ARTIFACTS_DIR: &str = "artifacts";
/// Per-page Markdown directory, relative to the artifacts root.
pub const PAGES_DIR: &str = "pages";
/// Per-page HTML directory, relative to the artifacts root.
pub const PAGES_HTML_DIR: &str = "pages_html";
/// Extracted images directory, relative to the artifacts root.
pub const IMAGES_DIR: &str = "images";

/// An allocated job workspace.
#[derive(Debug)]
pub struct Workspace {
    job_id: String,
    root: PathBuf,
    dir: Option<TempDir>,
}

impl Workspace {
    /// Create a fresh workspace for `job_id` under `parent` (or the system temp dir).
    pub fn allocate(parent: Option<&Path>, job_id: &str) -> Result<Self, Pdf2MdError> {
        let prefix = format!("pdf2md-{job_id}-");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let parent_path = parent
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        if let Some(p) = parent {
            std::fs::create_dir_all(p).map_err(|source| Pdf2MdError::WorkspaceFailed {
                path: p.to_path_buf(),
                source,
            })?;
        }

        let dir = builder
            .tempdir_in(&parent_path)
            .map_err(|source| Pdf2MdError::WorkspaceFailed {
                path: parent_path.clone(),
                source,
            })?;
        let root = dir.path().to_path_buf();

        let workspace = Self {
            job_id: job_id.to_string(),
            root,
            dir: Some(dir),
        };

        for sub in [
            workspace.pages_dir(),
            workspace.pages_html_dir(),
            workspace.images_dir(),
        ] {
            std::fs::create_dir_all(&sub)
                .map_err(|source| Pdf2MdError::WorkspaceFailed { path: sub, source })?;
        }

        debug!("Allocated workspace {} for job {}", workspace.root.display(), job_id);
        Ok(workspace)
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_path(&self) -> PathBuf {
        self.root.join(INPUT_FILE)
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join(ARTIFACTS_DIR)
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.artifacts_dir().join(PAGES_DIR)
    }

    pub fn pages_html_dir(&self) -> PathBuf {
        self.artifacts_dir().join(PAGES_HTML_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.artifacts_dir().join(IMAGES_DIR)
    }

    /// Where the packager writes the archive. Outside the artifacts root so
    /// the archive never contains itself.
    pub fn archive_path(&self) -> PathBuf {
        self.root.join("result.zip")
    }

    /// Remove the whole tree. Never fails; problems are only logged.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!("Released workspace for job {}", self.job_id),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Workspace for job {} already gone", self.job_id)
                }
                Err(e) => warn!(
                    "Workspace cleanup for job {} incomplete ({}): {}",
                    self.job_id,
                    self.root.display(),
                    e
                ),
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}
