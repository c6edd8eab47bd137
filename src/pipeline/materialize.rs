//! Artifact materialisation: write the job's outputs into the workspace.
//!
//! ```text
//! artifacts/
//! ├── manifest.json
//! ├── full.md
//! ├── full.html
//! ├── pages/page-0001.md …
//! ├── pages_html/page-0001.html …
//! └── images/*            (written earlier by the converter)
//! ```
//!
//! The manifest is built from what is actually on disk after the page
//! files are written: `page_count` is the number of page files and
//! `images` is a lexically sorted listing of the images directory.

use crate::config::ConversionOptions;
use crate::error::Pdf2MdError;
use crate::output::{
    page_stem, Manifest, ManifestFiles, PageChunk, PageRecord, FULL_HTML, FULL_MARKDOWN,
    MANIFEST_FILE,
};
use crate::pipeline::render::markdown_to_html;
use crate::workspace::Workspace;
use std::path::Path;
use tracing::debug;

/// Everything a job produced, as written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub manifest: Manifest,
    pub full_markdown: String,
    pub full_html: String,
    pub pages: Vec<PageRecord>,
}

/// Render and write all artifacts for one job, then write the manifest.
pub async fn materialize(
    workspace: &Workspace,
    filename: &str,
    options: &ConversionOptions,
    layout_active: bool,
    markdown: String,
    chunks: Vec<PageChunk>,
) -> Result<Artifacts, Pdf2MdError> {
    let artifacts_dir = workspace.artifacts_dir();

    let full_html = markdown_to_html(&markdown);
    write(&artifacts_dir.join(FULL_MARKDOWN), &markdown).await?;
    write(&artifacts_dir.join(FULL_HTML), &full_html).await?;

    let pages_dir = workspace.pages_dir();
    let pages_html_dir = workspace.pages_html_dir();
    let mut pages = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let html = markdown_to_html(&chunk.text);
        let stem = page_stem(chunk.index);
        write(&pages_dir.join(format!("{stem}.md")), &chunk.text).await?;
        write(&pages_html_dir.join(format!("{stem}.html")), &html).await?;
        pages.push(PageRecord {
            page_number: chunk.index,
            markdown: chunk.text,
            html,
            metadata: chunk.metadata,
        });
    }
    debug!("Wrote {} page files", pages.len());

    let images = list_files(&workspace.images_dir()).await?;

    let manifest = Manifest {
        job_id: workspace.job_id().to_string(),
        filename: filename.to_string(),
        dpi: options.dpi,
        force_text: options.force_text,
        write_images: options.write_images,
        embed_images: options.embed_images,
        layout_active,
        page_count: pages.len(),
        images,
        files: ManifestFiles::default(),
    };
    let manifest_json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| Pdf2MdError::Internal(format!("Manifest serialisation: {e}")))?;
    write(&artifacts_dir.join(MANIFEST_FILE), &manifest_json).await?;

    Ok(Artifacts {
        manifest,
        full_markdown: markdown,
        full_html,
        pages,
    })
}

/// Regular files directly inside `dir`, sorted lexically by name.
pub async fn list_files(dir: &Path) -> Result<Vec<String>, Pdf2MdError> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Pdf2MdError::write_failed(dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Pdf2MdError::write_failed(dir, e))?
    {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if is_file {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

async fn write(path: &Path, contents: &str) -> Result<(), Pdf2MdError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| Pdf2MdError::write_failed(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn chunk(index: usize, text: &str) -> PageChunk {
        PageChunk {
            index,
            text: text.to_string(),
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn writes_layout_and_manifest() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::allocate(Some(root.path()), "job1").unwrap();
        std::fs::write(ws.images_dir().join("b.png"), b"b").unwrap();
        std::fs::write(ws.images_dir().join("a.png"), b"a").unwrap();
        std::fs::create_dir(ws.images_dir().join("nested")).unwrap();

        let mut meta = Map::new();
        meta.insert("page".into(), json!(0));
        let chunks = vec![
            PageChunk {
                index: 1,
                text: "# One\n".into(),
                metadata: meta,
            },
            chunk(2, "Two\n"),
            chunk(3, ""),
        ];

        let artifacts = materialize(
            &ws,
            "report.pdf",
            &ConversionOptions::default(),
            false,
            "# One\n\nTwo\n".into(),
            chunks,
        )
        .await
        .unwrap();

        let a = ws.artifacts_dir();
        assert!(a.join("full.md").is_file());
        assert!(a.join("full.html").is_file());
        assert!(a.join("manifest.json").is_file());
        for i in 1..=3 {
            assert!(a.join(format!("pages/page-000{i}.md")).is_file());
            assert!(a.join(format!("pages_html/page-000{i}.html")).is_file());
        }

        assert_eq!(artifacts.manifest.page_count, 3);
        assert_eq!(artifacts.manifest.images, vec!["a.png", "b.png"]);
        assert_eq!(artifacts.manifest.job_id, "job1");
        assert_eq!(artifacts.pages[0].metadata["page"], 0);
        assert!(artifacts.pages[0].html.contains("<h1"));

        let on_disk: Manifest =
            serde_json::from_str(&std::fs::read_to_string(a.join("manifest.json")).unwrap())
                .unwrap();
        assert_eq!(on_disk, artifacts.manifest);
    }

    #[tokio::test]
    async fn zero_pages_is_fine() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::allocate(Some(root.path()), "empty").unwrap();
        let artifacts = materialize(
            &ws,
            "blank.pdf",
            &ConversionOptions::default(),
            false,
            String::new(),
            Vec::new(),
        )
        .await
        .unwrap();
        assert_eq!(artifacts.manifest.page_count, 0);
        assert!(artifacts.manifest.images.is_empty());
        assert!(list_files(&ws.pages_dir()).await.unwrap().is_empty());
    }
}
