//! Job pipeline integration tests against a scripted converter.

mod common;

use common::{entry, leftover_entries, pipeline, unzip, FakeConverter, Scripted, PDF_BYTES};
use edgequake_pdf2md_bundle::{
    ConversionOptions, InlineResponse, JobOutput, JobRequest, Manifest, Pdf2MdError, Pipeline,
    ResponseFormat,
};
use serde_json::json;
use std::sync::Arc;

fn request(options: ConversionOptions) -> JobRequest {
    JobRequest {
        filename: "report.pdf".into(),
        bytes: PDF_BYTES.to_vec(),
        options,
    }
}

fn inline() -> ConversionOptions {
    ConversionOptions {
        response_format: ResponseFormat::Inline,
        ..ConversionOptions::default()
    }
}

async fn run_inline(p: &Pipeline, options: ConversionOptions) -> InlineResponse {
    match p.run(request(options)).await.expect("job should succeed") {
        JobOutput::Inline(body) => body,
        JobOutput::Archive(_) => panic!("expected inline output"),
    }
}

async fn run_archive(p: &Pipeline, options: ConversionOptions) -> Vec<u8> {
    match p.run(request(options)).await.expect("job should succeed") {
        JobOutput::Archive(delivery) => delivery.into_bytes().await.unwrap(),
        JobOutput::Inline(_) => panic!("expected archive output"),
    }
}

#[tokio::test]
async fn inline_job_numbers_pages_and_cleans_up() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(
        FakeConverter::with_pages(&["# One", "Two", "Three"]).images(&["c.png", "a.png", "b.png"]),
    );
    let p = pipeline(&fake, false, root.path());

    let body = run_inline(&p, inline()).await;

    assert_eq!(
        body.pages.iter().map(|p| p.page_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(body.manifest.page_count, body.pages.len());
    assert_eq!(body.manifest.images, vec!["a.png", "b.png", "c.png"]);
    assert_eq!(body.manifest.filename, "report.pdf");
    assert!(!body.layout_active);
    assert!(!body.embedded_images);
    assert!(body.full_markdown.contains("# One"));
    assert!(body.full_html.contains("<h1"));
    assert_eq!(body.pages[1].metadata["page"], 2);

    assert_eq!(leftover_entries(root.path()), 0, "workspace must be released");
}

#[tokio::test]
async fn archive_matches_manifest_and_cleans_up_after_transfer() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeConverter::with_pages(&["# A", "B"]).images(&["x.png"]));
    let p = pipeline(&fake, false, root.path());

    let delivery = match p.run(request(ConversionOptions::default())).await.unwrap() {
        JobOutput::Archive(d) => d,
        JobOutput::Inline(_) => panic!("expected archive"),
    };
    assert_eq!(delivery.attachment_name(), "report-artifacts.zip");
    assert_eq!(
        leftover_entries(root.path()),
        1,
        "workspace must survive until the archive is sent"
    );

    let bytes = delivery.into_bytes().await.unwrap();
    assert_eq!(leftover_entries(root.path()), 0);

    let files = unzip(&bytes);
    let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
    for expected in [
        "manifest.json",
        "full.md",
        "full.html",
        "pages/page-0001.md",
        "pages/page-0002.md",
        "pages_html/page-0001.html",
        "pages_html/page-0002.html",
        "images/x.png",
    ] {
        assert!(names.contains(&expected), "{expected} missing: {names:?}");
    }

    let manifest: Manifest = serde_json::from_str(entry(&files, "manifest.json")).unwrap();
    assert_eq!(manifest.page_count, 2);
    assert_eq!(manifest.images, vec!["x.png"]);
    let page_files = names.iter().filter(|n| n.starts_with("pages/")).count();
    assert_eq!(manifest.page_count, page_files);
    for path in [&manifest.files.full_markdown, &manifest.files.full_html] {
        assert!(names.contains(&path.as_str()));
    }
}

#[tokio::test]
async fn archive_and_inline_carry_identical_content() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeConverter::with_pages(&["# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |", "Body"]));
    let p = pipeline(&fake, false, root.path());

    let body = run_inline(&p, inline()).await;
    let files = unzip(&run_archive(&p, ConversionOptions::default()).await);

    assert_eq!(entry(&files, "full.md"), body.full_markdown);
    assert_eq!(entry(&files, "full.html"), body.full_html);
    for page in &body.pages {
        let stem = format!("page-{:04}", page.page_number);
        assert_eq!(entry(&files, &format!("pages/{stem}.md")), page.markdown);
        assert_eq!(entry(&files, &format!("pages_html/{stem}.html")), page.html);
    }

    let manifest: Manifest = serde_json::from_str(entry(&files, "manifest.json")).unwrap();
    assert_eq!(manifest.page_count, body.manifest.page_count);
    assert_eq!(manifest.images, body.manifest.images);
    assert_ne!(manifest.job_id, body.manifest.job_id);
}

#[tokio::test]
async fn conflicting_image_options_never_reach_the_converter() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeConverter::with_pages(&["x"]));
    let p = pipeline(&fake, true, root.path());

    for force_text in [false, true] {
        for use_layout in [false, true] {
            for response_format in [ResponseFormat::Archive, ResponseFormat::Inline] {
                for dpi in [72, 150, 300] {
                    let options = ConversionOptions {
                        dpi,
                        force_text,
                        write_images: true,
                        embed_images: true,
                        use_layout,
                        response_format,
                    };
                    let err = p.run(request(options)).await.unwrap_err();
                    assert!(matches!(err, Pdf2MdError::ConflictingImageOptions));
                }
            }
        }
    }
    assert_eq!(fake.call_count(), 0);
    assert_eq!(fake.layout_notifications(), 0);
    assert_eq!(leftover_entries(root.path()), 0);
}

#[tokio::test]
async fn non_pdf_upload_is_rejected_before_any_work() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeConverter::with_pages(&["x"]));
    let p = pipeline(&fake, false, root.path());

    let err = p
        .run(JobRequest {
            filename: "notes.docx".into(),
            bytes: PDF_BYTES.to_vec(),
            options: ConversionOptions::default(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2MdError::UnsupportedFileType { .. }));
    assert_eq!(fake.call_count(), 0);
    assert_eq!(leftover_entries(root.path()), 0);
}

#[tokio::test]
async fn conversion_failure_releases_workspace() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeConverter::with_pages(&["x"]).script(&[Scripted::Fail("bad xref")]));
    let p = pipeline(&fake, false, root.path());

    let err = p.run(request(ConversionOptions::default())).await.unwrap_err();
    assert!(matches!(err, Pdf2MdError::ConversionFailed { .. }));
    assert!(err.to_string().contains("bad xref"));
    assert_eq!(fake.call_count(), 1, "generic failures are not retried");
    assert_eq!(leftover_entries(root.path()), 0);
}

#[tokio::test]
async fn empty_extremum_is_retried_once_without_header_inference() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeConverter::with_pages(&["# A", "B"]).script(&[Scripted::EmptyExtremum]));
    let p = pipeline(&fake, false, root.path());

    let body = run_inline(&p, inline()).await;
    assert_eq!(body.manifest.page_count, 2);

    let calls = fake.calls();
    assert_eq!(calls.len(), 3, "full pass, its retry, chunk pass");
    assert!(calls[0].header_inference && !calls[0].page_chunks);
    assert!(!calls[1].header_inference && !calls[1].page_chunks);
    assert!(calls[2].page_chunks);
    assert_eq!(leftover_entries(root.path()), 0);
}

#[tokio::test]
async fn failed_retry_surfaces_the_retry_error() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(
        FakeConverter::with_pages(&["x"])
            .script(&[Scripted::EmptyExtremum, Scripted::Fail("retry broke")]),
    );
    let p = pipeline(&fake, false, root.path());

    let err = p.run(request(ConversionOptions::default())).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("retry broke"), "got: {msg}");
    assert!(!msg.contains("empty extremum"), "got: {msg}");
    assert_eq!(fake.call_count(), 2);
    assert_eq!(leftover_entries(root.path()), 0);
}

#[tokio::test]
async fn chunk_pass_never_writes_images() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeConverter::with_pages(&["x"]).images(&["only.png"]));
    let p = pipeline(&fake, false, root.path());

    let body = run_inline(&p, inline()).await;
    assert_eq!(body.manifest.images, vec!["only.png"]);

    let calls = fake.calls();
    let full = calls.iter().find(|c| !c.page_chunks).unwrap();
    let chunked = calls.iter().find(|c| c.page_chunks).unwrap();
    assert!(full.write_images && full.image_output_path.is_some());
    assert!(!chunked.write_images && !chunked.embed_images);
    assert!(chunked.image_output_path.is_none());
}

#[tokio::test]
async fn embedded_images_stay_in_markdown() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeConverter::with_pages(&["x"]).images(&["e.png"]));
    let p = pipeline(&fake, false, root.path());

    let options = ConversionOptions {
        write_images: false,
        embed_images: true,
        ..inline()
    };
    let body = run_inline(&p, options).await;
    assert!(body.embedded_images);
    assert!(body.manifest.embed_images && !body.manifest.write_images);
    assert!(body.manifest.images.is_empty());
    assert!(body.full_markdown.contains("data:image/png;base64,"));
}

#[tokio::test]
async fn malformed_chunks_are_filtered_not_fatal() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeConverter::with_pages(&["a", "b"]).chunks(json!([
        {"text": "first"},
        "junk",
        7,
        {"text": "second", "metadata": {"page": 3}}
    ])));
    let p = pipeline(&fake, false, root.path());

    let files = unzip(&run_archive(&p, ConversionOptions::default()).await);
    let manifest: Manifest = serde_json::from_str(entry(&files, "manifest.json")).unwrap();
    assert_eq!(manifest.page_count, 2);
    assert_eq!(entry(&files, "pages/page-0001.md"), "first");
    assert_eq!(entry(&files, "pages/page-0002.md"), "second");
    assert!(!files.iter().any(|(n, _)| n == "pages/page-0003.md"));
}

#[tokio::test]
async fn zero_page_document_produces_empty_page_set() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeConverter::with_pages(&[]).chunks(json!({"not": "a list"})));
    let p = pipeline(&fake, false, root.path());

    let body = run_inline(&p, inline()).await;
    assert_eq!(body.manifest.page_count, 0);
    assert!(body.pages.is_empty());
}

#[tokio::test]
async fn layout_unavailable_fails_fast() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeConverter::with_pages(&["x"]));
    let p = pipeline(&fake, false, root.path());

    let options = ConversionOptions {
        use_layout: true,
        ..ConversionOptions::default()
    };
    let err = p.run(request(options)).await.unwrap_err();
    assert!(matches!(err, Pdf2MdError::LayoutUnavailable));
    assert!(err.is_validation());
    assert_eq!(fake.call_count(), 0);
    assert_eq!(leftover_entries(root.path()), 0);
}

#[tokio::test]
async fn layout_activation_is_process_wide_and_notifies_once() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeConverter::with_pages(&["x"]));
    let p = pipeline(&fake, true, root.path());

    let before = run_inline(&p, inline()).await;
    assert!(!before.layout_active);

    let layout = ConversionOptions {
        use_layout: true,
        ..inline()
    };
    assert!(run_inline(&p, layout.clone()).await.layout_active);
    assert!(run_inline(&p, layout).await.layout_active);
    assert_eq!(fake.layout_notifications(), 1);

    // Stays on for later jobs that did not ask for it.
    let after = run_inline(&p, inline()).await;
    assert!(after.layout_active);
    assert!(after.manifest.layout_active);
}

#[tokio::test]
async fn concurrent_jobs_use_separate_workspaces() {
    let root = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeConverter::with_pages(&["# P1", "P2"]).images(&["i.png"]));
    let p = pipeline(&fake, false, root.path());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let p = p.clone();
            tokio::spawn(async move { run_inline(&p, inline()).await })
        })
        .collect();

    let mut ids = Vec::new();
    for h in handles {
        let body = h.await.unwrap();
        assert_eq!(body.manifest.images, vec!["i.png"]);
        ids.push(body.manifest.job_id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(leftover_entries(root.path()), 0);
}
