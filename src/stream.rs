//! Archive delivery: stream `result.zip` out of a workspace, then release it.
//!
//! The archive lives inside the job's workspace, so the workspace must
//! outlive the transfer. [`ArchiveDelivery`] owns the [`Workspace`] and
//! hands it to the body stream; the stream releases it exactly once:
//!
//! * after the last chunk has been read (normal completion),
//! * after a read error (the error is yielded, then the stream ends), or
//! * when the stream is dropped early (client disconnect, aborted
//!   response), through `Drop`.
//!
//! No code path removes the tree while the file is still being read.

use crate::error::Pdf2MdError;
use crate::workspace::Workspace;
use futures::stream::{self, Stream};
use std::path::PathBuf;
use std::pin::Pin;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Bytes read per stream item.
const CHUNK_SIZE: usize = 64 * 1024;

/// A boxed stream of archive chunks.
pub type ArchiveStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, std::io::Error>> + Send>>;

/// A finished archive waiting to be sent.
#[derive(Debug)]
pub struct ArchiveDelivery {
    workspace: Workspace,
    attachment_name: String,
    size: u64,
}

impl ArchiveDelivery {
    pub(crate) fn new(workspace: Workspace, attachment_name: String, size: u64) -> Self {
        Self {
            workspace,
            attachment_name,
            size,
        }
    }

    pub fn job_id(&self) -> &str {
        self.workspace.job_id()
    }

    /// Suggested download name, e.g. `report-artifacts.zip`.
    pub fn attachment_name(&self) -> &str {
        &self.attachment_name
    }

    /// Archive size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Stream the archive; the workspace is released when the stream ends
    /// or is dropped.
    pub fn into_stream(self) -> ArchiveStream {
        let transfer = Transfer {
            path: self.workspace.archive_path(),
            file: None,
            workspace: Some(self.workspace),
        };
        Box::pin(stream::unfold(transfer, |mut t| async move {
            t.next_chunk().await.map(|item| (item, t))
        }))
    }

    /// Read the whole archive into memory and release the workspace.
    pub async fn into_bytes(self) -> Result<Vec<u8>, Pdf2MdError> {
        let path = self.workspace.archive_path();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| Pdf2MdError::write_failed(&path, e));
        self.workspace.release();
        bytes
    }
}

struct Transfer {
    path: PathBuf,
    file: Option<File>,
    workspace: Option<Workspace>,
}

impl Transfer {
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, std::io::Error>> {
        self.workspace.as_ref()?;

        if self.file.is_none() {
            match File::open(&self.path).await {
                Ok(f) => self.file = Some(f),
                Err(e) => {
                    self.finish();
                    return Some(Err(e));
                }
            }
        }
        let file = self.file.as_mut()?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        match file.read(&mut buf).await {
            Ok(0) => {
                self.finish();
                None
            }
            Ok(n) => {
                buf.truncate(n);
                Some(Ok(buf))
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }

    /// Close the file, then release the workspace. Idempotent.
    fn finish(&mut self) {
        self.file = None;
        if let Some(ws) = self.workspace.take() {
            debug!("Archive transfer for job {} finished", ws.job_id());
            ws.release();
        }
    }
}

impl Drop for Transfer {
    fn drop(&mut self) {
        if let Some(ws) = self.workspace.as_ref() {
            info!("Archive transfer for job {} aborted", ws.job_id());
        }
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn delivery_with(content: &[u8]) -> (tempfile::TempDir, ArchiveDelivery, PathBuf) {
        let parent = tempfile::tempdir().unwrap();
        let ws = Workspace::allocate(Some(parent.path()), "stream").unwrap();
        std::fs::write(ws.archive_path(), content).unwrap();
        let root = ws.root().to_path_buf();
        let d = ArchiveDelivery::new(ws, "doc-artifacts.zip".into(), content.len() as u64);
        (parent, d, root)
    }

    #[tokio::test]
    async fn full_read_releases_after_last_chunk() {
        let payload = vec![7u8; CHUNK_SIZE * 2 + 10];
        let (_parent, d, root) = delivery_with(&payload);
        assert_eq!(d.size(), payload.len() as u64);

        let mut s = d.into_stream();
        let mut got = Vec::new();
        while let Some(chunk) = s.next().await {
            assert!(root.exists(), "workspace removed mid-transfer");
            got.extend(chunk.unwrap());
        }
        assert_eq!(got, payload);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn dropping_mid_stream_releases() {
        let (_parent, d, root) = delivery_with(&vec![1u8; CHUNK_SIZE * 3]);
        let mut s = d.into_stream();
        let _first = s.next().await.unwrap().unwrap();
        assert!(root.exists());
        drop(s);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn never_polled_stream_releases_on_drop() {
        let (_parent, d, root) = delivery_with(b"PK");
        drop(d.into_stream());
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn into_bytes_releases() {
        let (_parent, d, root) = delivery_with(b"PK\x03\x04");
        assert_eq!(d.into_bytes().await.unwrap(), b"PK\x03\x04");
        assert!(!root.exists());
    }
}
