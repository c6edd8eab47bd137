//! Input resolution: normalise a document source to a single byte buffer.
//!
//! Callers describe where the PDF lives as an ordered list of
//! [`DocumentSource`] values. [`InputResolver::resolve`] walks the list in
//! order and returns the bytes of the first source that yields any. A
//! source that is *absent* (empty string, non-HTTP URL, nested field that
//! points nowhere) is skipped; a source that is *explicit and broken*
//! (missing local file, malformed base64) fails the job.
//!
//! ## Structured references
//!
//! A [`FileRef`] is the parsed form of a file-like object handed over by a
//! plugin host. Its fields are tried in a fixed sub-order: direct bytes,
//! then existing local paths, then base64 content, then remote URLs. Unlike
//! the explicit parameters, a nested field that does not resolve is skipped
//! rather than reported, since hosts fill these objects inconsistently.

use crate::error::Pdf2MdError;
use crate::pipeline::encode::decode_base64;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Parameter names accepted by the tool surface, in resolution order.
pub const ACCEPTED_INPUTS: [&str; 4] = ["pdf_file", "pdf_path", "pdf_url", "pdf_base64"];

const PATH_KEYS: [&str; 4] = ["path", "local_path", "tmp_path", "file_path"];
const BASE64_KEYS: [&str; 3] = ["base64", "content", "data"];
const URL_KEYS: [&str; 4] = ["url", "download_url", "remote_url", "preview_url"];

/// One candidate location of the input document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSource {
    /// Bytes already in memory (an upload).
    RawBytes(Vec<u8>),
    /// An explicit local path. Must exist and be a regular file.
    LocalPath(PathBuf),
    /// An explicit remote URL. Only `http://` and `https://` are fetched.
    RemoteUrl(String),
    /// An explicit base64 payload, optionally with a data-URI prefix.
    Base64Payload(String),
    /// A file-like object with several optional nested fields.
    StructuredRef(FileRef),
}

/// Parsed nested fields of a structured file parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileRef {
    pub bytes: Option<Vec<u8>>,
    pub paths: Vec<PathBuf>,
    pub base64: Vec<String>,
    pub urls: Vec<String>,
}

impl FileRef {
    /// Build a reference from a loosely shaped JSON value.
    ///
    /// A bare string is treated as a local path. An object contributes every
    /// string field found under the known key aliases, in alias order.
    /// Anything else yields an empty reference.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self {
                paths: vec![PathBuf::from(s)],
                ..Self::default()
            },
            Value::Object(map) => {
                let strings = |keys: &[&str]| -> Vec<String> {
                    keys.iter()
                        .filter_map(|k| map.get(*k).and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                };
                Self {
                    bytes: None,
                    paths: strings(&PATH_KEYS).into_iter().map(PathBuf::from).collect(),
                    base64: strings(&BASE64_KEYS),
                    urls: strings(&URL_KEYS),
                }
            }
            _ => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_none() && self.paths.is_empty() && self.base64.is_empty() && self.urls.is_empty()
    }
}

/// Check if the input string looks like a fetchable URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolves [`DocumentSource`] lists to document bytes.
#[derive(Debug, Clone)]
pub struct InputResolver {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl InputResolver {
    /// Create a resolver whose remote fetches give up after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self, Pdf2MdError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Pdf2MdError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    /// Return the bytes of the first source that yields any.
    pub async fn resolve(&self, sources: &[DocumentSource]) -> Result<Vec<u8>, Pdf2MdError> {
        for source in sources {
            let bytes = match source {
                DocumentSource::RawBytes(b) => Some(b.clone()),
                DocumentSource::StructuredRef(r) => self.resolve_ref(r).await?,
                DocumentSource::LocalPath(p) => read_explicit_path(p).await?,
                DocumentSource::RemoteUrl(u) if is_url(u) => Some(self.fetch(u).await?),
                DocumentSource::RemoteUrl(_) => None,
                DocumentSource::Base64Payload(s) => decode_explicit_base64(s)?,
            };
            match bytes {
                Some(b) if !b.is_empty() => return Ok(b),
                _ => continue,
            }
        }
        Err(Pdf2MdError::MissingInput {
            accepted: ACCEPTED_INPUTS.to_vec(),
        })
    }

    async fn resolve_ref(&self, r: &FileRef) -> Result<Option<Vec<u8>>, Pdf2MdError> {
        if let Some(b) = r.bytes.as_ref().filter(|b| !b.is_empty()) {
            return Ok(Some(b.clone()));
        }
        for path in &r.paths {
            if is_regular_file(path).await {
                let bytes = read_file(path).await?;
                debug!("Resolved structured path: {}", path.display());
                return Ok(Some(bytes));
            }
        }
        for payload in &r.base64 {
            match decode_base64(payload) {
                Ok(b) => return Ok(Some(b)),
                Err(e) => debug!("Skipping undecodable structured base64: {e}"),
            }
        }
        match r.urls.iter().find(|u| is_url(u)) {
            Some(url) => self.fetch(url).await.map(Some),
            None => Ok(None),
        }
    }

    /// Download `url` into memory, bounded by the configured timeout.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, Pdf2MdError> {
        info!("Downloading PDF from: {}", url);

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                Pdf2MdError::DownloadTimeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                Pdf2MdError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(map_err)?;

        if !response.status().is_success() {
            return Err(Pdf2MdError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(map_err)?;
        info!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn read_file(path: &Path) -> Result<Vec<u8>, Pdf2MdError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| Pdf2MdError::Internal(format!("Failed to read '{}': {e}", path.display())))
}

async fn read_explicit_path(path: &Path) -> Result<Option<Vec<u8>>, Pdf2MdError> {
    if path.as_os_str().is_empty() {
        return Ok(None);
    }
    if !is_regular_file(path).await {
        return Err(Pdf2MdError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    debug!("Resolved local PDF: {}", path.display());
    read_file(path).await.map(Some)
}

fn decode_explicit_base64(payload: &str) -> Result<Option<Vec<u8>>, Pdf2MdError> {
    if payload.trim().is_empty() {
        return Ok(None);
    }
    decode_base64(payload)
        .map(Some)
        .map_err(|e| Pdf2MdError::InvalidBase64 {
            reason: e.to_string(),
        })
}
