//! HTTP surface.
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `GET`  | `/health` | – | `{"status":"ok"}` |
//! | `POST` | `/api/v1/pdf/process` | multipart: `file` + option fields | zip attachment or JSON |
//!
//! Option fields (all optional): `response_format` (`zip`/`json`), `dpi`,
//! `write_images`, `force_text`, `embed_images`, `use_layout`. Booleans
//! accept `true/false`, `1/0`, `yes/no`, `on/off`.
//!
//! Errors are JSON `{"detail": "..."}` with 400 for validation failures and
//! 500 for conversion or resource failures.

use crate::config::{parse_bool, ConversionOptions, ResponseFormat};
use crate::convert::{JobOutput, JobRequest, Pipeline};
use crate::error::{ErrorClass, Pdf2MdError};
use crate::stream::ArchiveDelivery;
use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Path of the conversion endpoint.
pub const PROCESS_PATH: &str = "/api/v1/pdf/process";

/// Build the application router.
pub fn router(pipeline: Pipeline, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(PROCESS_PATH, post(process))
        .with_state(pipeline)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Serve `app` on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{addr}");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn process(
    State(pipeline): State<Pipeline>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::read(multipart).await?;
    let options = form.options()?;
    let (filename, bytes) = form.file.ok_or_else(|| {
        Pdf2MdError::InvalidConfig("a PDF must be uploaded in the 'file' field".into())
    })?;

    let output = pipeline
        .run(JobRequest {
            filename,
            bytes,
            options,
        })
        .await?;

    Ok(match output {
        JobOutput::Inline(body) => Json(body).into_response(),
        JobOutput::Archive(delivery) => archive_response(delivery),
    })
}

fn archive_response(delivery: ArchiveDelivery) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe(delivery.attachment_name())
    );
    let size = delivery.size().to_string();
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, size),
        ],
        Body::from_stream(delivery.into_stream()),
    )
        .into_response()
}

/// Replace anything that cannot sit inside a quoted header parameter.
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ── Form parsing ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    response_format: Option<String>,
    dpi: Option<String>,
    write_images: Option<String>,
    force_text: Option<String>,
    embed_images: Option<String>,
    use_layout: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?.to_vec();
                debug!("Received upload '{}' ({} bytes)", filename, bytes.len());
                form.file = Some((filename, bytes));
                continue;
            }
            let slot = match name.as_str() {
                "response_format" => &mut form.response_format,
                "dpi" => &mut form.dpi,
                "write_images" => &mut form.write_images,
                "force_text" => &mut form.force_text,
                "embed_images" => &mut form.embed_images,
                "use_layout" => &mut form.use_layout,
                other => {
                    debug!("Ignoring unknown form field '{other}'");
                    continue;
                }
            };
            *slot = Some(field.text().await?);
        }
        Ok(form)
    }

    fn options(&self) -> Result<ConversionOptions, Pdf2MdError> {
        let defaults = ConversionOptions::default();
        let flag = |field: &str, value: &Option<String>, default: bool| match value {
            Some(v) => parse_bool(field, v),
            None => Ok(default),
        };

        let dpi = match &self.dpi {
            Some(v) => v.trim().parse::<u32>().map_err(|_| {
                Pdf2MdError::InvalidConfig(format!("dpi must be a positive integer, got '{v}'"))
            })?,
            None => defaults.dpi,
        };
        let response_format = match &self.response_format {
            Some(v) => v.parse::<ResponseFormat>()?,
            None => defaults.response_format,
        };

        ConversionOptions::builder()
            .dpi(dpi)
            .write_images(flag("write_images", &self.write_images, defaults.write_images)?)
            .force_text(flag("force_text", &self.force_text, defaults.force_text)?)
            .embed_images(flag("embed_images", &self.embed_images, defaults.embed_images)?)
            .use_layout(flag("use_layout", &self.use_layout, defaults.use_layout)?)
            .response_format(response_format)
            .build()
    }
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Error returned by handlers; rendered as `{"detail": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Pipeline(Pdf2MdError),
    Multipart(MultipartError),
}

impl From<Pdf2MdError> for ApiError {
    fn from(e: Pdf2MdError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Multipart(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Pipeline(e) => {
                let status = match e.class() {
                    ErrorClass::Validation => StatusCode::BAD_REQUEST,
                    ErrorClass::Conversion | ErrorClass::Resource => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.to_string())
            }
            ApiError::Multipart(e) => (e.status(), e.body_text()),
        };
        if status.is_server_error() {
            error!("Request failed ({status}): {detail}");
        } else {
            debug!("Request rejected ({status}): {detail}");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
