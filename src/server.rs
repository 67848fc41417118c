//! HTTP front end

use crate::options::OptionBag;
use crate::service::RenderService;
use crate::Error;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as Base64Engine;
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Body of the print and screenshot endpoints
#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub html: String,
    #[serde(default)]
    pub options: Option<OptionBag>,
}

/// Body of the convert endpoint
///
/// `pdf` carries the document content as-is; `pdf_base64` carries it
/// base64-encoded. Exactly one is expected.
#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    #[serde(default)]
    pub pdf: Option<String>,
    #[serde(default)]
    pub pdf_base64: Option<String>,
    #[serde(default)]
    pub options: Option<OptionBag>,
}

/// Failure of one HTTP call
#[derive(Debug)]
pub enum ApiError {
    /// The request was malformed; nothing was rendered
    BadRequest(String),
    /// The rendering core failed
    Render(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Render(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Render(err) => {
                error!("render failed ({:?}): {}", err.phase(), err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn require_html(request: &RenderRequest) -> Result<(), ApiError> {
    if request.html.trim().is_empty() {
        return Err(ApiError::BadRequest("html is required".into()));
    }
    Ok(())
}

fn document(content_type: &'static str, bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
}

type AppState = State<Arc<RenderService>>;

async fn health() -> &'static str {
    "OK"
}

async fn print(
    State(service): AppState,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    require_html(&request)?;

    let pdf = service.print(&request.html, request.options.as_ref()).await?;
    Ok(document("application/pdf", pdf))
}

async fn print_pdfa(
    State(service): AppState,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    require_html(&request)?;

    let pdf = service
        .print_pdfa(&request.html, request.options.as_ref())
        .await?;
    Ok(document("application/pdf", pdf))
}

async fn convert_pdfa(
    State(service): AppState,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;

    let pdf = match (request.pdf, request.pdf_base64) {
        (Some(raw), _) if !raw.is_empty() => raw.into_bytes(),
        (_, Some(encoded)) if !encoded.is_empty() => base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| ApiError::BadRequest(format!("invalid pdf_base64: {}", e)))?,
        _ => return Err(ApiError::BadRequest("pdf is required".into())),
    };

    let pdfa = service.convert_pdfa(pdf, request.options.as_ref()).await?;
    Ok(document("application/pdf", pdfa))
}

async fn screenshot(
    State(service): AppState,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    require_html(&request)?;

    let png = service
        .screenshot(&request.html, request.options.as_ref())
        .await?;
    Ok(document("image/png", png))
}

/// Build the HTTP router around a render service
pub fn router(service: RenderService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/print", post(print))
        .route("/v1/print_pdfa", post(print_pdfa))
        .route("/v1/convert_pdfa", post(convert_pdfa))
        .route("/v1/screenshot", post(screenshot))
        .with_state(Arc::new(service))
}

/// Serve `service` on `listener` until the process exits
pub async fn serve(listener: tokio::net::TcpListener, service: RenderService) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("listening on http://{}", addr);
    }
    axum::serve(listener, router(service)).await
}
