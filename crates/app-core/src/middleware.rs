//! HTTP middleware shared by the services.

use axum::Json;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Rewrites any 5xx response body into the generic error envelope.
///
/// Internal failures must never leak store or provider detail to the
/// client; the envelope carries only the status code, its canonical
/// reason, a fixed message, and the request path.
pub async fn error_envelope(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    if !response.status().is_server_error() {
        return response;
    }

    let status = response.status();
    let body = json!({
        "status": status.as_u16(),
        "error": status.canonical_reason().unwrap_or("Internal Server Error"),
        "message": "An unexpected error occurred while processing the request",
        "path": path,
    });

    (status, Json(body)).into_response()
}
