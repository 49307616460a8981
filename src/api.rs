//! Unified API router for Fragments
//!
//! Merges the module routers into a single axum `Router` with CORS, request
//! tracing, a body limit and the shared JSON envelopes.
//!
//! ## Endpoint Map
//!
//! | Route                           | Auth  | Description                      |
//! |---------------------------------|-------|----------------------------------|
//! | `GET /health`                   | none  | Health probe                     |
//! | `GET /v1/fragments`             | basic | List ids (`?expand=1`: records)  |
//! | `POST /v1/fragments`            | basic | Create from body + Content-Type  |
//! | `GET /v1/fragments/:id[.ext]`   | basic | Data, optionally converted       |
//! | `GET /v1/fragments/:id/info`    | basic | Metadata record                  |
//! | `PUT /v1/fragments/:id`         | basic | Replace data (same type)         |
//! | `DELETE /v1/fragments/:id`      | basic | Delete metadata and data         |
//!
//! ## Envelopes
//!
//! ```text
//! {"status":"ok", ...fields}
//! {"status":"error","error":{"code":404,"message":"Fragment not found"}}
//! ```

use crate::auth::{require_auth, BasicAuth};
use crate::config::ServerConfig;
use crate::error::Error;
use crate::fragment::handler::{fragments_router, FragmentsState};
use crate::storage::FragmentStore;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the complete Fragments HTTP application
pub fn build_app(store: FragmentStore, auth: BasicAuth, server: &ServerConfig) -> Router {
    let state = FragmentsState {
        store,
        api_url: server.api_url.clone(),
    };

    let protected = fragments_router(state)
        .route_layer(middleware::from_fn_with_state(Arc::new(auth), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(&server.cors_origins))
}

// =============================================================================
// Envelopes
// =============================================================================

/// `{"status":"ok"}` merged with the fields of `body`
pub fn success(body: Value) -> Json<Value> {
    let mut envelope = Map::new();
    envelope.insert("status".to_string(), Value::from("ok"));
    if let Value::Object(fields) = body {
        envelope.extend(fields);
    }
    Json(Value::Object(envelope))
}

/// API error response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    status: &'static str,
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: u16,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            status: "error",
            error: ErrorDetail {
                code: self.status.as_u16(),
                message: &self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match &err {
            Error::NotFound(detail) => {
                tracing::warn!("{}", detail);
                Self::not_found("Fragment not found")
            }
            Error::Validation { .. } => Self::bad_request(err.to_string()),
            Error::UnsupportedConversion { .. } | Error::UnknownTarget(_) | Error::Conversion(_) => {
                Self::unsupported_media_type(err.to_string())
            }
            Error::Storage(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Serialization(_) => {
                tracing::error!("Request failed: {}", err);
                Self::internal()
            }
        }
    }
}

// =============================================================================
// Root handlers
// =============================================================================

async fn health_check() -> impl IntoResponse {
    success(json!({
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> ApiError {
    ApiError::not_found("not found")
}

// =============================================================================
// CORS
// =============================================================================

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .expose_headers([header::LOCATION]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 64)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let resp = health_check().await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let resp = ApiError::not_found("Fragment not found").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["code"], 404);
        assert_eq!(json["error"]["message"], "Fragment not found");
    }

    #[test]
    fn test_error_mapping() {
        let cases = [
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                Error::Validation {
                    field: "type",
                    message: "bad".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::UnsupportedConversion {
                    from: "text/plain".into(),
                    to: "image/png".into(),
                },
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (Error::UnknownTarget(".xyz".into()), StatusCode::UNSUPPORTED_MEDIA_TYPE),
            (Error::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_storage_detail_not_echoed() {
        let api = ApiError::from(Error::Storage("/secret/path failed".into()));
        assert_eq!(api.message, "Internal Server Error");
    }

    #[test]
    fn test_success_merges_fields() {
        let Json(value) = success(json!({"fragments": []}));
        assert_eq!(value, json!({"status": "ok", "fragments": []}));
    }

    #[test]
    fn test_build_cors_with_origins() {
        let _cors = build_cors(&[]);
        let _cors = build_cors(&["http://localhost:1234".to_string()]);
    }
}
