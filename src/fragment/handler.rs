//! HTTP handlers for the Fragments API
//!
//! Every route here sits behind basic auth; handlers read the caller's
//! [`Owner`] from request extensions.
//! - GET    /v1/fragments           : list ids (`?expand=1` for records)
//! - POST   /v1/fragments           : create from raw body + Content-Type
//! - GET    /v1/fragments/:id[.ext] : raw or converted data
//! - GET    /v1/fragments/:id/info  : metadata
//! - PUT    /v1/fragments/:id       : replace data
//! - DELETE /v1/fragments/:id       : delete

use crate::api::{success, ApiError};
use crate::auth::Owner;
use crate::convert;
use crate::format::{base_media_type, is_supported_type};
use crate::fragment::Fragment;
use crate::storage::FragmentStore;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

/// Shared state for fragment handlers
#[derive(Clone)]
pub struct FragmentsState {
    pub store: FragmentStore,
    /// Public base URL for `Location`; the request's Host is used when unset
    pub api_url: Option<String>,
}

/// Create the fragments router
pub fn fragments_router(state: FragmentsState) -> Router {
    Router::new()
        .route("/v1/fragments", get(list_fragments).post(create_fragment))
        .route(
            "/v1/fragments/:id",
            get(get_fragment).put(update_fragment).delete(delete_fragment),
        )
        .route("/v1/fragments/:id/info", get(get_fragment_info))
        .with_state(state)
}

// =============================================================================
// Query parameter types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListQuery {
    expand: Option<String>,
}

impl ListQuery {
    fn expand(&self) -> bool {
        match self.expand.as_deref().map(str::trim) {
            None | Some("") | Some("0") => false,
            Some(v) => !v.eq_ignore_ascii_case("false"),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /v1/fragments
async fn list_fragments(
    State(state): State<FragmentsState>,
    Extension(owner): Extension<Owner>,
    Query(params): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let listing = Fragment::by_user(&state.store, owner.id(), params.expand()).await?;
    Ok(success(json!({ "fragments": listing })).into_response())
}

/// POST /v1/fragments
async fn create_fragment(
    State(state): State<FragmentsState>,
    Extension(owner): Extension<Owner>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let content_type = header_value(&headers, header::CONTENT_TYPE).unwrap_or_default();
    if !is_supported_type(content_type) {
        tracing::warn!(
            owner = owner.id(),
            content_type,
            "Rejected fragment with unsupported type"
        );
        return Err(ApiError::unsupported_media_type(format!(
            "Unsupported type: {}",
            content_type
        )));
    }

    let mut fragment = Fragment::new(owner.id(), content_type)?;
    fragment.set_data(&state.store, body).await?;
    tracing::info!(
        owner = owner.id(),
        id = fragment.id(),
        content_type,
        size = fragment.size(),
        "Fragment created"
    );

    let location = format!(
        "{}/v1/fragments/{}",
        base_url(&state, &headers),
        fragment.id()
    );
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        success(json!({ "fragment": fragment.record() })),
    )
        .into_response())
}

/// GET /v1/fragments/:id, optionally with a target extension (`:id.html`)
async fn get_fragment(
    State(state): State<FragmentsState>,
    Extension(owner): Extension<Owner>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let (id, ext) = match raw_id.rsplit_once('.') {
        Some((id, ext)) => (id, Some(ext)),
        None => (raw_id.as_str(), None),
    };

    let fragment = Fragment::by_id(&state.store, owner.id(), id).await?;

    let Some(ext) = ext else {
        let data = fragment.get_data(&state.store).await?;
        return Ok((
            [(header::CONTENT_TYPE, fragment.content_type().to_string())],
            data,
        )
            .into_response());
    };

    let target = convert::resolve_extension(ext)?;
    let data = fragment.data_as(&state.store, target).await?;
    tracing::debug!(
        owner = owner.id(),
        id,
        from = fragment.mime_type(),
        to = target.media_type(),
        "Served converted fragment"
    );
    Ok((
        [(header::CONTENT_TYPE, target.media_type().to_string())],
        data,
    )
        .into_response())
}

/// GET /v1/fragments/:id/info
async fn get_fragment_info(
    State(state): State<FragmentsState>,
    Extension(owner): Extension<Owner>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let fragment = Fragment::by_id(&state.store, owner.id(), &id).await?;
    Ok(success(json!({ "fragment": fragment.record() })).into_response())
}

/// PUT /v1/fragments/:id
async fn update_fragment(
    State(state): State<FragmentsState>,
    Extension(owner): Extension<Owner>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut fragment = Fragment::by_id(&state.store, owner.id(), &id).await?;

    let requested = header_value(&headers, header::CONTENT_TYPE).and_then(base_media_type);
    if requested.as_deref() != Some(fragment.mime_type()) {
        tracing::warn!(
            owner = owner.id(),
            id = %id,
            expected = fragment.mime_type(),
            got = requested.as_deref().unwrap_or("none"),
            "Rejected update with mismatched type"
        );
        return Err(ApiError::bad_request(format!(
            "Content-Type must match the fragment's type: {}",
            fragment.mime_type()
        )));
    }

    fragment.set_data(&state.store, body).await?;
    tracing::info!(
        owner = owner.id(),
        id = %id,
        size = fragment.size(),
        "Fragment updated"
    );
    Ok(success(json!({
        "fragment": fragment.record(),
        "formats": fragment.formats(),
    }))
    .into_response())
}

/// DELETE /v1/fragments/:id
async fn delete_fragment(
    State(state): State<FragmentsState>,
    Extension(owner): Extension<Owner>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    Fragment::delete(&state.store, owner.id(), &id).await?;
    Ok(success(json!({})).into_response())
}

// =============================================================================
// Helpers
// =============================================================================

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn base_url(state: &FragmentsState, headers: &HeaderMap) -> String {
    match &state.api_url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => {
            let host = header_value(headers, header::HOST).unwrap_or("localhost");
            format!("http://{}", host)
        }
    }
}
