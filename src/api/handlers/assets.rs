//! Fallback handler serving the viewer bundle's static files

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::api::server::AppState;
use crate::error::RelayError;

/// GET /<any-path>
pub async fn serve_asset(State(state): State<AppState>, uri: Uri) -> Result<Response, RelayError> {
    let asset = state.assets.load(uri.path()).await.inspect_err(|e| {
        if let RelayError::AssetNotFound(path) = e {
            debug!(path = %path, "Asset not found");
        }
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, asset.content_type)],
        asset.body,
    )
        .into_response())
}
