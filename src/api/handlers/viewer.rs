//! Viewer page endpoint

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::api::server::AppState;

/// GET /logger-viewer.html
pub async fn viewer_page(State(state): State<AppState>) -> impl IntoResponse {
    let page = state.template.page(&state.logger_host);
    ([(header::CONTENT_TYPE, "text/html")], page)
}
