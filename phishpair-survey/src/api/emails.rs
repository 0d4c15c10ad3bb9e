//! Raw corpus files for PDF embeds

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::util::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

use crate::content::{is_bare_filename, EMAILS_ROUTE};
use crate::corpus;
use crate::AppState;

/// GET /emails/:filename
///
/// Only corpus-eligible files are served; drafts and notes sitting in the
/// same directory answer 404.
pub async fn email_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Response {
    if !is_bare_filename(&filename) || !corpus::is_eligible(&filename) {
        debug!("Refusing to serve {}", filename);
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = state.survey.settings().emails_dir.join(&filename);
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

pub fn email_routes() -> Router<AppState> {
    Router::new().route(&format!("{}/:filename", EMAILS_ROUTE), get(email_file))
}
