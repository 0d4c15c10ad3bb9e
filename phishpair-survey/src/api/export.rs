//! Bulk response export

use axum::{extract::State, routing::get, Json, Router};
use tracing::info;

use crate::error::ApiResult;
use crate::store::ResponseExport;
use crate::AppState;

/// GET /api/responses/export
///
/// Every stored response as `{columns, rows}`, oldest first.
pub async fn export_responses(State(state): State<AppState>) -> ApiResult<Json<ResponseExport>> {
    let export = state.survey.export().await?;
    info!("Exported {} responses", export.len());
    Ok(Json(export))
}

pub fn export_routes() -> Router<AppState> {
    Router::new().route("/api/responses/export", get(export_responses))
}
