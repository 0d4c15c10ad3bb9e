//! phishpair-survey library
//!
//! Pairwise email suspicion survey: corpus discovery, per-session pair
//! sampling, session progress, response recording and the HTTP API that
//! drives them.

use axum::Router;
use std::sync::Arc;

pub mod api;
pub mod content;
pub mod corpus;
pub mod error;
pub mod recorder;
pub mod sampler;
pub mod session;
pub mod store;
pub mod survey;

use survey::SurveyService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub survey: Arc<SurveyService>,
}

impl AppState {
    pub fn new(survey: Arc<SurveyService>) -> Self {
        Self { survey }
    }
}

/// Build application router
///
/// Raw corpus files are served under `/emails` for PDF embeds.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::survey_routes())
        .merge(api::export_routes())
        .merge(api::email_routes())
        .with_state(state)
}
