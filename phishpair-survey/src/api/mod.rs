//! HTTP API handlers

pub mod emails;
pub mod export;
pub mod health;
pub mod survey;

pub use emails::email_routes;
pub use export::export_routes;
pub use health::health_routes;
pub use survey::survey_routes;
