pub mod auth;
pub mod entries;
pub mod projects;
pub mod users;

use anyhow::Result;
use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;

use crate::auth::extractors::AppState;
use crate::errors::CatalogError;
use crate::models::CatalogKind;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub uptime_seconds: u64,
}

pub async fn create_router() -> Result<Router<AppState>> {
    let mut router = Router::new()
        .route("/status", get(status_handler))
        .nest("/auth", auth::create_router().await?)
        .nest("/users", users::create_router().await?)
        .nest("/projects", projects::create_router().await?);

    for kind in [CatalogKind::Data, CatalogKind::Record] {
        router = router.nest(&format!("/{}", kind.route()), entries::create_router(kind).await?);
    }

    Ok(router)
}

/// Trims a required text field and rejects it when nothing is left.
pub(crate) fn required_text(field: &str, value: &str) -> Result<String, CatalogError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::Validation(format!("invalid fields: {}", field)));
    }
    Ok(trimmed.to_string())
}

async fn status_handler(State(app_state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: app_state.config.environment.clone(),
        uptime_seconds: app_state.startup_time.elapsed().as_secs(),
    })
}
