use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

// Postgres SQLSTATE codes surfaced as conflicts
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Storage error: {0}")]
    Storage(#[source] sqlx::Error),
    #[error("Export error: {0}")]
    Export(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CatalogError::NotFound(what.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::Validation(_) => StatusCode::BAD_REQUEST,
            CatalogError::Conflict(_) => StatusCode::CONFLICT,
            CatalogError::Forbidden(_) => StatusCode::FORBIDDEN,
            CatalogError::Storage(_) | CatalogError::Export(_) | CatalogError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    let target = db_err.constraint().unwrap_or("unique key").to_string();
                    return CatalogError::Conflict(format!("duplicate value violates {}", target));
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    let target = db_err.constraint().unwrap_or("foreign key").to_string();
                    return CatalogError::Conflict(format!("row is still referenced ({})", target));
                }
                _ => {}
            }
        }
        CatalogError::Storage(err)
    }
}

impl From<validator::ValidationErrors> for CatalogError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<&str> = field_errors.keys().map(|k| k.as_ref()).collect();
        fields.sort_unstable();
        CatalogError::Validation(format!("invalid fields: {}", fields.join(", ")))
    }
}

impl From<csv::Error> for CatalogError {
    fn from(err: csv::Error) -> Self {
        CatalogError::Export(err.to_string())
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            CatalogError::Storage(e) => {
                error!("Storage error while handling request: {:?}", e);
                "Internal server error".to_string()
            }
            CatalogError::Export(e) => {
                error!("Export failed: {}", e);
                "Internal server error".to_string()
            }
            CatalogError::Internal(e) => {
                error!("Internal error while handling request: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
