use crate::auth::{claims::TokenClaims, errors::AuthError, jwt::JwtService};
use crate::config::AppConfig;
use crate::database::Database;
use crate::models::User;
use crate::repositories::UserRepository;
use crate::services::catalog::CatalogService;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::time::Instant;
use tracing::{debug, error, warn};

// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub catalog: CatalogService,
    pub jwt_service: JwtService,
    pub config: AppConfig,
    pub startup_time: Instant,
}

impl AppState {
    pub fn new(database: Database, jwt_service: JwtService, config: AppConfig) -> Self {
        let catalog = CatalogService::new(database.clone(), config.catalog.uid_prefix.clone());
        Self { database, catalog, jwt_service, config, startup_time: Instant::now() }
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.database.pool().clone())
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub claims: TokenClaims,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token_from_auth_header(&parts.headers)?;
        extract_authenticated_user(state, &token).await
    }
}

// Role-based authentication extractor for admin users
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        debug!("Attempting to extract AdminUser from request");

        let token = extract_token_from_auth_header(&parts.headers)?;
        let auth_user = extract_authenticated_user(state, &token).await?;

        if !auth_user.user.is_admin() {
            warn!("User {} attempted to access admin endpoint without admin role", auth_user.user.email);
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminUser(auth_user))
    }
}

fn extract_token_from_auth_header(headers: &axum::http::HeaderMap) -> Result<String, AuthError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Decodes the token and loads the (active) user it names.
async fn extract_authenticated_user(state: &AppState, token: &str) -> Result<AuthenticatedUser, AuthError> {
    let claims = state.jwt_service.decode_token(token).map_err(|e| {
        debug!("Rejected bearer token: {:?}", e);
        AuthError::InvalidToken(e.to_string())
    })?;

    if claims.is_expired() {
        warn!("Token expired for user ID: {}", claims.sub);
        return Err(AuthError::TokenExpired);
    }

    let user = state
        .users()
        .get_user(claims.sub)
        .await
        .map_err(|e| {
            error!("Database error while fetching user {}: {:?}", claims.sub, e);
            AuthError::DatabaseError(e.to_string())
        })?
        .ok_or_else(|| {
            warn!("User not found for ID: {}", claims.sub);
            AuthError::UserNotFound
        })?;

    if !user.active {
        warn!("Inactive user attempted to authenticate: {}", user.email);
        return Err(AuthError::UserInactive);
    }

    Ok(AuthenticatedUser { user, claims })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn test_bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_token_from_auth_header(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_or_malformed_header_is_rejected() {
        let headers = HeaderMap::new();
        assert!(matches!(
            extract_token_from_auth_header(&headers),
            Err(AuthError::MissingAuthHeader)
        ));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(matches!(
            extract_token_from_auth_header(&headers),
            Err(AuthError::InvalidAuthHeader)
        ));
    }
}
