use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{extractors::AppState, AdminUser, AuthError, AuthenticatedUser};
use crate::models::{NewUser, User, UserRole};

lazy_static::lazy_static! {
    pub(crate) static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$").expect("valid email pattern");
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(regex(path = *EMAIL_PATTERN))]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub firstname: String,
    #[validate(length(min = 1, max = 100))]
    pub lastname: String,
    #[validate(length(min = 4))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailCheckRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailCheckResponse {
    pub email: String,
    pub email_is_valid: bool,
    pub email_exists: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i32,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub role: UserRole,
    pub active: bool,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            firstname: user.firstname,
            lastname: user.lastname,
            role: user.role,
            active: user.active,
        }
    }
}

pub async fn create_router() -> Result<Router<AppState>> {
    let router = Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/profile", get(get_profile))
        .route("/email", post(check_email));

    Ok(router)
}

async fn login(
    State(app_state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    req.validate().map_err(|_| AuthError::InvalidCredentials)?;

    let user = app_state
        .users()
        .find_by_email(&req.email)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?
        .ok_or(AuthError::InvalidCredentials)?;

    if !user.active {
        return Err(AuthError::UserInactive);
    }

    let is_valid = verify_password(&req.password, &user.password_hash)
        .map_err(|_| AuthError::InvalidCredentials)?;

    if !is_valid {
        warn!("Failed login attempt for {}", req.email);
        return Err(AuthError::InvalidCredentials);
    }

    let token = app_state
        .jwt_service
        .token_for(&user)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    info!("User {} logged in", user.email);
    Ok(Json(AuthResponse {
        token,
        user: UserInfo::from(user),
    }))
}

/// Admins register new accounts; they always start as creators.
async fn register(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserInfo>), AuthError> {
    req.validate()
        .map_err(|e| AuthError::InvalidRequest(e.to_string()))?;

    let user_repo = app_state.users();

    if user_repo
        .find_by_email(&req.email)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?
        .is_some()
    {
        return Err(AuthError::EmailExists);
    }

    let password_hash = hash_password(&req.password)
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

    let new_user = NewUser {
        email: req.email,
        firstname: req.firstname,
        lastname: req.lastname,
        password_hash,
        role: UserRole::Creator,
        active: true,
    };

    let user = user_repo
        .create_user(&new_user)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

    info!("{} registered new user {}", admin.user.email, user.email);
    Ok((StatusCode::CREATED, Json(UserInfo::from(user))))
}

async fn get_profile(auth_user: AuthenticatedUser) -> Result<Json<UserInfo>, AuthError> {
    Ok(Json(UserInfo::from(auth_user.user)))
}

/// Reports whether an email is well formed and still free.
async fn check_email(
    State(app_state): State<AppState>,
    Json(req): Json<EmailCheckRequest>,
) -> Result<Json<EmailCheckResponse>, AuthError> {
    let email = req.email.trim().to_string();

    if email.is_empty() || !is_valid_email(&email) {
        return Ok(Json(EmailCheckResponse {
            email,
            email_is_valid: false,
            email_exists: false,
        }));
    }

    let exists = app_state
        .users()
        .find_by_email(&email)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?
        .is_some();

    Ok(Json(EmailCheckResponse {
        email,
        email_is_valid: !exists,
        email_exists: exists,
    }))
}
