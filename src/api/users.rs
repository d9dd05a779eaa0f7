use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::api::auth::EMAIL_PATTERN;
use crate::auth::extractors::{AdminUser, AppState, AuthenticatedUser};
use crate::auth::password::hash_password;
use crate::errors::CatalogError;
use crate::models::{NewUser, User, UserRole, UserUpdate};
use crate::repositories::ProjectRepository;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(regex(path = *EMAIL_PATTERN))]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub firstname: String,
    #[validate(length(min = 1, max = 100))]
    pub lastname: String,
    #[validate(length(min = 4))]
    pub password: String,
    pub role: Option<UserRole>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(regex(path = *EMAIL_PATTERN))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub firstname: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub lastname: Option<String>,
    #[validate(length(min = 4))]
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentAction {
    Assign,
    Unassign,
}

#[derive(Debug, Deserialize)]
pub struct ProjectAssignmentRequest {
    pub action: AssignmentAction,
    pub project_ids: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub role: UserRole,
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            firstname: user.firstname,
            lastname: user.lastname,
            role: user.role,
            active: user.active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserProjectsResponse {
    pub user_id: i32,
    pub project_ids: Vec<i32>,
}

pub async fn create_router() -> Result<Router<AppState>> {
    let router = Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/emails", get(list_emails))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/{id}/projects", get(get_user_projects).put(update_user_projects));

    Ok(router)
}

async fn list_users(
    State(app_state): State<AppState>,
    Query(query): Query<UserListQuery>,
    _admin_user: AdminUser,
) -> Result<Json<Vec<UserResponse>>, CatalogError> {
    let users = app_state.users().list_users(query.limit, query.offset).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Creator emails, used to populate the entry filter form.
async fn list_emails(
    State(app_state): State<AppState>,
    _auth_user: AuthenticatedUser,
) -> Result<Json<Vec<String>>, CatalogError> {
    Ok(Json(app_state.users().list_emails().await?))
}

async fn get_user(
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
    _admin_user: AdminUser,
) -> Result<Json<UserResponse>, CatalogError> {
    let user = app_state
        .users()
        .get_user(id)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("User {}", id)))?;

    Ok(Json(UserResponse::from(user)))
}

async fn create_user(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), CatalogError> {
    payload.validate()?;

    let user_repository = app_state.users();
    if user_repository.find_by_email(&payload.email).await?.is_some() {
        return Err(CatalogError::Conflict(format!("email {} is already registered", payload.email)));
    }

    let password_hash = hash_password(&payload.password).map_err(|e| CatalogError::Internal(e.to_string()))?;

    let new_user = NewUser {
        email: payload.email,
        firstname: payload.firstname,
        lastname: payload.lastname,
        password_hash,
        role: payload.role.unwrap_or(UserRole::Creator),
        active: payload.active.unwrap_or(true),
    };

    let user = user_repository.create_user(&new_user).await?;
    info!("{} created user {} ({})", admin.user.email, user.email, user.role);

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

async fn update_user(
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
    AdminUser(admin): AdminUser,
    Json(mut payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, CatalogError> {
    // An empty password field keeps the current one
    if payload.password.as_deref().is_some_and(str::is_empty) {
        payload.password = None;
    }
    payload.validate()?;

    let user_repository = app_state.users();
    let current = user_repository
        .get_user(id)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("User {}", id)))?;

    if let Some(email) = &payload.email {
        if *email != current.email && user_repository.find_by_email(email).await?.is_some() {
            return Err(CatalogError::Conflict(format!("email {} is already registered", email)));
        }
    }

    if admin.user.id == id && payload.role == Some(UserRole::Creator) {
        return Err(CatalogError::Forbidden("admins cannot demote themselves".to_string()));
    }

    let password_hash = match &payload.password {
        Some(password) => Some(hash_password(password).map_err(|e| CatalogError::Internal(e.to_string()))?),
        None => None,
    };

    let update = UserUpdate {
        email: payload.email.unwrap_or(current.email),
        firstname: payload.firstname.unwrap_or(current.firstname),
        lastname: payload.lastname.unwrap_or(current.lastname),
        role: payload.role.unwrap_or(current.role),
        active: payload.active.unwrap_or(current.active),
        password_hash,
    };

    let user = user_repository
        .update_user(id, &update)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("User {}", id)))?;

    info!("{} updated user {}", admin.user.email, user.email);
    Ok(Json(UserResponse::from(user)))
}

async fn delete_user(
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
    AdminUser(admin): AdminUser,
) -> Result<StatusCode, CatalogError> {
    if admin.user.id == id {
        warn!("Admin {} tried to delete their own account", admin.user.email);
        return Err(CatalogError::Forbidden("admins cannot delete themselves".to_string()));
    }

    // Users who still own entries are protected by the foreign key and
    // surface as a conflict.
    if !app_state.users().delete_user(id).await? {
        return Err(CatalogError::not_found(format!("User {}", id)));
    }

    info!("{} deleted user {}", admin.user.email, id);
    Ok(StatusCode::NO_CONTENT)
}

async fn get_user_projects(
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
    _admin_user: AdminUser,
) -> Result<Json<UserProjectsResponse>, CatalogError> {
    let user_repository = app_state.users();
    if user_repository.get_user(id).await?.is_none() {
        return Err(CatalogError::not_found(format!("User {}", id)));
    }

    let project_ids = user_repository.project_ids_for_user(id).await?;
    Ok(Json(UserProjectsResponse { user_id: id, project_ids }))
}

async fn update_user_projects(
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<ProjectAssignmentRequest>,
) -> Result<Json<UserProjectsResponse>, CatalogError> {
    if payload.project_ids.is_empty() {
        return Err(CatalogError::Validation("project_ids must not be empty".to_string()));
    }

    let user_repository = app_state.users();
    if user_repository.get_user(id).await?.is_none() {
        return Err(CatalogError::not_found(format!("User {}", id)));
    }

    let projects = ProjectRepository::new(app_state.database.pool().clone());
    for project_id in &payload.project_ids {
        if projects.get_project(*project_id).await?.is_none() {
            return Err(CatalogError::not_found(format!("Project {}", project_id)));
        }
    }

    for project_id in &payload.project_ids {
        match payload.action {
            AssignmentAction::Assign => user_repository.assign_project(id, *project_id).await?,
            AssignmentAction::Unassign => user_repository.unassign_project(id, *project_id).await?,
        }
    }

    info!(
        "{} applied {:?} of projects {:?} to user {}",
        admin.user.email, payload.action, payload.project_ids, id
    );

    let project_ids = user_repository.project_ids_for_user(id).await?;
    Ok(Json(UserProjectsResponse { user_id: id, project_ids }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_request_parses_lowercase_actions() {
        let req: ProjectAssignmentRequest =
            serde_json::from_str(r#"{"action":"unassign","project_ids":[1,2]}"#).unwrap();
        assert_eq!(req.action, AssignmentAction::Unassign);
        assert_eq!(req.project_ids, vec![1, 2]);

        assert!(serde_json::from_str::<ProjectAssignmentRequest>(r#"{"action":"move","project_ids":[1]}"#).is_err());
    }

    #[test]
    fn test_update_request_validates_present_fields_only() {
        let empty = UpdateUserRequest {
            email: None,
            firstname: None,
            lastname: None,
            password: None,
            role: None,
            active: Some(false),
        };
        assert!(empty.validate().is_ok());

        let bad = UpdateUserRequest {
            email: Some("nope".to_string()),
            firstname: None,
            lastname: None,
            password: Some("ab".to_string()),
            role: None,
            active: None,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_user_requests_reject_address_without_domain_dot() {
        let create = CreateUserRequest {
            email: "user@nodot".to_string(),
            firstname: "Ada".to_string(),
            lastname: "Lovelace".to_string(),
            password: "asdf".to_string(),
            role: None,
            active: None,
        };
        let errors = create.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));

        let update = UpdateUserRequest {
            email: Some("user@nodot".to_string()),
            firstname: None,
            lastname: None,
            password: None,
            role: None,
            active: None,
        };
        let errors = update.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));

        let update = UpdateUserRequest {
            email: Some("user@example.org".to_string()),
            firstname: None,
            lastname: None,
            password: None,
            role: None,
            active: None,
        };
        assert!(update.validate().is_ok());
    }
}
