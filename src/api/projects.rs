use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::api::required_text;
use crate::auth::extractors::{AdminUser, AppState, AuthenticatedUser};
use crate::errors::CatalogError;
use crate::models::{is_valid_project_code, normalize_project_code, NewProject, Project};
use crate::repositories::ProjectRepository;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub finished: bool,
}

/// The code is fixed at creation; only the name and status change.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub finished: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct NameCheckQuery {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct NameCheckResponse {
    pub name: String,
    pub name_exists: bool,
}

pub async fn create_router() -> Result<Router<AppState>> {
    let router = Router::new()
        .route("/", get(list_projects).post(create_project))
        .route("/mine", get(list_my_projects))
        .route("/name-check", get(check_name))
        .route("/{id}", get(get_project).put(update_project).delete(delete_project));

    Ok(router)
}

fn projects(app_state: &AppState) -> ProjectRepository {
    ProjectRepository::new(app_state.database.pool().clone())
}

async fn list_projects(
    State(app_state): State<AppState>,
    _auth_user: AuthenticatedUser,
) -> Result<Json<Vec<Project>>, CatalogError> {
    Ok(Json(projects(&app_state).list_projects().await?))
}

/// Projects the caller is assigned to; these are the ones they may file entries under.
async fn list_my_projects(
    State(app_state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<Json<Vec<Project>>, CatalogError> {
    Ok(Json(projects(&app_state).list_for_user(auth_user.user.id).await?))
}

async fn check_name(
    State(app_state): State<AppState>,
    Query(query): Query<NameCheckQuery>,
    _auth_user: AuthenticatedUser,
) -> Result<Json<NameCheckResponse>, CatalogError> {
    let name = query.name.trim().to_string();
    let name_exists = !name.is_empty() && projects(&app_state).find_by_name(&name).await?.is_some();

    Ok(Json(NameCheckResponse { name, name_exists }))
}

async fn get_project(
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
    _auth_user: AuthenticatedUser,
) -> Result<Json<Project>, CatalogError> {
    let project = projects(&app_state)
        .get_project(id)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("Project {}", id)))?;

    Ok(Json(project))
}

async fn create_project(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), CatalogError> {
    payload.validate()?;
    let name = required_text("name", &payload.name)?;

    let code = normalize_project_code(&payload.code);
    if !is_valid_project_code(&code) {
        return Err(CatalogError::Validation(format!(
            "project code {:?} must be 1 to 8 letters or digits",
            payload.code
        )));
    }

    let repository = projects(&app_state);
    if repository.find_by_name(&name).await?.is_some() {
        return Err(CatalogError::Conflict(format!("project {} already exists", name)));
    }

    let project = repository
        .create_project(&NewProject { name, code, finished: payload.finished })
        .await?;

    info!("{} created project {} ({})", admin.user.email, project.name, project.code);
    Ok((StatusCode::CREATED, Json(project)))
}

async fn update_project(
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, CatalogError> {
    payload.validate()?;
    let name = payload.name.as_deref().map(|n| required_text("name", n)).transpose()?;

    let repository = projects(&app_state);
    let current = repository
        .get_project(id)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("Project {}", id)))?;

    let name = name.unwrap_or_else(|| current.name.clone());

    if name != current.name && repository.find_by_name(&name).await?.is_some() {
        return Err(CatalogError::Conflict(format!("project {} already exists", name)));
    }

    let project = repository
        .update_project(id, &name, payload.finished.unwrap_or(current.finished))
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("Project {}", id)))?;

    info!("{} updated project {}", admin.user.email, project.id);
    Ok(Json(project))
}

/// Projects still referenced by entries cannot be removed; that surfaces as a conflict.
async fn delete_project(
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
    AdminUser(admin): AdminUser,
) -> Result<StatusCode, CatalogError> {
    if !projects(&app_state).delete_project(id).await? {
        return Err(CatalogError::not_found(format!("Project {}", id)));
    }

    info!("{} deleted project {}", admin.user.email, id);
    Ok(StatusCode::NO_CONTENT)
}
