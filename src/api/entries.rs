use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::api::projects::{NameCheckQuery, NameCheckResponse};
use crate::api::required_text;
use crate::auth::extractors::{AppState, AuthenticatedUser};
use crate::errors::CatalogError;
use crate::models::{
    CatalogEntry, CatalogEntryView, CatalogKind, EntryFilter, EntryUpdate, NewCatalogEntry, ProjectSelection,
};
use crate::services::export::{entries_to_csv, render_readme, README_FILENAME};

/// Listing filters as they arrive in the query string. Blank values are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct EntryFilterQuery {
    pub name: Option<String>,
    pub email: Option<String>,
    pub location_type: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub archived: Option<String>,
    pub project: Option<String>,
    pub creator_id: Option<String>,
    pub uid: Option<String>,
}

impl TryFrom<EntryFilterQuery> for EntryFilter {
    type Error = CatalogError;

    fn try_from(query: EntryFilterQuery) -> Result<Self, Self::Error> {
        Ok(EntryFilter {
            name: non_blank(query.name),
            email: non_blank(query.email),
            location_type: non_blank(query.location_type),
            from_date: non_blank(query.from_date).map(|d| parse_date("from_date", &d)).transpose()?,
            to_date: non_blank(query.to_date).map(|d| parse_date("to_date", &d)).transpose()?,
            archived: non_blank(query.archived).map(|a| parse_flag("archived", &a)).transpose()?,
            project: non_blank(query.project).map(|p| parse_id("project", &p)).transpose()?,
            creator_id: non_blank(query.creator_id).map(|c| parse_id("creator_id", &c)).transpose()?,
            uid: non_blank(query.uid),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, CatalogError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| CatalogError::Validation(format!("{} must be a YYYY-MM-DD date, got {:?}", field, value)))
}

fn parse_flag(field: &str, value: &str) -> Result<bool, CatalogError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(CatalogError::Validation(format!("{} must be true or false, got {:?}", field, value))),
    }
}

fn parse_id(field: &str, value: &str) -> Result<i32, CatalogError> {
    value
        .parse()
        .map_err(|_| CatalogError::Validation(format!("{} must be a numeric id, got {:?}", field, value)))
}

/// Body of both create and update; an update replaces every editable field.
#[derive(Debug, Deserialize, Validate)]
pub struct EntryRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 64))]
    pub location_type: String,
    #[validate(length(min = 1, max = 1024))]
    pub location: String,
    pub project_id_1: i32,
    /// Absent or `null` when the entry has a single project.
    pub project_id_2: Option<i32>,
    #[serde(default)]
    pub archived: bool,
}

impl EntryRequest {
    fn validated(self) -> Result<Self, CatalogError> {
        self.validate()?;
        Ok(Self {
            name: required_text("name", &self.name)?,
            location_type: required_text("location_type", &self.location_type)?,
            location: required_text("location", &self.location)?,
            ..self
        })
    }

    pub fn projects(&self) -> ProjectSelection {
        ProjectSelection::new(self.project_id_1, self.project_id_2)
    }

    fn into_new_entry(self, creator_id: i32) -> NewCatalogEntry {
        let projects = self.projects();
        NewCatalogEntry {
            name: self.name,
            description: self.description,
            location_type: self.location_type,
            location: self.location,
            creator_id,
            projects,
            archived: self.archived,
        }
    }

    fn into_update(self) -> EntryUpdate {
        let projects = self.projects();
        EntryUpdate {
            name: self.name,
            description: self.description,
            location_type: self.location_type,
            location: self.location,
            projects,
            archived: self.archived,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedEntryResponse {
    pub id: i32,
    pub uid: String,
    pub readme_url: String,
}

pub fn readme_url(kind: CatalogKind, id: i32) -> String {
    format!("/api/{}/{}/readme", kind.route(), id)
}

/// Whether a user assigned to `assigned` may file an entry under `selection`.
pub fn may_file_under(assigned: &[i32], selection: ProjectSelection) -> bool {
    selection.ids().iter().all(|id| assigned.contains(id))
}

/// Whether a user assigned to `assigned` may edit an entry filed under `selection`.
pub fn may_edit(assigned: &[i32], selection: ProjectSelection) -> bool {
    selection.ids().iter().any(|id| assigned.contains(id))
}

pub async fn create_router(kind: CatalogKind) -> Result<Router<AppState>> {
    let router = Router::new()
        .route("/", get(list_entries).post(create_entry))
        .route("/mine", get(list_my_entries))
        .route("/name-check", get(check_name))
        .route("/export.csv", get(export_csv))
        .route("/{id}", get(get_entry).put(update_entry).delete(delete_entry))
        .route("/{id}/readme", get(download_readme))
        .layer(Extension(kind));

    Ok(router)
}

async fn assigned_projects(app_state: &AppState, auth_user: &AuthenticatedUser) -> Result<Vec<i32>, CatalogError> {
    app_state.users().project_ids_for_user(auth_user.user.id).await
}

/// Loads the entry and checks the caller may change it.
async fn editable_entry(
    app_state: &AppState,
    kind: CatalogKind,
    id: i32,
    auth_user: &AuthenticatedUser,
) -> Result<CatalogEntry, CatalogError> {
    let entry = app_state
        .catalog
        .repository(kind)
        .get_entry(id)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("Entry {}", id)))?;

    if !auth_user.user.is_admin() {
        let assigned = assigned_projects(app_state, auth_user).await?;
        if !may_edit(&assigned, entry.projects()) {
            warn!("{} may not modify {} entry {}", auth_user.user.email, kind.table(), id);
            return Err(CatalogError::Forbidden(format!(
                "not assigned to any project of entry {}",
                id
            )));
        }
    }

    Ok(entry)
}

async fn ensure_may_file_under(
    app_state: &AppState,
    auth_user: &AuthenticatedUser,
    selection: ProjectSelection,
) -> Result<(), CatalogError> {
    if auth_user.user.is_admin() {
        return Ok(());
    }

    let assigned = assigned_projects(app_state, auth_user).await?;
    if !may_file_under(&assigned, selection) {
        warn!("{} is not assigned to projects {:?}", auth_user.user.email, selection.ids());
        return Err(CatalogError::Forbidden("not assigned to every selected project".to_string()));
    }

    Ok(())
}

async fn list_entries(
    State(app_state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    Query(query): Query<EntryFilterQuery>,
    _auth_user: AuthenticatedUser,
) -> Result<Json<Vec<CatalogEntryView>>, CatalogError> {
    let filter = EntryFilter::try_from(query)?;
    debug!("Listing {} entries with {:?}", kind.table(), filter);

    Ok(Json(app_state.catalog.repository(kind).list_entries(&filter).await?))
}

async fn list_my_entries(
    State(app_state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    auth_user: AuthenticatedUser,
) -> Result<Json<Vec<CatalogEntryView>>, CatalogError> {
    let entries = app_state
        .catalog
        .repository(kind)
        .list_for_user_projects(auth_user.user.id)
        .await?;

    Ok(Json(entries))
}

async fn check_name(
    State(app_state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    Query(query): Query<NameCheckQuery>,
    _auth_user: AuthenticatedUser,
) -> Result<Json<NameCheckResponse>, CatalogError> {
    let name = query.name.trim().to_string();
    let name_exists = !name.is_empty() && app_state.catalog.repository(kind).find_by_name(&name).await?.is_some();

    Ok(Json(NameCheckResponse { name, name_exists }))
}

async fn get_entry(
    State(app_state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    Path(id): Path<i32>,
    _auth_user: AuthenticatedUser,
) -> Result<Json<CatalogEntryView>, CatalogError> {
    let entry = app_state
        .catalog
        .repository(kind)
        .get_entry_view(id)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("Entry {}", id)))?;

    Ok(Json(entry))
}

async fn create_entry(
    State(app_state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    auth_user: AuthenticatedUser,
    Json(payload): Json<EntryRequest>,
) -> Result<(StatusCode, Json<CreatedEntryResponse>), CatalogError> {
    let payload = payload.validated()?;
    ensure_may_file_under(&app_state, &auth_user, payload.projects()).await?;

    if app_state.catalog.repository(kind).find_by_name(&payload.name).await?.is_some() {
        return Err(CatalogError::Conflict(format!("an entry named {} already exists", payload.name)));
    }

    let created = app_state
        .catalog
        .create_entry(kind, payload.into_new_entry(auth_user.user.id))
        .await?;

    info!("{} created {} entry {}", auth_user.user.email, kind.table(), created.uid);
    Ok((
        StatusCode::CREATED,
        Json(CreatedEntryResponse {
            id: created.id,
            readme_url: readme_url(kind, created.id),
            uid: created.uid,
        }),
    ))
}

async fn update_entry(
    State(app_state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    Path(id): Path<i32>,
    auth_user: AuthenticatedUser,
    Json(payload): Json<EntryRequest>,
) -> Result<Json<CatalogEntry>, CatalogError> {
    let payload = payload.validated()?;
    let current = editable_entry(&app_state, kind, id, &auth_user).await?;

    if payload.projects() != current.projects() {
        ensure_may_file_under(&app_state, &auth_user, payload.projects()).await?;
    }

    if payload.name != current.name
        && app_state.catalog.repository(kind).find_by_name(&payload.name).await?.is_some()
    {
        return Err(CatalogError::Conflict(format!("an entry named {} already exists", payload.name)));
    }

    let updated = app_state.catalog.update_entry(kind, id, payload.into_update()).await?;
    Ok(Json(updated))
}

async fn delete_entry(
    State(app_state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    Path(id): Path<i32>,
    auth_user: AuthenticatedUser,
) -> Result<StatusCode, CatalogError> {
    editable_entry(&app_state, kind, id, &auth_user).await?;
    app_state.catalog.delete_entry(kind, id).await?;

    info!("{} deleted {} entry {}", auth_user.user.email, kind.table(), id);
    Ok(StatusCode::NO_CONTENT)
}

async fn export_csv(
    State(app_state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    Query(query): Query<EntryFilterQuery>,
    _auth_user: AuthenticatedUser,
) -> Result<Response, CatalogError> {
    let filter = EntryFilter::try_from(query)?;
    let entries = app_state.catalog.repository(kind).list_entries(&filter).await?;
    let body = entries_to_csv(&entries)?;

    debug!("Exported {} {} entries as CSV", entries.len(), kind.table());
    Ok(attachment("text/csv; charset=utf-8", &format!("{}.csv", kind.table()), body))
}

async fn download_readme(
    State(app_state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    Path(id): Path<i32>,
    _auth_user: AuthenticatedUser,
) -> Result<Response, CatalogError> {
    let entry = app_state
        .catalog
        .repository(kind)
        .get_entry_view(id)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("Entry {}", id)))?;

    Ok(attachment("text/plain; charset=utf-8", README_FILENAME, render_readme(&entry)))
}

fn attachment(content_type: &str, filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        body,
    )
        .into_response()
}
