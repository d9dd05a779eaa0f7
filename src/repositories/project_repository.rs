use sqlx::{PgExecutor, PgPool};

use crate::errors::CatalogError;
use crate::models::{NewProject, Project, ProjectSelection};
use crate::services::uid::{codes_in_order, ProjectCodes};

const PROJECT_COLUMNS: &str = "id, name, code, finished, created_at";

pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>, CatalogError> {
        let projects = sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM project ORDER BY name",
            PROJECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(projects)
    }

    pub async fn get_project(&self, id: i32) -> Result<Option<Project>, CatalogError> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM project WHERE id = $1",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(project)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Project>, CatalogError> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM project WHERE name = $1",
            PROJECT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(project)
    }

    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<Project>, CatalogError> {
        let projects = sqlx::query_as::<_, Project>(
            "SELECT p.id, p.name, p.code, p.finished, p.created_at
             FROM project p
             JOIN userprojects up ON up.project_id = p.id
             WHERE up.user_id = $1
             ORDER BY p.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(projects)
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<Project, CatalogError> {
        let created = sqlx::query_as::<_, Project>(&format!(
            "INSERT INTO project (name, code, finished) VALUES ($1, $2, $3) RETURNING {}",
            PROJECT_COLUMNS
        ))
        .bind(&project.name)
        .bind(&project.code)
        .bind(project.finished)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Renames a project and sets its finished flag. The code never changes.
    pub async fn update_project(
        &self,
        id: i32,
        name: &str,
        finished: bool,
    ) -> Result<Option<Project>, CatalogError> {
        let updated = sqlx::query_as::<_, Project>(&format!(
            "UPDATE project SET name = $2, finished = $3 WHERE id = $1 RETURNING {}",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .bind(name)
        .bind(finished)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    pub async fn delete_project(&self, id: i32) -> Result<bool, CatalogError> {
        let result = sqlx::query("DELETE FROM project WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// `(id, code)` rows for the given project ids, in storage order.
pub async fn fetch_codes<'e, E>(executor: E, ids: &[i32]) -> Result<Vec<(i32, String)>, CatalogError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, (i32, String)>("SELECT id, code FROM project WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(executor)
        .await?;

    Ok(rows)
}

/// Codes for the selected projects, `XX` standing in for a missing second one.
pub async fn resolve_codes<'e, E>(executor: E, selection: ProjectSelection) -> Result<ProjectCodes, CatalogError>
where
    E: PgExecutor<'e>,
{
    let rows = fetch_codes(executor, &selection.ids()).await?;
    codes_in_order(selection, &rows)
}
