use chrono::{DateTime, NaiveTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};

use crate::errors::CatalogError;
use crate::models::{CatalogEntry, CatalogEntryView, CatalogKind, EntryFilter, EntryUpdate, NewCatalogEntry};

const ENTRY_COLUMNS: &str = "id, name, description, location_type, location, creator_id, \
     project_id_1, project_id_2, archived, uid, created_at";

fn view_select(kind: CatalogKind) -> String {
    format!(
        "SELECT e.id, e.uid, e.name, e.description, e.location_type, e.location, e.archived, \
         e.created_at, e.creator_id, u.email AS creator_email, u.firstname AS creator_firstname, \
         u.lastname AS creator_lastname, e.project_id_1, p1.name AS project1_name, \
         e.project_id_2, p2.name AS project2_name \
         FROM {} e \
         JOIN users u ON e.creator_id = u.id \
         JOIN project p1 ON e.project_id_1 = p1.id \
         LEFT JOIN project p2 ON e.project_id_2 = p2.id",
        kind.table()
    )
}

/// Listing query for `filter`, newest entries first.
pub fn build_filter_query(kind: CatalogKind, filter: &EntryFilter) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(view_select(kind));
    query.push(" WHERE 1=1");

    if let Some(name) = &filter.name {
        query.push(" AND e.name ILIKE ").push_bind(format!("%{}%", name));
    }

    if let Some(email) = &filter.email {
        query.push(" AND u.email = ").push_bind(email.clone());
    }

    if let Some(location_type) = &filter.location_type {
        query.push(" AND e.location_type = ").push_bind(location_type.clone());
    }

    if let Some(from_date) = filter.from_date {
        let start = from_date.and_time(NaiveTime::MIN).and_utc();
        query.push(" AND e.created_at >= ").push_bind(start);
    }

    if let Some(to_date) = filter.to_date {
        // Inclusive: everything before the next midnight
        let end = to_date
            .succ_opt()
            .map(|next| next.and_time(NaiveTime::MIN).and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        query.push(" AND e.created_at < ").push_bind(end);
    }

    if let Some(archived) = filter.archived {
        query.push(" AND e.archived = ").push_bind(archived);
    }

    if let Some(project) = filter.project {
        query
            .push(" AND (e.project_id_1 = ")
            .push_bind(project)
            .push(" OR e.project_id_2 = ")
            .push_bind(project)
            .push(")");
    }

    if let Some(creator_id) = filter.creator_id {
        query.push(" AND e.creator_id = ").push_bind(creator_id);
    }

    if let Some(uid) = &filter.uid {
        query.push(" AND e.uid ILIKE ").push_bind(format!("%{}%", uid));
    }

    query.push(" ORDER BY e.created_at DESC, e.id DESC");
    query
}

/// Highest entry id in the catalog, `None` when it is empty.
pub async fn max_entry_id<'e, E>(executor: E, kind: CatalogKind) -> Result<Option<i32>, CatalogError>
where
    E: PgExecutor<'e>,
{
    let max_id = sqlx::query_scalar::<_, Option<i32>>(&format!("SELECT MAX(id) FROM {}", kind.table()))
        .fetch_one(executor)
        .await?;

    Ok(max_id)
}

/// Inserts a new entry carrying an already computed UID and returns its id.
pub async fn insert_entry<'e, E>(
    executor: E,
    kind: CatalogKind,
    entry: &NewCatalogEntry,
    uid: &str,
    created_at: DateTime<Utc>,
) -> Result<i32, CatalogError>
where
    E: PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, i32>(&format!(
        "INSERT INTO {} (creator_id, project_id_1, project_id_2, created_at, name, description, \
         location_type, location, archived, uid) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING id",
        kind.table()
    ))
    .bind(entry.creator_id)
    .bind(entry.projects.primary())
    .bind(entry.projects.secondary())
    .bind(created_at)
    .bind(&entry.name)
    .bind(&entry.description)
    .bind(&entry.location_type)
    .bind(&entry.location)
    .bind(entry.archived)
    .bind(uid)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

pub struct EntryRepository {
    pool: PgPool,
    kind: CatalogKind,
}

impl EntryRepository {
    pub fn new(pool: PgPool, kind: CatalogKind) -> Self {
        Self { pool, kind }
    }

    pub async fn get_entry(&self, id: i32) -> Result<Option<CatalogEntry>, CatalogError> {
        let entry = sqlx::query_as::<_, CatalogEntry>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            ENTRY_COLUMNS,
            self.kind.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    pub async fn get_entry_view(&self, id: i32) -> Result<Option<CatalogEntryView>, CatalogError> {
        let entry = sqlx::query_as::<_, CatalogEntryView>(&format!(
            "{} WHERE e.id = $1",
            view_select(self.kind)
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        let entry = sqlx::query_as::<_, CatalogEntry>(&format!(
            "SELECT {} FROM {} WHERE name = $1",
            ENTRY_COLUMNS,
            self.kind.table()
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    pub async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<CatalogEntryView>, CatalogError> {
        let mut query = build_filter_query(self.kind, filter);
        let entries = query
            .build_query_as::<CatalogEntryView>()
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Entries filed under at least one project assigned to `user_id`.
    pub async fn list_for_user_projects(&self, user_id: i32) -> Result<Vec<CatalogEntryView>, CatalogError> {
        let entries = sqlx::query_as::<_, CatalogEntryView>(&format!(
            "{} WHERE EXISTS ( \
                SELECT 1 FROM userprojects up \
                WHERE up.user_id = $1 \
                  AND (up.project_id = e.project_id_1 OR up.project_id = e.project_id_2) \
             ) \
             ORDER BY e.created_at DESC, e.id DESC",
            view_select(self.kind)
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Updates everything but the UID, creator and creation time.
    pub async fn update_entry(&self, id: i32, update: &EntryUpdate) -> Result<Option<CatalogEntry>, CatalogError> {
        let entry = sqlx::query_as::<_, CatalogEntry>(&format!(
            "UPDATE {} SET name = $2, description = $3, location_type = $4, location = $5, \
             archived = $6, project_id_1 = $7, project_id_2 = $8 \
             WHERE id = $1 RETURNING {}",
            self.kind.table(),
            ENTRY_COLUMNS
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(&update.location_type)
        .bind(&update.location)
        .bind(update.archived)
        .bind(update.projects.primary())
        .bind(update.projects.secondary())
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    pub async fn delete_entry(&self, id: i32) -> Result<bool, CatalogError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", self.kind.table()))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
