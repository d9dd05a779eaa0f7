use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::errors::CatalogError;
use crate::models::{CatalogEntry, CatalogKind, EntryUpdate, NewCatalogEntry, ProjectSelection};
use crate::repositories::{entry_repository, project_repository, EntryRepository};
use crate::services::uid::{format_uid, next_ordinal};

#[derive(Debug, Clone, Serialize)]
pub struct CreatedEntry {
    pub id: i32,
    pub uid: String,
}

/// Write path for both catalogs.
#[derive(Clone)]
pub struct CatalogService {
    database: Database,
    uid_prefix: String,
}

impl CatalogService {
    pub fn new(database: Database, uid_prefix: impl Into<String>) -> Self {
        Self { database, uid_prefix: uid_prefix.into() }
    }

    pub fn uid_prefix(&self) -> &str {
        &self.uid_prefix
    }

    pub fn repository(&self, kind: CatalogKind) -> EntryRepository {
        EntryRepository::new(self.database.pool().clone(), kind)
    }

    pub async fn create_entry(&self, kind: CatalogKind, entry: NewCatalogEntry) -> Result<CreatedEntry, CatalogError> {
        self.create_entry_on(kind, entry, Local::now().date_naive()).await
    }

    /// Creates an entry whose UID carries `date`.
    ///
    /// Code lookup, ordinal allocation and the insert share one transaction
    /// holding the catalog's advisory lock, so concurrent creations on the
    /// same catalog are serialized and never compute the same ordinal.
    pub async fn create_entry_on(
        &self,
        kind: CatalogKind,
        entry: NewCatalogEntry,
        date: NaiveDate,
    ) -> Result<CreatedEntry, CatalogError> {
        let mut tx = self.database.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(kind.lock_key())
            .execute(&mut *tx)
            .await?;

        let codes = project_repository::resolve_codes(&mut *tx, entry.projects).await?;
        let max_id = entry_repository::max_entry_id(&mut *tx, kind).await?;
        let ordinal = next_ordinal(max_id);
        let uid = format_uid(&self.uid_prefix, date, &ordinal, &codes.first, &codes.second);
        debug!("Allocated UID {} for new {} entry '{}'", uid, kind.table(), entry.name);

        let id = entry_repository::insert_entry(&mut *tx, kind, &entry, &uid, Utc::now()).await?;
        tx.commit().await?;

        info!("Created {} entry {} with UID {}", kind.table(), id, uid);
        Ok(CreatedEntry { id, uid })
    }

    /// Applies `update`; the UID keeps the codes it was created with.
    pub async fn update_entry(
        &self,
        kind: CatalogKind,
        id: i32,
        update: EntryUpdate,
    ) -> Result<CatalogEntry, CatalogError> {
        self.ensure_projects_exist(update.projects).await?;

        let updated = self
            .repository(kind)
            .update_entry(id, &update)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("Entry {}", id)))?;

        info!("Updated {} entry {}", kind.table(), id);
        Ok(updated)
    }

    pub async fn delete_entry(&self, kind: CatalogKind, id: i32) -> Result<(), CatalogError> {
        if !self.repository(kind).delete_entry(id).await? {
            warn!("Attempted to delete missing {} entry {}", kind.table(), id);
            return Err(CatalogError::not_found(format!("Entry {}", id)));
        }

        info!("Deleted {} entry {}", kind.table(), id);
        Ok(())
    }

    async fn ensure_projects_exist(&self, selection: ProjectSelection) -> Result<(), CatalogError> {
        project_repository::resolve_codes(self.database.pool(), selection)
            .await
            .map(|_| ())
    }
}
