use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::ProjectSelection;

/// Which of the two catalogs an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Data,
    Record,
}

impl CatalogKind {
    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::Data => "data",
            CatalogKind::Record => "record",
        }
    }

    /// Path segment under `/api`.
    pub fn route(&self) -> &'static str {
        match self {
            CatalogKind::Data => "data",
            CatalogKind::Record => "records",
        }
    }

    /// Key for the advisory lock that serializes ordinal allocation.
    pub fn lock_key(&self) -> i64 {
        match self {
            CatalogKind::Data => 0x4341_5441_0001,
            CatalogKind::Record => 0x4341_5441_0002,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, FromRow)]
pub struct CatalogEntry {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub location_type: String,
    pub location: String,
    pub creator_id: i32,
    pub project_id_1: i32,
    pub project_id_2: Option<i32>,
    pub archived: bool,
    pub uid: String,
    pub created_at: DateTime<Utc>,
}

impl CatalogEntry {
    pub fn projects(&self) -> ProjectSelection {
        ProjectSelection::new(self.project_id_1, self.project_id_2)
    }
}

/// An entry joined with its creator and project names.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct CatalogEntryView {
    pub id: i32,
    pub uid: String,
    pub name: String,
    pub description: String,
    pub location_type: String,
    pub location: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub creator_id: i32,
    pub creator_email: String,
    pub creator_firstname: String,
    pub creator_lastname: String,
    pub project_id_1: i32,
    pub project1_name: String,
    pub project_id_2: Option<i32>,
    pub project2_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCatalogEntry {
    pub name: String,
    pub description: String,
    pub location_type: String,
    pub location: String,
    pub creator_id: i32,
    pub projects: ProjectSelection,
    pub archived: bool,
}

#[derive(Debug, Clone)]
pub struct EntryUpdate {
    pub name: String,
    pub description: String,
    pub location_type: String,
    pub location: String,
    pub projects: ProjectSelection,
    pub archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    /// Case-insensitive substring of the entry name.
    pub name: Option<String>,
    pub email: Option<String>,
    pub location_type: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub archived: Option<bool>,
    /// Matches either project slot.
    pub project: Option<i32>,
    pub creator_id: Option<i32>,
    /// Case-insensitive substring of the UID.
    pub uid: Option<String>,
}

impl EntryFilter {
    pub fn is_empty(&self) -> bool {
        *self == EntryFilter::default()
    }
}
