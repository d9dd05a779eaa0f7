use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct Project {
    pub id: i32,
    pub name: String,
    /// Short code embedded in entry UIDs.
    pub code: String,
    pub finished: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub code: String,
    pub finished: bool,
}

/// Normalizes a user-supplied project code: trimmed and upper-cased.
pub fn normalize_project_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn is_valid_project_code(code: &str) -> bool {
    (1..=8).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphanumeric())
}

/// The one or two projects an entry is filed under.
///
/// A missing second project, or a second project equal to the first,
/// collapses to `Single`; there is no other "no project" marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectSelection {
    Single(i32),
    Pair(i32, i32),
}

impl ProjectSelection {
    pub fn new(project_id_1: i32, project_id_2: Option<i32>) -> Self {
        match project_id_2 {
            Some(second) if second != project_id_1 => ProjectSelection::Pair(project_id_1, second),
            _ => ProjectSelection::Single(project_id_1),
        }
    }

    pub fn primary(&self) -> i32 {
        match *self {
            ProjectSelection::Single(id) | ProjectSelection::Pair(id, _) => id,
        }
    }

    pub fn secondary(&self) -> Option<i32> {
        match *self {
            ProjectSelection::Single(_) => None,
            ProjectSelection::Pair(_, id) => Some(id),
        }
    }

    pub fn ids(&self) -> Vec<i32> {
        match *self {
            ProjectSelection::Single(id) => vec![id],
            ProjectSelection::Pair(first, second) => vec![first, second],
        }
    }
}
