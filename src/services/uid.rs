//! Entry UID grammar: `PREFIX + YYYYMMDD + ordinal + code_1 + code_2`.
//!
//! Everything here is pure. The database reads that feed these functions
//! (highest entry id, project codes) live in the repositories, and
//! [`crate::services::catalog::CatalogService`] runs them under a lock.

use chrono::NaiveDate;
use serde::Serialize;

use crate::errors::CatalogError;
use crate::models::ProjectSelection;

/// Second code used when an entry has only one project.
pub const NO_SECOND_PROJECT_CODE: &str = "XX";

/// Minimum width of the ordinal; larger numbers keep all their digits.
pub const ORDINAL_WIDTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectCodes {
    pub first: String,
    pub second: String,
}

/// Ordinal for the next entry given the highest existing id.
pub fn next_ordinal(max_id: Option<i32>) -> String {
    let next = max_id.map_or(1, |id| i64::from(id) + 1);
    format!("{:0width$}", next, width = ORDINAL_WIDTH)
}

pub fn format_uid(prefix: &str, date: NaiveDate, ordinal: &str, code_1: &str, code_2: &str) -> String {
    format!("{}{}{}{}{}", prefix, date.format("%Y%m%d"), ordinal, code_1, code_2)
}

/// Picks the codes for `selection` out of `(id, code)` rows in any order.
pub fn codes_in_order(
    selection: ProjectSelection,
    rows: &[(i32, String)],
) -> Result<ProjectCodes, CatalogError> {
    let code_for = |id: i32| {
        rows.iter()
            .find(|(row_id, _)| *row_id == id)
            .map(|(_, code)| code.clone())
            .ok_or_else(|| CatalogError::not_found(format!("Project {}", id)))
    };

    let first = code_for(selection.primary())?;
    let second = match selection.secondary() {
        Some(id) => code_for(id)?,
        None => NO_SECOND_PROJECT_CODE.to_string(),
    };

    Ok(ProjectCodes { first, second })
}
