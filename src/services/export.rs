use crate::errors::CatalogError;
use crate::models::CatalogEntryView;

pub const README_FILENAME: &str = "README.txt";

const CSV_HEADER: [&str; 13] = [
    "id",
    "uid",
    "name",
    "description",
    "location_type",
    "location",
    "archived",
    "created_at",
    "creator_email",
    "creator_firstname",
    "creator_lastname",
    "project1_name",
    "project2_name",
];

/// Plain-text description of one entry, one `key: value` per line.
pub fn render_readme(entry: &CatalogEntryView) -> String {
    let fields: [(&str, String); 12] = [
        ("uid", entry.uid.clone()),
        ("name", entry.name.clone()),
        ("description", entry.description.clone()),
        ("location_type", entry.location_type.clone()),
        ("location", entry.location.clone()),
        ("archived", entry.archived.to_string()),
        ("created_at", entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
        ("creator", format!("{} {}", entry.creator_firstname, entry.creator_lastname)),
        ("creator_email", entry.creator_email.clone()),
        ("project1_name", entry.project1_name.clone()),
        ("project2_name", entry.project2_name.clone().unwrap_or_default()),
        ("id", entry.id.to_string()),
    ];

    fields
        .iter()
        .map(|(key, value)| format!("{}: {}\n", key, value))
        .collect()
}

pub fn entries_to_csv(entries: &[CatalogEntryView]) -> Result<String, CatalogError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for entry in entries {
        writer.write_record([
            entry.id.to_string(),
            entry.uid.clone(),
            entry.name.clone(),
            entry.description.clone(),
            entry.location_type.clone(),
            entry.location.clone(),
            entry.archived.to_string(),
            entry.created_at.to_rfc3339(),
            entry.creator_email.clone(),
            entry.creator_firstname.clone(),
            entry.creator_lastname.clone(),
            entry.project1_name.clone(),
            entry.project2_name.clone().unwrap_or_default(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CatalogError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CatalogError::Export(e.to_string()))
}
