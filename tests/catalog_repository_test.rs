use std::collections::HashSet;

use catalog_rs::errors::CatalogError;
use catalog_rs::models::{CatalogKind, EntryFilter, EntryUpdate, NewCatalogEntry, ProjectSelection, UserRole};
use catalog_rs::repositories::{project_repository, EntryRepository, UserRepository};
use catalog_rs::services::uid::NO_SECOND_PROJECT_CODE;
use catalog_rs::services::CatalogService;
use catalog_rs::test_utils::{connect_test_database, create_test_project, create_test_user, unique_name};
use catalog_rs::Database;
use chrono::{Duration, NaiveDate, Utc};

macro_rules! require_database {
    () => {
        match connect_test_database().await {
            Some(database) => database,
            None => {
                eprintln!("TEST_DATABASE_URL not set or unreachable, skipping");
                return;
            }
        }
    };
}

fn new_entry(creator_id: i32, projects: ProjectSelection) -> NewCatalogEntry {
    NewCatalogEntry {
        name: unique_name("entry"),
        description: "calibration runs".to_string(),
        location_type: "server".to_string(),
        location: "/mnt/lab/runs".to_string(),
        creator_id,
        projects,
        archived: false,
    }
}

fn service(database: &Database) -> CatalogService {
    CatalogService::new(database.clone(), "CRC")
}

#[tokio::test]
async fn test_resolve_codes_keeps_selection_order() {
    let database = require_database!();
    let ts = create_test_project(&database, "TS").await.unwrap();
    let as_project = create_test_project(&database, "AS").await.unwrap();

    let codes = project_repository::resolve_codes(database.pool(), ProjectSelection::Pair(ts.id, as_project.id))
        .await
        .unwrap();
    assert_eq!((codes.first.as_str(), codes.second.as_str()), ("TS", "AS"));

    let codes = project_repository::resolve_codes(database.pool(), ProjectSelection::Pair(as_project.id, ts.id))
        .await
        .unwrap();
    assert_eq!((codes.first.as_str(), codes.second.as_str()), ("AS", "TS"));
}

#[tokio::test]
async fn test_resolve_codes_single_project_uses_placeholder() {
    let database = require_database!();
    let ts = create_test_project(&database, "TS").await.unwrap();

    for selection in [ProjectSelection::new(ts.id, None), ProjectSelection::new(ts.id, Some(ts.id))] {
        let codes = project_repository::resolve_codes(database.pool(), selection).await.unwrap();
        assert_eq!(codes.first, "TS");
        assert_eq!(codes.second, NO_SECOND_PROJECT_CODE);
    }
}

#[tokio::test]
async fn test_resolve_codes_unknown_project_is_not_found() {
    let database = require_database!();
    let ts = create_test_project(&database, "TS").await.unwrap();

    let result = project_repository::resolve_codes(database.pool(), ProjectSelection::Pair(ts.id, i32::MAX)).await;
    assert!(matches!(result, Err(CatalogError::NotFound(_))));
}

#[tokio::test]
async fn test_create_then_fetch_round_trip() {
    let database = require_database!();
    let user = create_test_user(&database, UserRole::Creator).await.unwrap();
    let ts = create_test_project(&database, "TS").await.unwrap();
    let as_project = create_test_project(&database, "AS").await.unwrap();

    let entry = new_entry(user.id, ProjectSelection::Pair(ts.id, as_project.id));
    let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    let created = service(&database)
        .create_entry_on(CatalogKind::Data, entry.clone(), date)
        .await
        .unwrap();

    assert!(created.uid.starts_with("CRC20240131"));
    assert!(created.uid.ends_with("TSAS"));
    assert!(created.uid.len() >= "CRC20240131001TSAS".len());

    let stored = EntryRepository::new(database.pool().clone(), CatalogKind::Data)
        .get_entry(created.id)
        .await
        .unwrap()
        .expect("entry should exist");

    assert_eq!(stored.uid, created.uid);
    assert_eq!(stored.name, entry.name);
    assert_eq!(stored.description, entry.description);
    assert_eq!(stored.location_type, entry.location_type);
    assert_eq!(stored.location, entry.location);
    assert_eq!(stored.creator_id, user.id);
    assert_eq!(stored.projects(), ProjectSelection::Pair(ts.id, as_project.id));
    assert!(!stored.archived);
}

#[tokio::test]
async fn test_single_project_entry_stores_null_second_project() {
    let database = require_database!();
    let user = create_test_user(&database, UserRole::Creator).await.unwrap();
    let ts = create_test_project(&database, "TS").await.unwrap();

    let created = service(&database)
        .create_entry(CatalogKind::Record, new_entry(user.id, ProjectSelection::new(ts.id, Some(ts.id))))
        .await
        .unwrap();
    assert!(created.uid.ends_with("TSXX"));

    let view = EntryRepository::new(database.pool().clone(), CatalogKind::Record)
        .get_entry_view(created.id)
        .await
        .unwrap()
        .expect("entry should exist");
    assert_eq!(view.project_id_2, None);
    assert_eq!(view.project2_name, None);
    assert_eq!(view.creator_email, user.email);
}

#[tokio::test]
async fn test_create_with_unknown_project_inserts_nothing() {
    let database = require_database!();
    let user = create_test_user(&database, UserRole::Creator).await.unwrap();
    let entry = new_entry(user.id, ProjectSelection::Single(i32::MAX));
    let name = entry.name.clone();

    let result = service(&database).create_entry(CatalogKind::Data, entry).await;
    assert!(matches!(result, Err(CatalogError::NotFound(_))));

    let repository = EntryRepository::new(database.pool().clone(), CatalogKind::Data);
    assert!(repository.find_by_name(&name).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_name_is_conflict() {
    let database = require_database!();
    let user = create_test_user(&database, UserRole::Creator).await.unwrap();
    let ts = create_test_project(&database, "TS").await.unwrap();

    let entry = new_entry(user.id, ProjectSelection::Single(ts.id));
    let catalog = service(&database);
    catalog.create_entry(CatalogKind::Data, entry.clone()).await.unwrap();

    let result = catalog.create_entry(CatalogKind::Data, entry).await;
    assert!(matches!(result, Err(CatalogError::Conflict(_))));
}

#[tokio::test]
async fn test_concurrent_creations_get_distinct_uids() {
    let database = require_database!();
    let user = create_test_user(&database, UserRole::Creator).await.unwrap();
    let ts = create_test_project(&database, "TS").await.unwrap();
    let catalog = service(&database);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let catalog = catalog.clone();
            let entry = new_entry(user.id, ProjectSelection::Single(ts.id));
            tokio::spawn(async move { catalog.create_entry(CatalogKind::Record, entry).await })
        })
        .collect();

    let mut uids = HashSet::new();
    for handle in handles {
        let created = handle.await.unwrap().unwrap();
        uids.insert(created.uid);
    }

    assert_eq!(uids.len(), 8);
}

#[tokio::test]
async fn test_filters_narrow_the_listing() {
    let database = require_database!();
    let user = create_test_user(&database, UserRole::Creator).await.unwrap();
    let ts = create_test_project(&database, "TS").await.unwrap();
    let as_project = create_test_project(&database, "AS").await.unwrap();

    let entry = new_entry(user.id, ProjectSelection::Pair(ts.id, as_project.id));
    let name = entry.name.clone();
    let created = service(&database).create_entry(CatalogKind::Data, entry).await.unwrap();
    let repository = EntryRepository::new(database.pool().clone(), CatalogKind::Data);

    let by_name = EntryFilter { name: Some(name.to_uppercase()), ..Default::default() };
    let found = repository.list_entries(&by_name).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, created.id);

    // Second project slot matches too
    let by_project = EntryFilter { project: Some(as_project.id), ..Default::default() };
    assert!(repository.list_entries(&by_project).await.unwrap().iter().any(|e| e.id == created.id));

    let today = Utc::now().date_naive();
    let through_today = EntryFilter {
        email: Some(user.email.clone()),
        from_date: Some(today),
        to_date: Some(today),
        ..Default::default()
    };
    assert_eq!(repository.list_entries(&through_today).await.unwrap().len(), 1);

    let until_yesterday = EntryFilter {
        email: Some(user.email.clone()),
        to_date: Some(today - Duration::days(1)),
        ..Default::default()
    };
    assert!(repository.list_entries(&until_yesterday).await.unwrap().is_empty());

    let archived = EntryFilter { email: Some(user.email.clone()), archived: Some(true), ..Default::default() };
    assert!(repository.list_entries(&archived).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_mine_lists_entries_of_assigned_projects() {
    let database = require_database!();
    let owner = create_test_user(&database, UserRole::Creator).await.unwrap();
    let member = create_test_user(&database, UserRole::Creator).await.unwrap();
    let ts = create_test_project(&database, "TS").await.unwrap();
    let as_project = create_test_project(&database, "AS").await.unwrap();

    let created = service(&database)
        .create_entry(CatalogKind::Data, new_entry(owner.id, ProjectSelection::Pair(ts.id, as_project.id)))
        .await
        .unwrap();
    let repository = EntryRepository::new(database.pool().clone(), CatalogKind::Data);

    assert!(repository.list_for_user_projects(member.id).await.unwrap().is_empty());

    UserRepository::new(database.pool().clone())
        .assign_project(member.id, as_project.id)
        .await
        .unwrap();
    let mine = repository.list_for_user_projects(member.id).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, created.id);
}

#[tokio::test]
async fn test_update_keeps_uid_and_delete_reports_missing() {
    let database = require_database!();
    let user = create_test_user(&database, UserRole::Creator).await.unwrap();
    let ts = create_test_project(&database, "TS").await.unwrap();
    let as_project = create_test_project(&database, "AS").await.unwrap();
    let catalog = service(&database);

    let created = catalog
        .create_entry(CatalogKind::Record, new_entry(user.id, ProjectSelection::Single(ts.id)))
        .await
        .unwrap();

    let update = EntryUpdate {
        name: unique_name("renamed"),
        description: "moved to tape".to_string(),
        location_type: "tape".to_string(),
        location: "T-0042".to_string(),
        projects: ProjectSelection::Pair(ts.id, as_project.id),
        archived: true,
    };
    let updated = catalog.update_entry(CatalogKind::Record, created.id, update.clone()).await.unwrap();
    assert_eq!(updated.uid, created.uid);
    assert_eq!(updated.name, update.name);
    assert_eq!(updated.project_id_2, Some(as_project.id));
    assert!(updated.archived);

    let bad_projects = EntryUpdate { projects: ProjectSelection::Single(i32::MAX), ..update.clone() };
    let result = catalog.update_entry(CatalogKind::Record, created.id, bad_projects).await;
    assert!(matches!(result, Err(CatalogError::NotFound(_))));

    let result = catalog.update_entry(CatalogKind::Record, i32::MAX, update).await;
    assert!(matches!(result, Err(CatalogError::NotFound(_))));

    catalog.delete_entry(CatalogKind::Record, created.id).await.unwrap();
    let result = catalog.delete_entry(CatalogKind::Record, created.id).await;
    assert!(matches!(result, Err(CatalogError::NotFound(_))));
}

#[tokio::test]
async fn test_create_after_deleting_newest_entry_succeeds() {
    let database = require_database!();
    let user = create_test_user(&database, UserRole::Creator).await.unwrap();
    let ts = create_test_project(&database, "TS").await.unwrap();
    let as_project = create_test_project(&database, "AS").await.unwrap();
    let catalog = service(&database);
    let selection = ProjectSelection::Pair(ts.id, as_project.id);

    let first = catalog
        .create_entry(CatalogKind::Data, new_entry(user.id, selection))
        .await
        .unwrap();
    catalog.delete_entry(CatalogKind::Data, first.id).await.unwrap();

    let second = catalog
        .create_entry(CatalogKind::Data, new_entry(user.id, selection))
        .await
        .unwrap();
    assert!(second.id > first.id);
    assert!(second.uid.ends_with("TSAS"));

    let repository = EntryRepository::new(database.pool().clone(), CatalogKind::Data);
    let stored = repository.get_entry(second.id).await.unwrap().expect("entry was stored");
    assert_eq!(stored.uid, second.uid);
}

#[tokio::test]
async fn test_referenced_project_cannot_be_deleted() {
    let database = require_database!();
    let user = create_test_user(&database, UserRole::Creator).await.unwrap();
    let ts = create_test_project(&database, "TS").await.unwrap();

    service(&database)
        .create_entry(CatalogKind::Data, new_entry(user.id, ProjectSelection::Single(ts.id)))
        .await
        .unwrap();

    let projects = catalog_rs::repositories::ProjectRepository::new(database.pool().clone());
    let result = projects.delete_project(ts.id).await;
    assert!(matches!(result, Err(CatalogError::Conflict(_))));
}
