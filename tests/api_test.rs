use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use catalog_rs::models::{User, UserRole};
use catalog_rs::repositories::UserRepository;
use catalog_rs::test_utils::{
    app_state_for, connect_test_database, create_test_project, create_test_user, test_app, unique_name,
};
use catalog_rs::Database;
use serde_json::{json, Value};

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

async fn server_for(database: &Database) -> TestServer {
    let state = app_state_for(database.clone(), "test").expect("Failed to build app state");
    let app = test_app(state).await.expect("Failed to create router");
    TestServer::new(app).expect("Failed to create test server")
}

/// Logs `user` in (test users share the password `asdf`) and returns the bearer header.
async fn login(server: &TestServer, user: &User) -> HeaderValue {
    let response = server
        .post("/api/auth/login")
        .json(&json!({ "email": user.email, "password": "asdf" }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["user"]["email"], user.email.as_str());
    let token = body["token"].as_str().expect("token in login response");
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

#[tokio::test]
async fn test_login_and_profile() {
    let database = require_database!();
    let server = server_for(&database).await;
    let user = create_test_user(&database, UserRole::Creator).await.unwrap();

    let auth = login(&server, &user).await;
    let response = server.get("/api/auth/profile").add_header(header::AUTHORIZATION, auth).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["id"], user.id);
    assert_eq!(body["role"], "Creator");
    assert!(body.get("password_hash").is_none());

    let response = server
        .post("/api/auth/login")
        .json(&json!({ "email": user.email, "password": "wrong" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_endpoints_reject_creators() {
    let database = require_database!();
    let server = server_for(&database).await;
    let creator = create_test_user(&database, UserRole::Creator).await.unwrap();
    let auth = login(&server, &creator).await;

    let response = server.get("/api/users").add_header(header::AUTHORIZATION, auth.clone()).await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = server
        .post("/api/projects")
        .add_header(header::AUTHORIZATION, auth)
        .json(&json!({ "name": unique_name("project"), "code": "ZZ" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_manages_projects_and_assignments() {
    let database = require_database!();
    let server = server_for(&database).await;
    let admin = create_test_user(&database, UserRole::Admin).await.unwrap();
    let creator = create_test_user(&database, UserRole::Creator).await.unwrap();
    let auth = login(&server, &admin).await;

    let name = unique_name("project");
    let response = server
        .post("/api/projects")
        .add_header(header::AUTHORIZATION, auth.clone())
        .json(&json!({ "name": name, "code": " ab1 " }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let project: Value = response.json();
    assert_eq!(project["code"], "AB1");
    let project_id = project["id"].as_i64().unwrap();

    let response = server
        .post("/api/projects")
        .add_header(header::AUTHORIZATION, auth.clone())
        .json(&json!({ "name": unique_name("project"), "code": "TOO-LONG-CODE" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/api/projects/name-check")
        .add_query_param("name", &name)
        .add_header(header::AUTHORIZATION, auth.clone())
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["name_exists"], true);

    let response = server
        .put(&format!("/api/users/{}/projects", creator.id))
        .add_header(header::AUTHORIZATION, auth.clone())
        .json(&json!({ "action": "assign", "project_ids": [project_id] }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["project_ids"], json!([project_id]));

    let response = server
        .put(&format!("/api/users/{}/projects", creator.id))
        .add_header(header::AUTHORIZATION, auth.clone())
        .json(&json!({ "action": "unassign", "project_ids": [project_id] }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["project_ids"], json!([]));

    let response = server
        .delete(&format!("/api/users/{}", admin.id))
        .add_header(header::AUTHORIZATION, auth)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_whitespace_only_text_fields_are_rejected() {
    let database = require_database!();
    let server = server_for(&database).await;
    let admin = create_test_user(&database, UserRole::Admin).await.unwrap();
    let ts = create_test_project(&database, "TS").await.unwrap();
    let auth = login(&server, &admin).await;

    let response = server
        .post("/api/projects")
        .add_header(header::AUTHORIZATION, auth.clone())
        .json(&json!({ "name": "   ", "code": "QQ" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .put(&format!("/api/projects/{}", ts.id))
        .add_header(header::AUTHORIZATION, auth.clone())
        .json(&json!({ "name": " \t " }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get(&format!("/api/projects/{}", ts.id))
        .add_header(header::AUTHORIZATION, auth.clone())
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["name"], ts.name.as_str());

    for (location_type, location) in [("server", "   "), ("  ", "/mnt/lab")] {
        let response = server
            .post("/api/data")
            .add_header(header::AUTHORIZATION, auth.clone())
            .json(&json!({
                "name": unique_name("blank"),
                "location_type": location_type,
                "location": location,
                "project_id_1": ts.id
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_creator_files_entries_only_under_assigned_projects() {
    let database = require_database!();
    let server = server_for(&database).await;
    let creator = create_test_user(&database, UserRole::Creator).await.unwrap();
    let ts = create_test_project(&database, "TS").await.unwrap();
    let as_project = create_test_project(&database, "AS").await.unwrap();
    let auth = login(&server, &creator).await;

    let name = unique_name("scan");
    let body = json!({
        "name": name,
        "description": "microscope scans",
        "location_type": "server",
        "location": "/mnt/lab/scans",
        "project_id_1": ts.id,
        "project_id_2": as_project.id
    });

    let response = server
        .post("/api/data")
        .add_header(header::AUTHORIZATION, auth.clone())
        .json(&body)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let users = UserRepository::new(database.pool().clone());
    users.assign_project(creator.id, ts.id).await.unwrap();
    users.assign_project(creator.id, as_project.id).await.unwrap();

    let response = server
        .post("/api/data")
        .add_header(header::AUTHORIZATION, auth.clone())
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);

    let created: Value = response.json();
    let id = created["id"].as_i64().unwrap();
    let uid = created["uid"].as_str().unwrap().to_string();
    assert!(uid.starts_with("CRC"));
    assert!(uid.ends_with("TSAS"));
    assert_eq!(created["readme_url"], format!("/api/data/{}/readme", id));

    // Same name again
    let response = server
        .post("/api/data")
        .add_header(header::AUTHORIZATION, auth.clone())
        .json(&body)
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let response = server
        .get(&format!("/api/data/{}/readme", id))
        .add_header(header::AUTHORIZATION, auth.clone())
        .await;
    response.assert_status_ok();
    let disposition = response.header(header::CONTENT_DISPOSITION);
    assert!(disposition.to_str().unwrap().contains("README.txt"));
    assert!(response.text().starts_with(&format!("uid: {}\n", uid)));

    let response = server
        .get("/api/data/export.csv")
        .add_query_param("name", &name)
        .add_header(header::AUTHORIZATION, auth.clone())
        .await;
    response.assert_status_ok();
    let csv = response.text();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains(&uid));

    let response = server
        .get("/api/data/mine")
        .add_header(header::AUTHORIZATION, auth.clone())
        .await;
    response.assert_status_ok();
    let mine: Vec<Value> = response.json();
    assert!(mine.iter().any(|entry| entry["uid"] == uid.as_str()));

    let response = server
        .get("/api/data")
        .add_query_param("from_date", "not-a-date")
        .add_header(header::AUTHORIZATION, auth.clone())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .delete(&format!("/api/data/{}", id))
        .add_header(header::AUTHORIZATION, auth.clone())
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = server
        .get(&format!("/api/data/{}", id))
        .add_header(header::AUTHORIZATION, auth)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unassigned_creator_cannot_edit_entry() {
    let database = require_database!();
    let server = server_for(&database).await;
    let admin = create_test_user(&database, UserRole::Admin).await.unwrap();
    let outsider = create_test_user(&database, UserRole::Creator).await.unwrap();
    let ts = create_test_project(&database, "TS").await.unwrap();

    let admin_auth = login(&server, &admin).await;
    let body = json!({
        "name": unique_name("record"),
        "location_type": "shelf",
        "location": "B2",
        "project_id_1": ts.id,
        "project_id_2": null
    });

    // Admins need no assignment
    let response = server
        .post("/api/records")
        .add_header(header::AUTHORIZATION, admin_auth)
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    assert!(created["uid"].as_str().unwrap().ends_with("TSXX"));
    let id = created["id"].as_i64().unwrap();

    let outsider_auth = login(&server, &outsider).await;
    let response = server
        .put(&format!("/api/records/{}", id))
        .add_header(header::AUTHORIZATION, outsider_auth.clone())
        .json(&body)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = server
        .delete(&format!("/api/records/{}", id))
        .add_header(header::AUTHORIZATION, outsider_auth)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}
