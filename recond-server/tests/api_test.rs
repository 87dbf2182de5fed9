use axum::http::StatusCode;
use axum_test::TestServer;
use recond_server::{
    infra::{app_state::AppState, config::Config},
    routes,
};
use serde_json::{Value, json};
use tempfile::TempDir;

fn test_server() -> (TempDir, TestServer) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config {
        server_host: "127.0.0.1".into(),
        server_port: 0,
        data_dir: dir.path().to_path_buf(),
        cors_allowed_origins: Vec::new(),
        log_tail_limit: 200,
    };
    let state = AppState::new(config);
    let server = TestServer::new(routes::create_router(state)).expect("test server");
    (dir, server)
}

#[tokio::test]
async fn create_project_then_read_it_back() {
    let (_dir, server) = test_server();

    let created = server
        .post("/api/create-project")
        .json(&json!({ "projectName": "acme" }))
        .await;
    created.assert_status(StatusCode::CREATED);
    assert_eq!(created.json::<Value>()["name"], "acme");

    let listed = server.get("/api/projects").await;
    listed.assert_status_ok();
    let projects = listed.json::<Value>();
    assert_eq!(projects[0]["name"], "acme");

    let fetched = server.get("/api/projects/acme").await;
    fetched.assert_status_ok();
    let project = fetched.json::<Value>();
    assert_eq!(project["name"], "acme");
    assert_eq!(project["domains"], json!([]));
    assert_eq!(project["wildcards"], json!([]));
    assert_eq!(project["out_of_scope"], json!([]));
}

#[tokio::test]
async fn creating_an_existing_project_conflicts() {
    let (_dir, server) = test_server();
    server
        .post("/api/create-project")
        .json(&json!({ "projectName": "acme" }))
        .await
        .assert_status(StatusCode::CREATED);

    let duplicate = server
        .post("/api/create-project")
        .json(&json!({ "projectName": "acme" }))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);
    assert!(duplicate.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn scope_mutation_round_trip() {
    let (_dir, server) = test_server();
    server
        .post("/api/create-project")
        .json(&json!({ "projectName": "acme" }))
        .await
        .assert_status(StatusCode::CREATED);

    let added = server
        .post("/api/projects/acme/targets")
        .json(&json!({ "target": "acme.com", "type": "domain" }))
        .await;
    added.assert_status(StatusCode::CREATED);
    assert_eq!(added.json::<Value>()["domains"], json!(["acme.com"]));

    // Duplicate target within the same kind conflicts.
    let duplicate = server
        .post("/api/projects/acme/targets")
        .json(&json!({ "target": "ACME.com", "type": "domain" }))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);

    // Unknown scope kinds are rejected outright.
    let bad_kind = server
        .post("/api/projects/acme/targets")
        .json(&json!({ "target": "acme.com", "type": "subdomain" }))
        .await;
    bad_kind.assert_status(StatusCode::BAD_REQUEST);

    let removed = server
        .delete("/api/projects/acme/targets")
        .add_query_param("target", "acme.com")
        .add_query_param("type", "domain")
        .await;
    removed.assert_status_ok();
    assert_eq!(removed.json::<Value>()["domains"], json!([]));

    let missing = server
        .delete("/api/projects/acme/targets")
        .add_query_param("target", "acme.com")
        .add_query_param("type", "domain")
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_project_is_not_found() {
    let (_dir, server) = test_server();
    let response = server.get("/api/projects/ghost").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn stats_reflect_scope_counts() {
    let (_dir, server) = test_server();
    server
        .post("/api/create-project")
        .json(&json!({ "projectName": "acme" }))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post("/api/projects/acme/targets")
        .json(&json!({ "target": "acme.com", "type": "domain" }))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post("/api/projects/acme/targets")
        .json(&json!({ "target": "*.acme.com", "type": "wildcard" }))
        .await
        .assert_status(StatusCode::CREATED);

    let stats = server.get("/api/projects/acme/stats").await;
    stats.assert_status_ok();
    let stats = stats.json::<Value>();
    assert_eq!(stats["domains"], 1);
    assert_eq!(stats["wildcards"], 1);
    assert_eq!(stats["subdomains"], 0);
}

#[tokio::test]
async fn module_catalog_is_served() {
    let (_dir, server) = test_server();
    let response = server.get("/api/modules").await;
    response.assert_status_ok();

    let modules = response.json::<Value>();
    let names: Vec<&str> = modules
        .as_array()
        .expect("array")
        .iter()
        .map(|m| m["name"].as_str().expect("name"))
        .collect();
    assert!(names.contains(&"subfinder"));
    assert!(names.contains(&"vuln_scan"));
    for module in modules.as_array().expect("array") {
        assert!(module["description"].is_string());
        assert!(module["locked"].is_boolean());
    }
}
