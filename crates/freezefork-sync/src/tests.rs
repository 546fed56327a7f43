//! Unit tests for freezefork-sync against an in-process mock backend

use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use freezefork_core::{
    DependencyGraphBuilder, IdentityComputer, InMemoryModel, Package, PackageAssembler,
    PackageMetadata,
};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::http::IDEMPOTENCY_KEY_HEADER;
use crate::*;

/// Serve `app` under `/api/v1` on an ephemeral port and return the base URL.
async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().nest("/api/v1", app))
            .await
            .unwrap();
    });
    format!("http://{addr}/api/v1")
}

fn gateway(base_url: String) -> HttpGateway {
    HttpGateway::new(GatewayConfig::new(base_url).with_timeout(Duration::from_secs(5))).unwrap()
}

fn project() -> ProjectRef {
    ProjectRef {
        id: "proj-1".to_string(),
        name: "Robot Arm".to_string(),
        description: None,
    }
}

/// Scan and package a three-file arm assembly.
fn arm_package() -> (TempDir, Package) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("arm.asm"), "assembly arm v1").unwrap();
    fs::create_dir(dir.path().join("parts")).unwrap();
    fs::write(dir.path().join("parts/base.part"), "solid base plate").unwrap();
    fs::write(dir.path().join("arm_drawing.draw"), "drawing sheet 1").unwrap();

    let model = InMemoryModel::new(dir.path())
        .unwrap()
        .case_insensitive(false)
        .with_root("arm.asm")
        .document(
            "arm.asm",
            vec![
                freezefork_core::CadReference::inferred("parts/base.part"),
                freezefork_core::CadReference::inferred("arm_drawing.draw"),
            ],
        )
        .unwrap();
    let graph = DependencyGraphBuilder::new()
        .case_insensitive(false)
        .scan_active(&model)
        .unwrap();
    let graph = IdentityComputer::with_workers(1).identify(graph);
    let package = PackageAssembler::new()
        .assemble(
            &graph,
            &PackageMetadata::new("Add gripper mechanism", "Sarah Johnson", "proj-1"),
        )
        .unwrap();
    (dir, package)
}

// ── Health ──────────────────────────────────────────────────

#[tokio::test]
async fn test_health_check_accepts_status_synonyms() {
    let healthy = spawn(Router::new().route(
        "/health",
        get(|| async { Json(json!({ "status": "healthy" })) }),
    ))
    .await;
    assert!(gateway(healthy).health_check().await.unwrap());

    let ok = spawn(Router::new().route("/health", get(|| async { Json(json!({ "status": "ok" })) })))
        .await;
    assert!(gateway(ok).health_check().await.unwrap());

    let degraded = spawn(Router::new().route(
        "/health",
        get(|| async { Json(json!({ "status": "degraded" })) }),
    ))
    .await;
    assert!(!gateway(degraded).health_check().await.unwrap());
}

#[tokio::test]
async fn test_health_check_unavailable() {
    let base = spawn(Router::new().route(
        "/health",
        get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    ))
    .await;
    assert!(!gateway(base).health_check().await.unwrap());
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = gateway(format!("http://{addr}/api/v1"))
        .list_projects()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SyncErrorKind::Network);
    assert!(err.is_transient());
}

// ── Projects ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_projects() {
    let base = spawn(Router::new().route(
        "/projects",
        get(|| async {
            Json(json!([
                { "id": "proj-1", "name": "Robot Arm", "description": "6-axis arm" },
                { "id": "proj-2", "name": "Gripper" }
            ]))
        }),
    ))
    .await;

    let projects = gateway(base).list_projects().await.unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].description.as_deref(), Some("6-axis arm"));
    assert_eq!(projects[1].name, "Gripper");
    assert_eq!(projects[1].description, None);
}

#[tokio::test]
async fn test_create_project_bodies() {
    let received: Arc<Mutex<Vec<Value>>> = Arc::default();
    let app = Router::new()
        .route(
            "/projects",
            post(
                |State(received): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                    received.lock().unwrap().push(body.clone());
                    Json(json!({
                        "id": "proj-9",
                        "name": body["name"],
                        "description": body.get("description"),
                    }))
                },
            ),
        )
        .with_state(received.clone());
    let gateway = gateway(spawn(app).await);

    let plain = gateway.create_project("Test Project").await.unwrap();
    assert_eq!(plain.id, "proj-9");
    assert_eq!(plain.name, "Test Project");

    let described = gateway
        .create_project_with_description("Arm", Some("Gripper rework"))
        .await
        .unwrap();
    assert_eq!(described.description.as_deref(), Some("Gripper rework"));

    let received = received.lock().unwrap();
    assert_eq!(received[0], json!({ "name": "Test Project" }));
    assert_eq!(
        received[1],
        json!({ "name": "Arm", "description": "Gripper rework" })
    );
}

// ── Submit ──────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ReceivedCommit {
    project_id: String,
    idempotency_key: Option<String>,
    fields: Vec<(String, String)>,
    files: Vec<(String, Vec<u8>)>,
}

async fn receive_commit(
    State(received): State<Arc<Mutex<Option<ReceivedCommit>>>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Json<Value> {
    let mut commit = ReceivedCommit {
        project_id,
        idempotency_key: headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ..ReceivedCommit::default()
    };
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => commit.files.push((file_name, field.bytes().await.unwrap().to_vec())),
            None => commit.fields.push((name, field.text().await.unwrap())),
        }
    }
    let uploaded = commit.files.len();
    *received.lock().unwrap() = Some(commit);
    Json(json!({
        "commit": { "id": "c-42", "timestamp": "2025-08-10T14:30:00Z" },
        "files_uploaded": uploaded,
    }))
}

#[tokio::test]
async fn test_submit_uploads_manifest_and_files() {
    let received: Arc<Mutex<Option<ReceivedCommit>>> = Arc::default();
    let app = Router::new()
        .route("/projects/:id/commits", post(receive_commit))
        .with_state(received.clone());
    let gateway = gateway(spawn(app).await);
    let (_dir, package) = arm_package();

    let result = gateway.submit(&package, &project()).await.unwrap();

    assert_eq!(result.commit_id, "c-42");
    assert_eq!(result.files_uploaded, 3);
    assert_eq!(
        result.accepted_at.map(|t| t.to_rfc3339()),
        Some("2025-08-10T14:30:00+00:00".to_string())
    );

    let received = received.lock().unwrap();
    let commit = received.as_ref().unwrap();
    assert_eq!(commit.project_id, "proj-1");
    assert_eq!(
        commit.idempotency_key.as_deref(),
        Some(package.idempotency_key().as_str())
    );

    let field = |name: &str| {
        commit
            .fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap()
    };
    assert_eq!(field("message"), "Add gripper mechanism");
    assert_eq!(field("author"), "Sarah Johnson");
    assert_eq!(field("branch"), "main");
    assert_eq!(field("aggregate_id"), package.aggregate_id().to_hex());

    let manifest: Value = serde_json::from_str(&field("manifest")).unwrap();
    assert_eq!(manifest["aggregate_id"], package.aggregate_id().to_hex());
    assert_eq!(manifest["files"].as_array().unwrap().len(), 3);
    assert_eq!(manifest["files"][0]["role"], "root_assembly");

    // names are relative to the root assembly's folder
    let names: Vec<_> = commit.files.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["arm.asm", "parts/base.part", "arm_drawing.draw"]);
    assert_eq!(commit.files[1].1, b"solid base plate");
}

#[tokio::test]
async fn test_submit_reads_files_with_their_disk_casing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Arm.SLDASM"), "assembly arm v1").unwrap();
    fs::create_dir(dir.path().join("Parts")).unwrap();
    fs::write(dir.path().join("Parts/Base.SLDPRT"), "solid base plate").unwrap();

    let model = InMemoryModel::new(dir.path())
        .unwrap()
        .case_insensitive(true)
        .with_root("Arm.SLDASM")
        .document(
            "Arm.SLDASM",
            vec![freezefork_core::CadReference::inferred("Parts/Base.SLDPRT")],
        )
        .unwrap();
    let graph = DependencyGraphBuilder::new()
        .case_insensitive(true)
        .scan_active(&model)
        .unwrap();
    let graph = IdentityComputer::with_workers(1).identify(graph);
    let package = PackageAssembler::new()
        .assemble(&graph, &PackageMetadata::new("Mixed case", "Sarah Johnson", "proj-1"))
        .unwrap();
    assert!(package.manifest()[1].path.as_str().ends_with("parts/base.sldprt"));

    let received: Arc<Mutex<Option<ReceivedCommit>>> = Arc::default();
    let app = Router::new()
        .route("/projects/:id/commits", post(receive_commit))
        .with_state(received.clone());
    let result = gateway(spawn(app).await)
        .submit(&package, &project())
        .await
        .unwrap();
    assert_eq!(result.files_uploaded, 2);

    let received = received.lock().unwrap();
    let commit = received.as_ref().unwrap();
    let names: Vec<_> = commit.files.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["Arm.SLDASM", "Parts/Base.SLDPRT"]);
    assert_eq!(commit.files[1].1, b"solid base plate");
}

/// Drain an upload and answer with `body`.
fn acknowledge(body: Value) -> Router {
    Router::new().route(
        "/projects/:id/commits",
        post(move |mut multipart: Multipart| async move {
            while let Some(field) = multipart.next_field().await.unwrap() {
                field.bytes().await.unwrap();
            }
            Json(body)
        }),
    )
}

#[tokio::test]
async fn test_submit_accepts_flat_commit_acknowledgement() {
    let (_dir, package) = arm_package();

    let camel = spawn(acknowledge(json!({
        "commitId": "c-7",
        "acceptedAt": "2025-08-10T14:30:00Z",
    })))
    .await;
    let result = gateway(camel).submit(&package, &project()).await.unwrap();
    assert_eq!(result.commit_id, "c-7");
    // no count reported: the parts sent
    assert_eq!(result.files_uploaded, 3);
    assert_eq!(
        result.accepted_at.map(|t| t.to_rfc3339()),
        Some("2025-08-10T14:30:00+00:00".to_string())
    );

    let snake = spawn(acknowledge(json!({
        "commit_id": "c-8",
        "accepted_at": "2025-08-11T09:00:00Z",
        "files_uploaded": 2,
    })))
    .await;
    let result = gateway(snake).submit(&package, &project()).await.unwrap();
    assert_eq!(result.commit_id, "c-8");
    assert_eq!(result.files_uploaded, 2);
    assert!(result.accepted_at.is_some());
}

#[tokio::test]
async fn test_submit_rejects_unrecognised_acknowledgement() {
    let (_dir, package) = arm_package();
    let base = spawn(acknowledge(json!({ "ok": true }))).await;

    let err = gateway(base).submit(&package, &project()).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_resubmission_reuses_idempotency_key() {
    let received: Arc<Mutex<Option<ReceivedCommit>>> = Arc::default();
    let app = Router::new()
        .route("/projects/:id/commits", post(receive_commit))
        .with_state(received.clone());
    let gateway = gateway(spawn(app).await);
    let (_dir, package) = arm_package();

    gateway.submit(&package, &project()).await.unwrap();
    let first = received.lock().unwrap().take().unwrap().idempotency_key;
    gateway.submit(&package, &project()).await.unwrap();
    let second = received.lock().unwrap().take().unwrap().idempotency_key;

    assert!(first.is_some());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_submit_auth_failure() {
    let base = spawn(Router::new().route(
        "/projects/:id/commits",
        post(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "invalid token" })),
            )
        }),
    ))
    .await;
    let (_dir, package) = arm_package();

    let err = gateway(base).submit(&package, &project()).await.unwrap_err();
    assert_eq!(err.kind(), SyncErrorKind::Auth);
    assert!(matches!(err, SyncError::Auth { status: 401, ref reason } if reason == "invalid token"));
}

#[tokio::test]
async fn test_submit_rejected_with_reason() {
    let base = spawn(Router::new().route(
        "/projects/:id/commits",
        post(|| async {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "reason": "commit message too long" })),
            )
        }),
    ))
    .await;
    let (_dir, package) = arm_package();

    let err = gateway(base).submit(&package, &project()).await.unwrap_err();
    assert_eq!(err.kind(), SyncErrorKind::ServerRejected);
    assert!(!err.is_transient());
    assert_eq!(
        err.to_string(),
        "backend rejected the request (422): commit message too long"
    );
}

#[tokio::test]
async fn test_rejection_with_plain_text_body() {
    let base = spawn(Router::new().route(
        "/projects",
        get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
    ))
    .await;

    let err = gateway(base).list_projects().await.unwrap_err();
    assert!(matches!(err, SyncError::Rejected { status: 502, ref reason } if reason == "upstream down"));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_submit_timeout_leaves_package_unchanged() {
    let base = spawn(Router::new().route(
        "/projects/:id/commits",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "commit": { "id": "late" } }))
        }),
    ))
    .await;
    let gateway =
        HttpGateway::new(GatewayConfig::new(base).with_timeout(Duration::from_millis(200))).unwrap();
    let (_dir, package) = arm_package();
    let before = package.clone();

    let err = gateway.submit(&package, &project()).await.unwrap_err();

    assert_eq!(err.kind(), SyncErrorKind::Timeout);
    assert!(err.is_transient());
    assert_eq!(package, before);
}

#[tokio::test]
async fn test_submit_refuses_files_changed_after_packaging() {
    let received: Arc<Mutex<Option<ReceivedCommit>>> = Arc::default();
    let app = Router::new()
        .route("/projects/:id/commits", post(receive_commit))
        .with_state(received.clone());
    let gateway = gateway(spawn(app).await);
    let (dir, package) = arm_package();

    fs::write(dir.path().join("parts/base.part"), "edited after packaging").unwrap();

    let err = gateway.submit(&package, &project()).await.unwrap_err();
    assert!(matches!(err, SyncError::ContentChanged { .. }));
    assert_eq!(err.kind(), SyncErrorKind::LocalFile);
    assert!(received.lock().unwrap().is_none());
}

// ── Commits ─────────────────────────────────────────────────

#[tokio::test]
async fn test_list_commits() {
    let base = spawn(Router::new().route(
        "/projects/:id/commits",
        get(|Path(id): Path<String>| async move {
            assert_eq!(id, "proj-1");
            Json(json!([
                {
                    "id": "c-1",
                    "message": "Initial arm",
                    "author": "Sarah Johnson",
                    "timestamp": "2025-08-01T09:00:00Z",
                    "files": [{ "name": "arm.asm", "size": 15 }, { "name": "base.part" }]
                },
                { "id": "c-2" }
            ]))
        }),
    ))
    .await;

    let commits = gateway(base).list_commits("proj-1").await.unwrap();
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].author, "Sarah Johnson");
    assert_eq!(commits[0].files[0].size, Some(15));
    assert_eq!(commits[0].files[1].size, None);
    assert!(commits[1].timestamp.is_none());
    assert!(commits[1].files.is_empty());
}

#[tokio::test]
async fn test_malformed_response() {
    let base = spawn(Router::new().route("/projects", get(|| async { "not json" }))).await;

    let err = gateway(base).list_projects().await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidResponse { .. }));
}

#[test]
fn test_config_endpoint_joins_base() {
    let config = GatewayConfig::new("http://localhost:8000/api/v1/");
    assert_eq!(config.endpoint("/health"), "http://localhost:8000/api/v1/health");
    assert_eq!(
        GatewayConfig::default().base_url,
        "https://freezefork.onrender.com/api/v1"
    );
    assert_eq!(GatewayConfig::default().timeout, Duration::from_secs(300));
}
