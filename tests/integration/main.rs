//! Integration tests for Freezefork
//!
//! These tests run the scan, hash and package pipeline end to end over
//! reference maps on disk, through the library and through the CLI.

use std::fs;
use std::path::Path;
use std::process::Command;

use freezefork_core::{
    CadSession, DependencyGraphBuilder, FileRole, IdentityComputer, InMemoryModel, IssueKind,
    Package, PackageMetadata,
};
use tempfile::TempDir;

/// Relative references resolve against the root assembly's folder.
const ARM_MAP: &str = r#"
root = "arm.asm"
case_insensitive = false

[[documents]]
path = "arm.asm"
references = [
    { path = "gripper/gripper.asm" },
    { path = "base.part" },
    { path = "drawings/arm.draw", required = false },
]

[[documents]]
path = "gripper/gripper.asm"
references = [
    { path = "gripper/finger.part" },
    { path = "base.part" },
    { path = "gripper/spec_sheet.pdf", role = "other" },
]
"#;

/// Robot arm project on disk with its reference map.
fn create_arm_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let files = [
        ("arm.asm", "arm assembly"),
        ("base.part", "base plate"),
        ("drawings/arm.draw", "arm drawing"),
        ("gripper/gripper.asm", "gripper assembly"),
        ("gripper/finger.part", "finger"),
        ("gripper/spec_sheet.pdf", "%PDF-1.4"),
        ("arm.toml", ARM_MAP),
    ];
    for (path, content) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
    dir
}

fn package_from_map(map: &Path, message: &str) -> Package {
    let model = InMemoryModel::load(map).unwrap();
    let session = CadSession::with_settings(
        model,
        DependencyGraphBuilder::new().case_insensitive(false),
        IdentityComputer::with_workers(2),
    );
    let graph = session.scan().unwrap();
    session
        .package(&graph, &PackageMetadata::new(message, "Sarah Johnson", "proj-1"))
        .unwrap()
}

#[test]
fn test_pipeline_from_reference_map() {
    let dir = create_arm_project();
    let package = package_from_map(&dir.path().join("arm.toml"), "Initial arm");

    let files: Vec<_> = package
        .manifest()
        .iter()
        .map(|e| e.path.file_name().unwrap().to_string())
        .collect();
    assert_eq!(
        files,
        ["arm.asm", "gripper.asm", "base.part", "arm.draw", "finger.part", "spec_sheet.pdf"]
    );

    let roles: Vec<_> = package.manifest().iter().map(|e| e.role).collect();
    assert_eq!(
        roles,
        [
            FileRole::RootAssembly,
            FileRole::SubAssembly,
            FileRole::Part,
            FileRole::Drawing,
            FileRole::Part,
            FileRole::Other,
        ]
    );
    assert!(package.manifest().iter().all(|e| e.exists && e.content_id.is_some()));
    assert!(!package.has_unresolved_references());
}

#[test]
fn test_pipeline_is_deterministic_until_a_file_changes() {
    let dir = create_arm_project();
    let map = dir.path().join("arm.toml");

    let first = package_from_map(&map, "Initial arm");
    let second = package_from_map(&map, "Initial arm");
    assert_eq!(first.aggregate_id(), second.aggregate_id());
    assert_eq!(first.idempotency_key(), second.idempotency_key());

    fs::write(dir.path().join("gripper/finger.part"), "longer finger").unwrap();
    let changed = package_from_map(&map, "Initial arm");
    assert_ne!(first.aggregate_id(), changed.aggregate_id());
}

#[test]
fn test_pipeline_reports_missing_files() {
    let dir = create_arm_project();
    let map = dir.path().join("arm.toml");

    // optional drawing: recorded, but not an unresolved reference
    fs::remove_file(dir.path().join("drawings/arm.draw")).unwrap();
    let package = package_from_map(&map, "Drop drawing");
    assert!(!package.has_unresolved_references());

    // required part shared by two assemblies
    fs::remove_file(dir.path().join("base.part")).unwrap();
    let model = InMemoryModel::load(&map).unwrap();
    let graph = DependencyGraphBuilder::new()
        .case_insensitive(false)
        .scan_active(&model)
        .unwrap();
    let graph = IdentityComputer::new().identify(graph);

    let missing: Vec<_> = graph.issues_of_kind(IssueKind::MissingReference).collect();
    // drawing once, base.part once per referencing assembly
    assert_eq!(missing.len(), 3);
    assert!(graph.has_unresolved_references());
    assert_eq!(graph.node_count(), 6);
}

#[test]
fn test_package_json_export() {
    let dir = create_arm_project();
    let package = package_from_map(&dir.path().join("arm.toml"), "Export");

    let json = serde_json::to_string_pretty(&package).unwrap();
    let restored: Package = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, package);
    assert!(json.contains("\"aggregateId\""));
}

// ── CLI ─────────────────────────────────────────────────────

fn freezefork(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_freezefork"));
    command
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env("FREEZEFORK_API_URL", "http://127.0.0.1:9/api/v1");
    command
}

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    let output = freezefork(dir.path()).arg("--help").output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Version control for CAD assemblies"));
    assert!(stdout.contains("submit"));
}

#[test]
fn test_cli_scan() {
    let dir = create_arm_project();
    let output = freezefork(dir.path()).args(["scan", "arm.toml"]).output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("gripper/finger.part"));
    assert!(stdout.contains("6 files, 6 references, 0 issues"));
}

#[test]
fn test_cli_package_writes_json() {
    let dir = create_arm_project();
    let output = freezefork(dir.path())
        .args([
            "package", "arm.toml", "-m", "Add gripper", "--author", "Sarah Johnson", "--project",
            "proj-1", "--output", "package.json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json = fs::read_to_string(dir.path().join("package.json")).unwrap();
    let package: Package = serde_json::from_str(&json).unwrap();
    assert_eq!(package.message(), "Add gripper");
    assert_eq!(package.manifest().len(), 6);
}

#[test]
fn test_cli_package_requires_author() {
    let dir = create_arm_project();
    let output = freezefork(dir.path())
        .env_remove("FREEZEFORK_AUTHOR")
        .args(["package", "arm.toml", "-m", "Add gripper", "--project", "proj-1"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
