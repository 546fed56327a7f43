//! CLI command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use freezefork_core::{CadSession, DependencyGraph, InMemoryModel, Package, PackageMetadata};
use freezefork_sync::{HttpGateway, SyncGateway};

use crate::CommitArgs;
use crate::config::Settings;

fn gateway(settings: &Settings) -> anyhow::Result<HttpGateway> {
    Ok(HttpGateway::new(settings.gateway())?)
}

pub async fn health(settings: &Settings) -> anyhow::Result<()> {
    let gateway = gateway(settings)?;
    if gateway.health_check().await? {
        println!("Backend at {} is healthy", settings.backend.base_url);
        Ok(())
    } else {
        bail!("Backend at {} is not healthy", settings.backend.base_url)
    }
}

pub async fn projects(settings: &Settings) -> anyhow::Result<()> {
    let projects = gateway(settings)?.list_projects().await?;
    println!("{} projects", projects.len());
    for project in projects {
        match project.description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => println!("  {}  {} - {}", project.id, project.name, description),
            None => println!("  {}  {}", project.id, project.name),
        }
    }
    Ok(())
}

pub async fn create_project(
    settings: &Settings,
    name: String,
    description: Option<String>,
) -> anyhow::Result<()> {
    let project = gateway(settings)?
        .create_project_with_description(&name, description.as_deref())
        .await?;
    println!("Created project {} (id {})", project.name, project.id);
    Ok(())
}

pub async fn commits(settings: &Settings, project_id: String) -> anyhow::Result<()> {
    let commits = gateway(settings)?.list_commits(&project_id).await?;
    println!("{} commits in {}", commits.len(), project_id);
    for commit in commits {
        let when = commit
            .timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "  {}  {:16}  {:20}  {} ({} files)",
            commit.id,
            when,
            commit.author,
            commit.message,
            commit.files.len()
        );
    }
    Ok(())
}

pub async fn scan(settings: &Settings, map: PathBuf) -> anyhow::Result<()> {
    let graph = scan_map(settings, map).await?;

    for node in graph.nodes() {
        let content = node
            .content_id
            .map(|id| id.to_hex()[..12].to_string())
            .unwrap_or_else(|| "-".repeat(12));
        let state = if node.exists { "" } else { "  (missing)" };
        println!(
            "{:13} {:>10}  {}  {}{}",
            node.role.as_str(), node.size, content, node.path, state
        );
    }
    println!(
        "{} files, {} references, {} issues",
        graph.node_count(),
        graph.edge_count(),
        graph.issues().len()
    );
    for issue in graph.issues() {
        println!("  {}", issue);
    }
    Ok(())
}

pub async fn package(
    settings: &Settings,
    map: PathBuf,
    commit: CommitArgs,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (_graph, package) = build_package(settings, map, commit).await?;
    print_package(&package);

    if let Some(output) = output {
        let json = serde_json::to_string_pretty(&package)?;
        std::fs::write(&output, json)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        tracing::info!("Wrote package to {}", output.display());
    }
    Ok(())
}

pub async fn submit(
    settings: &Settings,
    map: PathBuf,
    commit: CommitArgs,
    allow_unresolved: bool,
) -> anyhow::Result<()> {
    let gateway = gateway(settings)?;
    let project_id = commit.project.clone();
    let project = gateway
        .list_projects()
        .await?
        .into_iter()
        .find(|p| p.id == project_id)
        .with_context(|| format!("No project with id {project_id}"))?;

    let (graph, package) = build_package(settings, map, commit).await?;
    print_package(&package);

    if package.has_unresolved_references() {
        for issue in graph.issues() {
            tracing::warn!("{}", issue);
        }
        if !allow_unresolved {
            bail!("Package has missing required files; pass --allow-unresolved to submit anyway");
        }
    }

    let result = gateway.submit(&package, &project).await?;
    println!(
        "Committed {} to {} as {} ({} files uploaded)",
        package.aggregate_id(),
        project.name,
        result.commit_id,
        result.files_uploaded
    );
    Ok(())
}

fn print_package(package: &Package) {
    println!("Package {}", package.aggregate_id());
    println!("  project: {}", package.project_ref());
    println!("  author:  {}", package.author());
    println!("  message: {}", package.message());
    println!(
        "  files:   {} ({} bytes)",
        package.manifest().len(),
        package.total_size()
    );
    if package.has_unresolved_references() {
        println!("  WARNING: required files are missing");
    }
}

/// Scan the assembly described by `map` off the async runtime.
async fn scan_map(settings: &Settings, map: PathBuf) -> anyhow::Result<DependencyGraph> {
    let settings = settings.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<DependencyGraph> {
        let session = open_session(&settings, &map)?;
        Ok(session.scan()?)
    })
    .await?
}

async fn build_package(
    settings: &Settings,
    map: PathBuf,
    commit: CommitArgs,
) -> anyhow::Result<(DependencyGraph, Package)> {
    let author = commit
        .author
        .or_else(|| settings.package.author.clone())
        .context("No commit author; pass --author or set FREEZEFORK_AUTHOR")?;
    let metadata = PackageMetadata::new(commit.message, author, commit.project);

    let settings = settings.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<(DependencyGraph, Package)> {
        let session = open_session(&settings, &map)?;
        let graph = session.scan()?;
        let package = session.package(&graph, &metadata)?;
        Ok((graph, package))
    })
    .await?
}

fn open_session(settings: &Settings, map: &Path) -> anyhow::Result<CadSession<InMemoryModel>> {
    let model = InMemoryModel::load(map)
        .with_context(|| format!("Failed to load reference map {}", map.display()))?;
    Ok(CadSession::with_settings(
        model,
        settings.builder(),
        settings.identity(),
    ))
}
