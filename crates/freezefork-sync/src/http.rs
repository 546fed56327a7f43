//! HTTP implementation of [`SyncGateway`] over `reqwest`.

use std::path::{Component, Path, PathBuf};

use freezefork_core::{ManifestEntry, Package};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::error::SyncError;
use crate::gateway::SyncGateway;
use crate::wire::{
    CommitManifest, CommitResult, CommitSummary, CreateProjectRequest, DEFAULT_BRANCH, ErrorBody,
    HealthResponse, ProjectRef, SubmitResponse,
};

/// Header carrying [`Package::idempotency_key`] on submissions.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(SyncError::Client)?;
        Ok(Self { client, config })
    }

    /// Reuse an existing client; the configured user agent is sent per request.
    pub fn with_client(client: reqwest::Client, config: GatewayConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn request(&self, method: reqwest::Method, endpoint: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, endpoint)
            .timeout(self.config.timeout)
            .header(reqwest::header::USER_AGENT, self.config.user_agent.as_str())
    }

    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SyncError> {
        debug!("{}", endpoint);
        request
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))
    }

    fn transport_error(&self, endpoint: &str, source: reqwest::Error) -> SyncError {
        if source.is_timeout() {
            SyncError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: self.config.timeout,
            }
        } else {
            SyncError::Network {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    }

    /// Pass a success response through, or turn its status and body into an error.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_reason)
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

        let status = status.as_u16();
        if status == 401 || status == 403 {
            Err(SyncError::Auth { status, reason })
        } else {
            Err(SyncError::Rejected { status, reason })
        }
    }

    async fn parse_response<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<T, SyncError> {
        let response = Self::ensure_success(response).await?;
        response.json::<T>().await.map_err(|source| {
            if source.is_timeout() {
                self.transport_error(endpoint, source)
            } else {
                SyncError::InvalidResponse {
                    endpoint: endpoint.to_string(),
                    source,
                }
            }
        })
    }

    /// Multipart body for `package`, plus the number of file parts in it.
    async fn upload_form(&self, package: &Package) -> Result<(Form, usize), SyncError> {
        let manifest = serde_json::to_string(&CommitManifest::from_package(package))
            .unwrap_or_else(|_| "{}".to_string());
        let mut form = Form::new()
            .text("message", package.message().to_string())
            .text("author", package.author().to_string())
            .text("branch", DEFAULT_BRANCH)
            .text("aggregate_id", package.aggregate_id().to_hex())
            .text("manifest", manifest);

        let root_dir = package
            .manifest()
            .first()
            .and_then(|root| disk_path(root).parent().map(Path::to_path_buf))
            .unwrap_or_default();

        let mut sent = 0;
        for entry in package.manifest() {
            let Some(content_id) = &entry.content_id else {
                if entry.exists {
                    warn!("Not uploading {}: no content id", entry.path);
                }
                continue;
            };
            let path = disk_path(entry);
            let bytes = read_packaged_file(&path).await?;
            if blake3::hash(&bytes).as_bytes() != &content_id.0 {
                return Err(SyncError::ContentChanged { path });
            }
            form = form.part("files", Part::bytes(bytes).file_name(part_name(&path, &root_dir)));
            sent += 1;
        }
        Ok((form, sent))
    }
}

/// Where the packaged file lives, with its on-disk casing.
fn disk_path(entry: &ManifestEntry) -> PathBuf {
    if entry.native_path.as_os_str().is_empty() {
        PathBuf::from(entry.path.as_str())
    } else {
        entry.native_path.clone()
    }
}

/// Upload name: the path below the root assembly's folder, `/`-separated.
fn part_name(path: &Path, root_dir: &Path) -> String {
    let relative = path.strip_prefix(root_dir).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

async fn read_packaged_file(path: &Path) -> Result<Vec<u8>, SyncError> {
    tokio::fs::read(path).await.map_err(|source| SyncError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

#[async_trait::async_trait]
impl SyncGateway for HttpGateway {
    async fn health_check(&self) -> Result<bool, SyncError> {
        let endpoint = self.config.endpoint("/health");
        let response = self
            .send(&endpoint, self.request(reqwest::Method::GET, &endpoint))
            .await?;
        if !response.status().is_success() {
            warn!("Health check returned {}", response.status());
            return Ok(false);
        }
        let health: HealthResponse = self.parse_response(&endpoint, response).await?;
        Ok(health.is_healthy())
    }

    async fn list_projects(&self) -> Result<Vec<ProjectRef>, SyncError> {
        let endpoint = self.config.endpoint("/projects");
        let response = self
            .send(&endpoint, self.request(reqwest::Method::GET, &endpoint))
            .await?;
        let projects: Vec<ProjectRef> = self.parse_response(&endpoint, response).await?;
        debug!("Found {} projects", projects.len());
        Ok(projects)
    }

    async fn create_project_with_description(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<ProjectRef, SyncError> {
        let endpoint = self.config.endpoint("/projects");
        let body = CreateProjectRequest { name, description };
        let response = self
            .send(
                &endpoint,
                self.request(reqwest::Method::POST, &endpoint).json(&body),
            )
            .await?;
        let project: ProjectRef = self.parse_response(&endpoint, response).await?;
        info!("Created project {} ({})", project.name, project.id);
        Ok(project)
    }

    async fn submit(
        &self,
        package: &Package,
        project: &ProjectRef,
    ) -> Result<CommitResult, SyncError> {
        if package.project_ref() != project.id {
            warn!(
                "Package was assembled for project {} but is submitted to {}",
                package.project_ref(),
                project.id
            );
        }
        let endpoint = self
            .config
            .endpoint(&format!("/projects/{}/commits", project.id));
        let (form, sent) = self.upload_form(package).await?;
        let request = self
            .request(reqwest::Method::POST, &endpoint)
            .header(IDEMPOTENCY_KEY_HEADER, package.idempotency_key())
            .multipart(form);

        let response = self.send(&endpoint, request).await?;
        let submitted: SubmitResponse = self.parse_response(&endpoint, response).await?;
        let result = submitted.into_result(sent);
        info!(
            "Submitted {} to {} as commit {} ({} files)",
            package.aggregate_id(),
            project.name,
            result.commit_id,
            result.files_uploaded
        );
        Ok(result)
    }

    async fn list_commits(&self, project_id: &str) -> Result<Vec<CommitSummary>, SyncError> {
        let endpoint = self
            .config
            .endpoint(&format!("/projects/{project_id}/commits"));
        let response = self
            .send(&endpoint, self.request(reqwest::Method::GET, &endpoint))
            .await?;
        self.parse_response(&endpoint, response).await
    }
}
