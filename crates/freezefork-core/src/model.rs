//! Core data structures for the dependency graph

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::path::CanonicalPath;

/// Stable identifier for a node within one scan (its discovery index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct NodeId(pub u64);

/// What a referenced file is to the assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    RootAssembly,
    SubAssembly,
    Part,
    Drawing,
    Other,
}

impl FileRole {
    /// Guess the role from a CAD file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("sldasm") | Some("asm") | Some("iam") => FileRole::SubAssembly,
            Some("sldprt") | Some("prt") | Some("part") | Some("ipt") => FileRole::Part,
            Some("slddrw") | Some("drw") | Some("draw") | Some("idw") | Some("dwg") => {
                FileRole::Drawing
            }
            _ => FileRole::Other,
        }
    }

    /// Stable tag used in identity computation and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileRole::RootAssembly => "root_assembly",
            FileRole::SubAssembly => "sub_assembly",
            FileRole::Part => "part",
            FileRole::Drawing => "drawing",
            FileRole::Other => "other",
        }
    }
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// BLAKE3 digest of a file's bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentId(pub [u8; 32]);

impl ContentId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Lowercase hex rendering (64 chars).
    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }

    /// Parse the hex rendering produced by [`ContentId::to_hex`].
    pub fn from_hex(hex: &str) -> Option<Self> {
        blake3::Hash::from_hex(hex)
            .ok()
            .map(|hash| Self(*hash.as_bytes()))
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.to_hex())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ContentId::from_hex(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid content id: {hex}")))
    }
}

/// One referenced file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub id: NodeId,
    /// Canonical path, unique within one scan.
    pub path: CanonicalPath,
    /// Path used for filesystem access.
    pub native_path: PathBuf,
    pub role: FileRole,
    /// Whether the file existed when scanned.
    pub exists: bool,
    /// True if at least one reference to this file is required (not suppressed).
    pub required: bool,
    /// Size in bytes at scan time (0 when missing).
    pub size: u64,
    /// Filled in by the identity pass.
    pub content_id: Option<ContentId>,
}

/// `source` references `target` as a component or drawing reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub required: bool,
}

/// Summary of one file inside a package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub path: CanonicalPath,
    /// On-disk location with its original casing; not part of the aggregate identity.
    #[serde(default)]
    pub native_path: PathBuf,
    pub role: FileRole,
    pub content_id: Option<ContentId>,
    pub size: u64,
    pub exists: bool,
}

impl From<&FileNode> for ManifestEntry {
    fn from(node: &FileNode) -> Self {
        Self {
            path: node.path.clone(),
            native_path: node.native_path.clone(),
            role: node.role,
            content_id: node.content_id,
            size: node.size,
            exists: node.exists,
        }
    }
}

/// Kind of recoverable anomaly found while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingReference,
    Cycle,
    UnreadableFile,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::MissingReference => f.write_str("missing reference"),
            IssueKind::Cycle => f.write_str("reference cycle"),
            IssueKind::UnreadableFile => f.write_str("unreadable file"),
        }
    }
}

/// Non-fatal problem recorded during traversal or hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanIssue {
    pub kind: IssueKind,
    /// File the issue is about.
    pub path: CanonicalPath,
    /// Document whose reference triggered the issue.
    pub referenced_from: Option<CanonicalPath>,
    /// Human-readable detail.
    pub message: String,
}

impl ScanIssue {
    pub fn missing_reference(path: CanonicalPath, parent: CanonicalPath) -> Self {
        Self {
            message: format!("{path} (referenced by {parent}) does not exist"),
            kind: IssueKind::MissingReference,
            path,
            referenced_from: Some(parent),
        }
    }

    /// `path` exists but is a directory or other non-file entry.
    pub fn not_a_file(path: CanonicalPath, parent: CanonicalPath) -> Self {
        Self {
            message: format!("{path} (referenced by {parent}) is not a regular file"),
            kind: IssueKind::MissingReference,
            path,
            referenced_from: Some(parent),
        }
    }

    /// `parent` references `ancestor`, which already (transitively) references `parent`.
    pub fn cycle(ancestor: CanonicalPath, parent: CanonicalPath) -> Self {
        Self {
            message: format!("{parent} references {ancestor}, which already depends on it"),
            kind: IssueKind::Cycle,
            path: ancestor,
            referenced_from: Some(parent),
        }
    }

    pub fn unreadable(path: CanonicalPath, parent: Option<CanonicalPath>, detail: impl fmt::Display) -> Self {
        Self {
            message: format!("{path}: {detail}"),
            kind: IssueKind::UnreadableFile,
            path,
            referenced_from: parent,
        }
    }
}

impl fmt::Display for ScanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
