//! Read-only boundary to the CAD host's object model.
//!
//! The live host (SolidWorks, Inventor, ...) is only ever asked two things:
//! which document is active, and which files a document references. Anything
//! implementing [`CadModel`] can drive a scan, including [`InMemoryModel`],
//! which doubles as the reference-map loader used by the CLI.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::error::{CadError, PathResolutionError};
use crate::model::FileRole;
use crate::path::{CanonicalPath, PathResolver};

/// Opaque handle to a document, identified by the path the host reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentHandle {
    path: String,
}

impl DocumentHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// One immediate reference of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CadReference {
    /// Path as stored in the referencing document (may be relative).
    pub path: String,
    pub role: FileRole,
    /// False for suppressed / excluded components.
    pub required: bool,
}

impl CadReference {
    pub fn new(path: impl Into<String>, role: FileRole) -> Self {
        Self {
            path: path.into(),
            role,
            required: true,
        }
    }

    /// Reference whose role is guessed from the file extension.
    pub fn inferred(path: impl Into<String>) -> Self {
        let path = path.into();
        let role = FileRole::from_path(&path);
        Self::new(path, role)
    }

    /// Mark as not required (suppressed component).
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Capabilities the scanner needs from a CAD host.
pub trait CadModel {
    /// Currently active document, if any.
    fn root_document(&self) -> Option<DocumentHandle>;

    /// Immediate sub-assemblies, parts and drawings of `document`, in host order.
    fn references(&self, document: &DocumentHandle) -> Result<Vec<CadReference>, CadError>;
}

impl<T: CadModel + ?Sized> CadModel for &T {
    fn root_document(&self) -> Option<DocumentHandle> {
        (**self).root_document()
    }

    fn references(&self, document: &DocumentHandle) -> Result<Vec<CadReference>, CadError> {
        (**self).references(document)
    }
}

impl<T: CadModel + ?Sized> CadModel for Box<T> {
    fn root_document(&self) -> Option<DocumentHandle> {
        (**self).root_document()
    }

    fn references(&self, document: &DocumentHandle) -> Result<Vec<CadReference>, CadError> {
        (**self).references(document)
    }
}

/// Fabricated object model: a fixed reference table keyed by canonical path.
///
/// Documents without an entry have no references (plain parts).
#[derive(Debug, Clone)]
pub struct InMemoryModel {
    resolver: PathResolver,
    root: Option<String>,
    documents: HashMap<CanonicalPath, Vec<CadReference>>,
    failing: HashSet<CanonicalPath>,
}

impl InMemoryModel {
    /// Model whose relative paths are anchored at `base_dir`.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, PathResolutionError> {
        let resolver = PathResolver::with_base(base_dir.as_ref().to_string_lossy())?;
        Ok(Self {
            resolver,
            root: None,
            documents: HashMap::new(),
            failing: HashSet::new(),
        })
    }

    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.resolver = self.resolver.case_insensitive(enabled);
        self
    }

    /// Set the active document.
    pub fn with_root(mut self, path: impl Into<String>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Register the references of a document.
    pub fn document(
        mut self,
        path: &str,
        references: Vec<CadReference>,
    ) -> Result<Self, PathResolutionError> {
        let key = self.resolver.resolve(path)?.canonical;
        self.documents.insert(key, references);
        Ok(self)
    }

    /// Make reference enumeration fail for a document (e.g. a corrupt file).
    pub fn failing_document(mut self, path: &str) -> Result<Self, PathResolutionError> {
        let key = self.resolver.resolve(path)?.canonical;
        self.failing.insert(key);
        Ok(self)
    }

    /// Parse a TOML reference map. Relative paths are anchored at `base_dir`.
    pub fn from_toml_str(source: &str, base_dir: impl AsRef<Path>) -> Result<Self, MapError> {
        let map: ReferenceMap = toml::from_str(source).map_err(MapError::Parse)?;
        let mut model = Self::new(base_dir)?;
        if let Some(case_insensitive) = map.case_insensitive {
            model = model.case_insensitive(case_insensitive);
        }
        model.root = map.root;
        for doc in map.documents {
            let references = doc
                .references
                .into_iter()
                .map(|r| CadReference {
                    role: r.role.unwrap_or_else(|| FileRole::from_path(&r.path)),
                    required: r.required,
                    path: r.path,
                })
                .collect();
            model = model.document(&doc.path, references)?;
        }
        Ok(model)
    }

    /// Load a reference map file; relative paths are anchored at its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CadError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| CadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Path::new(".").to_path_buf());
        let base = std::path::absolute(&base).map_err(|source| CadError::Io {
            path: base.clone(),
            source,
        })?;
        Self::from_toml_str(&source, &base).map_err(|err| match err {
            MapError::Parse(source) => CadError::Parse {
                path: path.to_path_buf(),
                source,
            },
            MapError::Path(e) => CadError::Host {
                message: format!("{}: {e}", path.display()),
            },
        })
    }
}

impl CadModel for InMemoryModel {
    fn root_document(&self) -> Option<DocumentHandle> {
        let root = self.root.as_ref()?;
        // Report the root the way a host would: as an absolute path.
        match self.resolver.resolve(root) {
            Ok(resolved) => Some(DocumentHandle::new(resolved.native.to_string_lossy())),
            Err(_) => Some(DocumentHandle::new(root.clone())),
        }
    }

    fn references(&self, document: &DocumentHandle) -> Result<Vec<CadReference>, CadError> {
        let key = self
            .resolver
            .resolve(document.path())
            .map_err(|source| CadError::UnknownDocument {
                path: document.path().to_string(),
                source,
            })?
            .canonical;
        if self.failing.contains(&key) {
            return Err(CadError::Host {
                message: format!("cannot open {}", document.path()),
            });
        }
        Ok(self.documents.get(&key).cloned().unwrap_or_default())
    }
}

/// Errors while building a model from a reference map.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("invalid reference map: {0}")]
    Parse(#[source] toml::de::Error),
    #[error(transparent)]
    Path(#[from] PathResolutionError),
}

#[derive(Debug, Deserialize)]
struct ReferenceMap {
    root: Option<String>,
    case_insensitive: Option<bool>,
    #[serde(default)]
    documents: Vec<MapDocument>,
}

#[derive(Debug, Deserialize)]
struct MapDocument {
    path: String,
    #[serde(default)]
    references: Vec<MapReference>,
}

#[derive(Debug, Deserialize)]
struct MapReference {
    path: String,
    role: Option<FileRole>,
    #[serde(default = "default_true")]
    required: bool,
}

fn default_true() -> bool {
    true
}
