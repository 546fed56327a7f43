//! Path normalization for references reported by the CAD host.
//!
//! CAD hosts report paths in whatever form the assembly stored them:
//! Windows drive paths, UNC shares, `\\?\` verbatim paths, relative paths
//! next to the assembly, or POSIX paths. [`PathResolver`] folds all of them
//! into one canonical string so that two spellings of the same file map to a
//! single graph node.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PathResolutionError;

/// Characters rejected by every filesystem a CAD vault can live on.
const FORBIDDEN: &[char] = &['<', '>', '"', '|', '?', '*'];

/// Canonical identity of a file within one scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    /// Wrap a string that could not be resolved, for issue reporting.
    pub(crate) fn from_raw(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path component, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.0.rsplit('/').next().filter(|name| !name.is_empty())
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of resolving a raw path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Identity used for deduplication (case-folded when the resolver is case-insensitive).
    pub canonical: CanonicalPath,
    /// Normalized path with the original casing, used for filesystem access.
    pub native: PathBuf,
}

/// Resolves raw reference paths against a base directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    base: Option<String>,
    case_insensitive: bool,
}

impl PathResolver {
    /// Resolver that only accepts absolute paths.
    pub fn absolute_only() -> Self {
        Self {
            base: None,
            case_insensitive: cfg!(windows),
        }
    }

    /// Resolver for relative references next to `base_dir`.
    pub fn with_base(base_dir: impl AsRef<str>) -> Result<Self, PathResolutionError> {
        let raw = base_dir.as_ref();
        let base = normalize(raw, None)?;
        Ok(Self {
            base: Some(base),
            case_insensitive: cfg!(windows),
        })
    }

    /// Resolver relative to the process working directory.
    pub fn from_current_dir() -> Result<Self, PathResolutionError> {
        let cwd = std::env::current_dir().map_err(|_| PathResolutionError::RelativeBase {
            base: String::from("."),
        })?;
        Self::with_base(cwd.to_string_lossy())
    }

    /// Override case folding (defaults to case-insensitive on Windows hosts only).
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Resolver for references of a document located at `document`,
    /// sharing this resolver's case policy.
    pub fn for_document(&self, document: &ResolvedPath) -> Result<Self, PathResolutionError> {
        let native = document.native.to_string_lossy();
        let parent = match native.rfind('/') {
            Some(idx) => &native[..=idx],
            None => native.as_ref(),
        };
        Ok(Self::with_base(parent)?.case_insensitive(self.case_insensitive))
    }

    /// Normalize `raw` into a canonical path.
    ///
    /// Never touches the filesystem: a missing target still resolves.
    pub fn resolve(&self, raw: &str) -> Result<ResolvedPath, PathResolutionError> {
        let normalized = normalize(raw, self.base.as_deref())?;
        let canonical = if self.case_insensitive {
            normalized.to_lowercase()
        } else {
            normalized.clone()
        };
        Ok(ResolvedPath {
            canonical: CanonicalPath(canonical),
            native: PathBuf::from(normalized),
        })
    }

    /// Convenience for already-typed paths.
    pub fn resolve_path(&self, path: &Path) -> Result<ResolvedPath, PathResolutionError> {
        self.resolve(&path.to_string_lossy())
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::absolute_only()
    }
}

/// Lexically normalize `raw`, joining it onto `base` when relative.
fn normalize(raw: &str, base: Option<&str>) -> Result<String, PathResolutionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathResolutionError::Empty);
    }

    let unified = strip_verbatim(trimmed).replace('\\', "/");
    if let Some(character) = unified
        .chars()
        .find(|c| c.is_control() || FORBIDDEN.contains(c))
    {
        return Err(PathResolutionError::InvalidCharacter {
            raw: raw.to_string(),
            character,
        });
    }

    match split_prefix(&unified, raw)? {
        Some((prefix, rest)) => Ok(join_components(&prefix, rest)),
        None => {
            let base = base.ok_or_else(|| PathResolutionError::RelativeBase {
                base: String::new(),
            })?;
            let combined = if base.ends_with('/') {
                format!("{base}{unified}")
            } else {
                format!("{base}/{unified}")
            };
            match split_prefix(&combined, raw)? {
                Some((prefix, rest)) => Ok(join_components(&prefix, rest)),
                None => Err(PathResolutionError::RelativeBase {
                    base: base.to_string(),
                }),
            }
        }
    }
}

/// `\\?\UNC\server\share` → `\\server\share`, `\\?\C:\x` → `C:\x`.
fn strip_verbatim(path: &str) -> String {
    if let Some(rest) = path.strip_prefix(r"\\?\UNC\") {
        format!(r"\\{rest}")
    } else if let Some(rest) = path.strip_prefix(r"\\?\") {
        rest.to_string()
    } else {
        path.to_string()
    }
}

/// Split an absolute path into its root prefix and the remainder.
/// Returns `None` for relative paths.
fn split_prefix<'a>(
    path: &'a str,
    raw: &str,
) -> Result<Option<(String, &'a str)>, PathResolutionError> {
    if let Some(rest) = path.strip_prefix("//") {
        let mut parts = rest.splitn(3, '/');
        let server = parts.next().unwrap_or_default();
        let share = parts.next().unwrap_or_default();
        if server.is_empty() || share.is_empty() {
            return Err(PathResolutionError::MalformedUnc {
                raw: raw.to_string(),
            });
        }
        let prefix = format!("//{server}/{share}");
        return Ok(Some((prefix, parts.next().unwrap_or_default())));
    }

    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        if bytes.get(2) != Some(&b'/') {
            return Err(PathResolutionError::DriveRelative {
                raw: raw.to_string(),
            });
        }
        let drive = (bytes[0] as char).to_ascii_lowercase();
        return Ok(Some((format!("{drive}:"), &path[2..])));
    }

    if path.starts_with('/') {
        return Ok(Some((String::new(), path)));
    }

    Ok(None)
}

fn join_components(prefix: &str, rest: &str) -> String {
    let mut components: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            other => components.push(other),
        }
    }

    if components.is_empty() {
        if prefix.starts_with("//") {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        }
    } else {
        format!("{prefix}/{}", components.join("/"))
    }
}
