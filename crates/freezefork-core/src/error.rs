//! Error types for scanning, hashing and packaging.

use std::path::PathBuf;

use thiserror::Error;

/// A raw path that cannot be turned into a canonical one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathResolutionError {
    /// Path is empty or only whitespace.
    #[error("Empty path")]
    Empty,

    /// Path contains a character that no supported filesystem accepts.
    #[error("Invalid character {character:?} in path: {raw}")]
    InvalidCharacter { raw: String, character: char },

    /// UNC path without both a server and a share component.
    #[error("Malformed UNC path: {raw}")]
    MalformedUnc { raw: String },

    /// Drive-relative path such as `C:part.sldprt`.
    #[error("Drive-relative path is not supported: {raw}")]
    DriveRelative { raw: String },

    /// Relative paths need an absolute base directory.
    #[error("Base directory is not absolute: {base}")]
    RelativeBase { base: String },
}

/// Failure reported by the CAD host while enumerating references.
#[derive(Debug, Error)]
pub enum CadError {
    /// The handle does not name a document the host can locate.
    #[error("Unknown document {path}: {source}")]
    UnknownDocument {
        path: String,
        #[source]
        source: PathResolutionError,
    },

    /// The host refused or failed the call.
    #[error("CAD host error: {message}")]
    Host { message: String },

    /// Reference map could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reference map is not valid TOML.
    #[error("Invalid reference map {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Fatal errors for a whole scan.
#[derive(Debug, Error)]
pub enum GraphBuildError {
    /// The CAD host has no document open.
    #[error("No active document")]
    NoActiveDocument,

    /// The root document path is syntactically invalid.
    #[error("Invalid root path: {0}")]
    RootPath(#[from] PathResolutionError),

    /// The root document does not exist on disk or cannot be stat'ed.
    #[error("Root document unreadable: {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CAD host failed to enumerate the root's references.
    #[error("Cannot enumerate references of root {path}: {source}")]
    RootReferences {
        path: String,
        #[source]
        source: CadError,
    },

    /// Another scan is already running in this session.
    #[error("A scan is already in progress for this session")]
    Busy,

    /// The session has been closed.
    #[error("CAD session is closed")]
    SessionClosed,
}

/// A file that exists but cannot be hashed.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Packaging validation failures. No Package is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageError {
    #[error("Commit message must not be empty")]
    EmptyMessage,

    #[error("Author must not be empty")]
    EmptyAuthor,

    #[error("Project reference must not be empty")]
    EmptyProjectRef,

    #[error("Dependency graph has no root node")]
    EmptyGraph,

    /// Content identities have not been computed for this graph.
    #[error("Dependency graph has not been hashed")]
    NotIdentified,

    /// Another package assembly is already running in this session.
    #[error("A package assembly is already in progress for this session")]
    Busy,
}
