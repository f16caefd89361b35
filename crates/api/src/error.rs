use crate::models::component::DeclarationKey;
use std::path::PathBuf;
use thiserror::Error;

/// Classpath enumeration failed; fatal for an assembly pass.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no class path is in scope for this scan")]
    NoClassPath,
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt archive {path}: {message}")]
    Archive { path: PathBuf, message: String },
}

/// A single class could not be read or decoded.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("class {0} not found")]
    NotFound(String),
    #[error("failed to read class {class}: {source}")]
    Io {
        class: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse class {class}: {message}")]
    Malformed { class: String, message: String },
}

/// Two elements of one descriptor declare the same component differently.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("conflicting declarations of {key}")]
pub struct DeclarationConflict {
    pub key: DeclarationKey,
}

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("{origin}: malformed XML: {message}")]
    Syntax { origin: String, message: String },
    #[error("{origin}: unexpected root element <{found}>")]
    UnexpectedRoot { origin: String, found: String },
    #[error("{origin}: {message}")]
    Invalid { origin: String, message: String },
    #[error("{origin}: not valid UTF-8: {message}")]
    Encoding { origin: String, message: String },
    #[error("{origin}: {conflict}")]
    Conflict {
        origin: String,
        #[source]
        conflict: DeclarationConflict,
    },
    #[error("failed to read descriptor {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Initializer discovery could not enumerate the service declarations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to read service declarations from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt archive {path}: {message}")]
    Archive { path: PathBuf, message: String },
    #[error("service declarations in {path} are not valid UTF-8: {message}")]
    Encoding { path: PathBuf, message: String },
}
