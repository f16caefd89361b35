use crate::merge::{MergeConflict, OrderingError};
use thiserror::Error;
use webscope_api::{DescriptorError, DiscoveryError, ScanError, SourceLocation};

#[derive(Error, Debug)]
pub enum WebscopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, WebscopeError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// An annotated class that no scanned location claims. This points at a
/// stale or corrupt classpath index rather than at the application.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("annotated class {class_name} is not claimed by any source location")]
pub struct ClassificationError {
    pub class_name: String,
}

/// Failures that abort an assembly pass outright.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("classpath scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Classification(#[from] ClassificationError),
}

/// Recoverable failures recorded by a pass. Each one sets `ok = false`.
#[derive(Error, Debug)]
pub enum AssemblyFailure {
    #[error("explicit descriptor: {0}")]
    ExplicitDescriptor(#[source] DescriptorError),
    #[error("{which} descriptor: {error}")]
    BuiltinDescriptor {
        which: &'static str,
        #[source]
        error: DescriptorError,
    },
    #[error("fragment of {location}: {error}")]
    Fragment {
        location: SourceLocation,
        #[source]
        error: DescriptorError,
    },
    #[error("fragment of {location}: {message}")]
    UndecodableFragment {
        location: SourceLocation,
        message: String,
    },
    #[error("fragment ordering: {0}")]
    Ordering(#[from] OrderingError),
    #[error("merge conflict: {0}")]
    Conflict(#[from] MergeConflict),
    #[error("initializer discovery: {0}")]
    Discovery(#[from] DiscoveryError),
}
