use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// How a classpath unit is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    /// A zip archive (`.jar`).
    Archive,
    /// An exploded directory root (e.g. `WEB-INF/classes`).
    Directory,
}

/// One unit of the classpath. Immutable once a scan has completed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub kind: LocationKind,
}

impl SourceLocation {
    pub fn archive(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: LocationKind::Archive,
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: LocationKind::Directory,
        }
    }

    /// Guess the kind from the path: `.jar`/`.zip` files are archives,
    /// everything else is treated as a directory root.
    pub fn infer(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ext == "jar" || ext == "zip" {
            Self::archive(path)
        } else {
            Self::directory(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_archive(&self) -> bool {
        self.kind == LocationKind::Archive
    }

    /// True when this location lives under any of the given roots.
    pub fn is_under_any<'a>(&self, roots: impl IntoIterator<Item = &'a PathBuf>) -> bool {
        roots.into_iter().any(|root| self.path.starts_with(root))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
